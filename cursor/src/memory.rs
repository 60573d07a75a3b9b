use std::sync::Mutex;

use anyhow::Result;

use crate::{Claim, Cursor};

/// Cursor shared between threads of a single process.
#[derive(Debug)]
pub struct MemoryCursor {
    len: usize,
    position: Mutex<usize>,
}

impl MemoryCursor {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            position: Mutex::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, usize> {
        // a panicking claimant can't leave the position half-updated:
        self.position.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Cursor for MemoryCursor {
    fn claim_next(&self) -> Result<Claim> {
        let mut position = self.lock();
        if *position >= self.len {
            return Ok(Claim::Exhausted);
        }
        let claimed = *position;
        *position += 1;
        Ok(Claim::Item(claimed))
    }

    fn remaining(&self) -> Result<usize> {
        Ok(self.len - *self.lock())
    }

    fn len(&self) -> usize {
        self.len
    }
}
