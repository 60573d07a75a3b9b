use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use util::atomic_write;

use crate::{Claim, Cursor, Error, LockFile};

const LOCK_FILE: &str = "cursor.lock";
const POSITION_FILE: &str = "cursor.pos";
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Cursor shared between independent OS processes through two files in a
/// common directory: `cursor.pos` holds the position, and `cursor.lock`
/// guards every read-increment-write of it.
#[derive(Debug)]
pub struct FileCursor {
    len: usize,
    lock_path: PathBuf,
    position_path: PathBuf,
    lock_timeout: Duration,
}

impl FileCursor {
    /// Open an existing cursor in `dir`. The directory must already have been
    /// set up with [`FileCursor::create`].
    pub fn open<T: AsRef<Path>>(dir: T, len: usize) -> Self {
        let dir = dir.as_ref();
        Self {
            len,
            lock_path: dir.join(LOCK_FILE),
            position_path: dir.join(POSITION_FILE),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Start a fresh cursor at position 0 in `dir`, clearing any lock left over
    /// from an earlier run. Must happen before any claimant starts.
    pub fn create<T: AsRef<Path>>(dir: T, len: usize) -> Result<Self> {
        let cursor = Self::open(dir, len);
        LockFile::clear_stale(&cursor.lock_path)?;
        cursor.write_position(0)?;
        Ok(cursor)
    }

    /// How long a claim may wait for the lock before giving up.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn read_position(&self) -> Result<usize> {
        let text = fs::read_to_string(&self.position_path)
            .with_context(|| format!("while reading cursor {:?}", self.position_path))?;
        let position = text
            .trim()
            .parse()
            .map_err(|_| Error::CorruptPosition(self.position_path.clone(), text.clone()))?;
        if position > self.len {
            return Err(Error::PositionOutOfRange(position, self.len).into());
        }
        Ok(position)
    }

    fn write_position(&self, position: usize) -> Result<()> {
        atomic_write(&self.position_path, position.to_string().as_bytes())
            .with_context(|| format!("while writing cursor {:?}", self.position_path))
    }
}

impl Cursor for FileCursor {
    fn claim_next(&self) -> Result<Claim> {
        let _lock = LockFile::acquire(&self.lock_path, self.lock_timeout)?;
        let position = self.read_position()?;
        if position >= self.len {
            return Ok(Claim::Exhausted);
        }
        self.write_position(position + 1)?;
        Ok(Claim::Item(position))
    }

    fn remaining(&self) -> Result<usize> {
        // unlocked read; atomic_write guarantees we see a whole value.
        Ok(self.len - self.read_position()?)
    }

    fn len(&self) -> usize {
        self.len
    }
}
