//! "Next unclaimed index" cursors shared between worker loops.
//!
//! A cursor hands out the indices `0..len` exactly once each, in order,
//! no matter how many claimants call [`Cursor::claim_next`] concurrently.

mod memory;
pub use memory::MemoryCursor;

mod file;
pub use file::FileCursor;

mod lock;
pub use lock::LockFile;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Cursor position file {0:?} is corrupt: {1:?}")]
    CorruptPosition(std::path::PathBuf, String),
    #[error("Cursor position {0} is past the end ({1} configurations)")]
    PositionOutOfRange(usize, usize),
    #[error("Timed out waiting for cursor lock {0:?}")]
    LockTimeout(std::path::PathBuf),
}

/// Result of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Index of the claimed configuration.
    Item(usize),
    /// Every configuration has been handed out.
    Exhausted,
}

/// A shared position into a fixed-length list of configurations.
pub trait Cursor: Send + Sync {
    /// Atomically take the next unclaimed index and advance the position.
    fn claim_next(&self) -> anyhow::Result<Claim>;

    /// `len - position` at the time of the call. Informational only;
    /// it may be stale by the time the caller looks at it.
    fn remaining(&self) -> anyhow::Result<usize>;

    /// Total number of configurations.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    /// Claim until exhausted from `n` threads; return every index claimed.
    pub fn claim_concurrently<C: Cursor + 'static>(cursor: Arc<C>, n: usize) -> Vec<usize> {
        let handles: Vec<_> = (0..n)
            .map(|_| {
                let cursor = Arc::clone(&cursor);
                thread::spawn(move || {
                    let mut claimed = Vec::new();
                    while let Claim::Item(i) = cursor.claim_next().unwrap() {
                        claimed.push(i);
                    }
                    claimed
                })
            })
            .collect();
        let mut all: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all
    }
}
