use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::Error;

const RETRY_INTERVAL: Duration = Duration::from_millis(2);

/// Exclusive lock held by the existence of a file.
/// Whoever creates the file owns the lock until the guard is dropped.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Spin until the lock file can be created, or fail after `timeout`.
    pub fn acquire<T: AsRef<Path>>(path: T, timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        let start = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    // holder pid, for whoever has to clean up after a crash:
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockTimeout(path.to_path_buf()).into());
                    }
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("while creating lock file {:?}", path))
                }
            }
        }
    }

    /// Remove a lock left behind by a process that died while holding it.
    pub fn clear_stale<T: AsRef<Path>>(path: T) -> Result<()> {
        let path = path.as_ref();
        match fs::remove_file(path) {
            Ok(()) => {
                log::warn!("removed stale cursor lock {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("while removing lock file {:?}", path)),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::error!("failed to release cursor lock {:?}: {e}", self.path);
        }
    }
}
