use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

use grid::{Plan, SchedulerSettings};
use task::TaskDescriptor;
use util::PathEncodingError;

/// Defines fns for creating common paths in the result and temp directories
mod paths;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Can't perform IO operation: \"{0}\" is not whitelisted")]
    NotWhitelisted(String),
    #[error("Specified result directory \"{0}\" is not a directory")]
    NotDirectory(String),
}

/// All file operations performed by the scheduler go through this struct.
///
/// Every write checks that its path is lexically inside either the result
/// root or the temp folder and contains no `..` component. Symlinks are not
/// resolved. Task code running in an execution unit is not bound by this;
/// it is up to the user to keep it inside its work dir.
#[derive(Debug, Clone)]
pub struct Fs {
    /// Parent of every task work dir
    result_root: PathBuf,
    /// Scratch space for the plan, cursor and descriptors
    temp_folder: PathBuf,
}

impl Fs {
    pub fn new(settings: &SchedulerSettings) -> Self {
        Self {
            result_root: settings.result_root_folder.clone(),
            temp_folder: settings.temp_folder.clone(),
        }
    }

    /// Fail early if the result root is occupied by something other than a
    /// directory. The root itself is not created here: an empty grid's only
    /// work dir *is* the root, and it has to be missing to run.
    pub fn check_result_root(&self) -> Result<()> {
        if !self.result_root.exists() {
            log::info!(
                "Result directory {:?} doesn't exist. It will be created.",
                self.result_root
            );
        } else if !self.result_root.is_dir() {
            return Err(Error::NotDirectory(
                self.result_root
                    .to_str()
                    .ok_or(PathEncodingError)?
                    .to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Check if path exists on disk.
    pub fn exists<T: AsRef<Path>>(&self, path: T) -> bool {
        let path = path.as_ref();
        path.exists() || path.is_symlink()
    }

    /// Create a directory (uses `std::fs::create_dir_all`, so an entire tree of dirs can be created).
    pub fn create_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::create_dir_all(path).context("creating dir")?;
        Ok(())
    }

    /// Create (or truncate) a file, and return a writable `File` handle.
    pub fn create_file<T: AsRef<Path>>(&self, path: T) -> Result<fs::File> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        let f = fs::File::create(path).context("creating file")?;
        Ok(f)
    }

    /// Marshal a task descriptor for an execution unit.
    pub fn write_descriptor<T: AsRef<Path>>(
        &self,
        path: T,
        descriptor: &TaskDescriptor,
    ) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        descriptor.write(path)
    }

    /// Persist the plan for worker processes.
    pub fn write_plan<T: AsRef<Path>>(&self, path: T, plan: &Plan) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        plan.save(path)
    }

    /// `starts_with` is purely lexical, so `..` anywhere would let a path
    /// escape the root it appears to be under; such paths are never allowed.
    fn is_whitelisted<T: AsRef<Path>>(&self, path: T) -> bool {
        let path = path.as_ref();
        if path.components().any(|c| c == Component::ParentDir) {
            return false;
        }
        path.starts_with(&self.result_root) || path.starts_with(&self.temp_folder)
    }

    fn check_whitelist(&self, path: &Path) -> Result<()> {
        if !self.is_whitelisted(path) {
            Err(Error::NotWhitelisted(path.to_str().ok_or(PathEncodingError)?.to_owned()).into())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fs_in(dir: &Path) -> Fs {
        Fs {
            result_root: dir.join("results"),
            temp_folder: dir.join("temp"),
        }
    }

    #[test]
    fn test_whitelist() -> Result<()> {
        let dir = tempdir()?;
        let fs = fs_in(dir.path());
        fs.create_dir(dir.path().join("results/a-1,"))?;
        fs.create_dir(dir.path().join("temp"))?;
        assert!(fs.exists(dir.path().join("results/a-1,")));

        let err = fs.create_dir(dir.path().join("elsewhere")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NotWhitelisted(_))
        ));
        assert!(!dir.path().join("elsewhere").exists());
        Ok(())
    }

    #[test]
    fn test_parent_dir_escape_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let fs = fs_in(dir.path());
        let escape = dir.path().join("results/x/../../elsewhere");
        let err = fs.create_dir(&escape).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NotWhitelisted(_))
        ));
        assert!(!dir.path().join("elsewhere").exists());
        Ok(())
    }

    #[test]
    fn test_create_file_truncates() -> Result<()> {
        use std::io::Write;
        let dir = tempdir()?;
        let fs = fs_in(dir.path());
        fs.create_dir(dir.path().join("results"))?;
        let path = dir.path().join("results/worker.log");
        write!(fs.create_file(&path)?, "first run, long output")?;
        write!(fs.create_file(&path)?, "second")?;
        assert_eq!(std::fs::read_to_string(&path)?, "second");
        Ok(())
    }

    #[test]
    fn test_result_root_is_not_created() -> Result<()> {
        let dir = tempdir()?;
        let fs = fs_in(dir.path());
        fs.check_result_root()?;
        assert!(!dir.path().join("results").exists());
        Ok(())
    }

    #[test]
    fn test_result_root_not_a_dir() -> Result<()> {
        let dir = tempdir()?;
        let fs = fs_in(dir.path());
        std::fs::write(dir.path().join("results"), "oops")?;
        assert!(fs.check_result_root().is_err());
        Ok(())
    }
}
