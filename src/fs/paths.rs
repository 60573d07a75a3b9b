use std::path::{Path, PathBuf};

use super::Fs;

/// Utility fns for making common types of paths.
impl Fs {
    /// $TEMP/plan.json
    pub fn plan_file<'a>(&self, buf: &'a mut PathBuf) -> &'a Path {
        self.parts2(&self.temp_folder, "plan.json", buf)
    }

    /// $TEMP/<slot>_descriptor
    pub fn descriptor<'a>(&self, slot: &str, buf: &'a mut PathBuf) -> &'a Path {
        buf.clear();
        buf.push(&self.temp_folder);
        buf.push(slot);
        buf.as_mut_os_string().push("_descriptor");
        &*buf
    }

    /// $RESULTS/<config string>/<log file>
    pub fn task_log<'a>(&self, work_dir: &Path, log_file: &str, buf: &'a mut PathBuf) -> &'a Path {
        self.parts2(work_dir, log_file, buf)
    }

    /// Directory holding the shared cursor files.
    pub fn cursor_dir(&self) -> &Path {
        &self.temp_folder
    }

    fn parts2<'a, T, U>(&self, p1: T, p2: U, buf: &'a mut PathBuf) -> &'a Path
    where
        T: AsRef<Path>,
        U: AsRef<Path>,
    {
        buf.clear();
        buf.push(p1);
        buf.push(p2);
        &*buf
    }
}
