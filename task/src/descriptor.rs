use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use grid::ConfigMap;

/// Plain, serializable description of one task run.
/// Written to the temp folder by a worker and read back by the execution unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Registry key of the task type to build.
    pub task_type: String,
    /// Global defaults merged with the resolved configuration.
    pub config: ConfigMap,
    /// Directory the task should write its results to.
    pub work_dir: PathBuf,
}

impl TaskDescriptor {
    pub fn write<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_vec_pretty(self)?;
        util::atomic_write(path, &text)
            .with_context(|| format!("while writing task descriptor {:?}", path))?;
        Ok(())
    }

    pub fn read<T: AsRef<Path>>(path: T) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("while reading task descriptor {:?}", path))?;
        let descriptor = serde_json::from_str(&text)
            .with_context(|| format!("while parsing task descriptor {:?}", path))?;
        Ok(descriptor)
    }
}
