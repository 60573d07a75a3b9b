use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ConfigMap, Error, GridSpec, RawSchedulerSettings, SchedulerSettings};

/// The config file as written by the user.
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    pub scheduler_config: Option<RawSchedulerSettings>,
    #[serde(default)]
    pub global_config: ConfigMap,
    pub test_config: Option<Vec<Map<String, Value>>>,
}

impl GridConfig {
    /// Read and parse a JSON config file.
    pub fn from_path<T: AsRef<Path>>(path: T) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("while reading config file {:?}", path))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("while parsing config file {:?}", path))?;
        Ok(config)
    }
}

/// Everything a worker needs: validated settings, global defaults,
/// and the ordered list of resolved configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub settings: SchedulerSettings,
    pub defaults: ConfigMap,
    pub grid: GridSpec,
    pub configs: Vec<ConfigMap>,
}

/// One claimed configuration, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    /// Position of this configuration in the expansion order.
    pub index: usize,
    /// `result_root_folder/<filtered config string>`
    pub work_dir: PathBuf,
    /// Global defaults overridden by the resolved configuration.
    pub config: ConfigMap,
    /// Unfiltered config string, for log lines.
    pub config_string: String,
    /// Filtered config string, used as the folder name.
    pub folder_string: String,
}

impl TryFrom<GridConfig> for Plan {
    type Error = anyhow::Error;
    fn try_from(config: GridConfig) -> Result<Self, Self::Error> {
        let raw = config
            .scheduler_config
            .ok_or(Error::MissingSchedulerConfig)?;
        let settings: SchedulerSettings = raw.try_into()?;

        let grid = match config.test_config {
            Some(maps) => GridSpec::from_maps(maps)?,
            None => GridSpec::default(),
        };
        let configs = grid.expand();

        Ok(Self {
            settings,
            defaults: config.global_config,
            grid,
            configs,
        })
    }
}

impl Plan {
    /// Load a plan previously written with [`Plan::save`].
    pub fn load<T: AsRef<Path>>(path: T) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("while reading plan {:?}", path))?;
        let plan =
            serde_json::from_str(&text).with_context(|| format!("while parsing plan {:?}", path))?;
        Ok(plan)
    }

    /// Serialize the plan so worker processes can load the same expansion.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("while writing plan {:?}", path))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Build the work item for the configuration at `index`.
    pub fn work_item(&self, index: usize) -> Option<WorkItem> {
        let resolved = self.configs.get(index)?;

        let mut config = self.defaults.clone();
        config.extend(resolved.iter().map(|(k, v)| (k.clone(), v.clone())));

        let config_string = self.settings.test_config_string(resolved, false);
        let folder_string = self.settings.test_config_string(resolved, true);
        let work_dir = self.settings.result_root_folder.join(&folder_string);

        Some(WorkItem {
            index,
            work_dir,
            config,
            config_string,
            folder_string,
        })
    }

    /// Summary of the whole grid, one segment per axis group.
    pub fn summary_string(&self) -> String {
        self.settings.grid_summary_string(self.grid.groups())
    }
}
