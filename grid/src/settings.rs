use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

const DEFAULT_RESULT_ROOT: &str = "results";
const DEFAULT_TEMP_FOLDER: &str = "temp";
const DEFAULT_LOG_FILE: &str = "worker.log";
const DEFAULT_SCHEDULER_LOG: &str = "scheduler.log";
const DEFAULT_SEPARATOR: &str = ",";
const DEFAULT_INDICATOR: &str = "-";
const DEFAULT_INST_SEPARATOR: &str = "+";
const DEFAULT_VALUE_MAXLEN: usize = 30;
const DEFAULT_IGNORED_CHARS: [&str; 3] = [" ", "[", "]"];
const DEFAULT_TASK: &str = "shell";
const DEFAULT_DEVICE_ENV_VAR: &str = "CUDA_VISIBLE_DEVICES";

/// `scheduler_config` as it appears in the config file.
/// Defaults are filled in for absent keys only; `null` is kept as an explicit
/// "disabled" for the two log settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSchedulerSettings {
    #[serde(default)]
    pub gpu: Option<Vec<Value>>,
    #[serde(default)]
    pub force_rerun: bool,
    #[serde(default = "default_result_root")]
    pub result_root_folder: PathBuf,
    #[serde(default = "default_temp_folder")]
    pub temp_folder: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: Option<String>,
    #[serde(default = "default_scheduler_log")]
    pub scheduler_log_file_path: Option<PathBuf>,
    #[serde(default = "default_separator")]
    pub test_config_string_separator: String,
    #[serde(default = "default_indicator")]
    pub test_config_string_indicator: String,
    #[serde(default = "default_inst_separator")]
    pub test_config_string_inst_separator: String,
    #[serde(default = "default_value_maxlen")]
    pub config_string_value_maxlen: usize,
    #[serde(default)]
    pub ignored_keys_for_folder_name: BTreeSet<String>,
    #[serde(default = "default_ignored_chars")]
    pub ignored_characters_for_folder_name: Vec<String>,
    #[serde(default = "default_task")]
    pub task: String,
    #[serde(default = "default_device_env_var")]
    pub device_env_var: String,
}

fn default_result_root() -> PathBuf {
    PathBuf::from(DEFAULT_RESULT_ROOT)
}

fn default_temp_folder() -> PathBuf {
    PathBuf::from(DEFAULT_TEMP_FOLDER)
}

fn default_log_file() -> Option<String> {
    Some(DEFAULT_LOG_FILE.to_owned())
}

fn default_scheduler_log() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_SCHEDULER_LOG))
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_owned()
}

fn default_indicator() -> String {
    DEFAULT_INDICATOR.to_owned()
}

fn default_inst_separator() -> String {
    DEFAULT_INST_SEPARATOR.to_owned()
}

fn default_value_maxlen() -> usize {
    DEFAULT_VALUE_MAXLEN
}

fn default_ignored_chars() -> Vec<String> {
    DEFAULT_IGNORED_CHARS.iter().map(|s| s.to_string()).collect()
}

fn default_task() -> String {
    DEFAULT_TASK.to_owned()
}

fn default_device_env_var() -> String {
    DEFAULT_DEVICE_ENV_VAR.to_owned()
}

/// Validated scheduler options. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// One device identifier per slot; list entries are already comma-joined.
    pub gpu: Vec<String>,
    pub force_rerun: bool,
    pub result_root_folder: PathBuf,
    pub temp_folder: PathBuf,
    /// Per-task log file name inside the work dir; `None` discards task output.
    pub log_file: Option<String>,
    pub scheduler_log_file_path: Option<PathBuf>,
    pub test_config_string_separator: String,
    pub test_config_string_indicator: String,
    pub test_config_string_inst_separator: String,
    pub config_string_value_maxlen: usize,
    pub ignored_keys_for_folder_name: BTreeSet<String>,
    pub ignored_characters_for_folder_name: Vec<String>,
    /// Task-type identifier looked up in the task registry.
    pub task: String,
    /// Environment variable used to pin an execution unit to its slot's device(s).
    pub device_env_var: String,
}

/// One GPU execution slot: a name for logging and the environment
/// overrides that select its device(s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuSlot {
    pub name: String,
    pub env: BTreeMap<String, String>,
}

impl TryFrom<RawSchedulerSettings> for SchedulerSettings {
    type Error = anyhow::Error;
    fn try_from(raw: RawSchedulerSettings) -> Result<Self, Self::Error> {
        let gpu = parse_gpus(raw.gpu)?;

        let cwd = std::env::current_dir().context("while resolving current directory")?;
        let result_root_folder = cwd.join(raw.result_root_folder);
        let temp_folder = cwd.join(raw.temp_folder);

        if !temp_folder.exists() {
            fs::create_dir_all(&temp_folder)
                .with_context(|| format!("while creating temp folder {:?}", temp_folder))?;
        }

        Ok(Self {
            gpu,
            force_rerun: raw.force_rerun,
            result_root_folder,
            temp_folder,
            log_file: raw.log_file,
            scheduler_log_file_path: raw.scheduler_log_file_path,
            test_config_string_separator: raw.test_config_string_separator,
            test_config_string_indicator: raw.test_config_string_indicator,
            test_config_string_inst_separator: raw.test_config_string_inst_separator,
            config_string_value_maxlen: raw.config_string_value_maxlen,
            ignored_keys_for_folder_name: raw.ignored_keys_for_folder_name,
            ignored_characters_for_folder_name: raw.ignored_characters_for_folder_name,
            task: raw.task,
            device_env_var: raw.device_env_var,
        })
    }
}

/// Each entry must be a string or a list of strings; lists become "a,b".
fn parse_gpus(gpu: Option<Vec<Value>>) -> Result<Vec<String>, Error> {
    let entries = gpu.ok_or(Error::MissingGpu)?;
    if entries.is_empty() {
        return Err(Error::NoGpus);
    }
    let mut gpus = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = match entry {
            Value::String(s) => s,
            Value::Array(ref list) => {
                let mut parts = Vec::with_capacity(list.len());
                for part in list {
                    match part {
                        Value::String(s) => parts.push(s.as_str()),
                        _ => return Err(Error::InvalidGpuEntry(entry.to_string())),
                    }
                }
                parts.join(",")
            }
            other => return Err(Error::InvalidGpuEntry(other.to_string())),
        };
        gpus.push(id);
    }
    Ok(gpus)
}

impl SchedulerSettings {
    /// One slot per configured GPU identifier, in configuration order.
    ///
    /// Slot names are unique: an identifier listed more than once gets
    /// `gpu<id>`, then `gpu<id>.1`, `gpu<id>.2`, ... Per-slot files in the
    /// temp folder are keyed by these names.
    pub fn gpu_slots(&self) -> Vec<GpuSlot> {
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        self.gpu
            .iter()
            .map(|id| {
                let repeat = seen.entry(id.as_str()).or_insert(0);
                let name = match *repeat {
                    0 => format!("gpu{id}"),
                    n => format!("gpu{id}.{n}"),
                };
                *repeat += 1;

                let mut env = BTreeMap::new();
                env.insert(self.device_env_var.clone(), id.clone());
                GpuSlot { name, env }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawSchedulerSettings {
        serde_json::from_value(value).unwrap()
    }

    fn settings(value: Value) -> Result<SchedulerSettings> {
        raw(value).try_into()
    }

    fn err_of(value: Value) -> Error {
        let e = settings(value).unwrap_err();
        e.downcast::<Error>().unwrap()
    }

    #[test]
    fn test_defaults_fill_absent_keys() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let temp = dir.path().join("scratch");
        let s = settings(json!({"gpu": ["0"], "temp_folder": temp}))?;
        assert!(!s.force_rerun);
        assert!(s.result_root_folder.ends_with("results"));
        assert!(s.result_root_folder.is_absolute());
        assert_eq!(s.temp_folder, temp);
        assert!(temp.is_dir(), "temp folder is created");
        assert_eq!(s.log_file.as_deref(), Some("worker.log"));
        assert_eq!(s.scheduler_log_file_path, Some(PathBuf::from("scheduler.log")));
        assert_eq!(s.test_config_string_separator, ",");
        assert_eq!(s.test_config_string_indicator, "-");
        assert_eq!(s.test_config_string_inst_separator, "+");
        assert_eq!(s.config_string_value_maxlen, 30);
        assert!(s.ignored_keys_for_folder_name.is_empty());
        assert_eq!(s.ignored_characters_for_folder_name, vec![" ", "[", "]"]);
        assert_eq!(s.task, "shell");
        assert_eq!(s.device_env_var, "CUDA_VISIBLE_DEVICES");
        Ok(())
    }

    #[test]
    fn test_explicit_values_win() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let s = settings(json!({
            "gpu": ["0"],
            "temp_folder": dir.path(),
            "force_rerun": true,
            "log_file": null,
            "scheduler_log_file_path": null,
            "config_string_value_maxlen": 4,
            "test_config_string_indicator": "=",
        }))?;
        assert!(s.force_rerun);
        assert_eq!(s.log_file, None);
        assert_eq!(s.scheduler_log_file_path, None);
        assert_eq!(s.config_string_value_maxlen, 4);
        assert_eq!(s.test_config_string_indicator, "=");
        Ok(())
    }

    #[test]
    fn test_gpu_validation() {
        assert!(matches!(err_of(json!({})), Error::MissingGpu));
        assert!(matches!(err_of(json!({"gpu": []})), Error::NoGpus));
        assert!(matches!(
            err_of(json!({"gpu": [0]})),
            Error::InvalidGpuEntry(_)
        ));
        assert!(matches!(
            err_of(json!({"gpu": [["0", 1]]})),
            Error::InvalidGpuEntry(_)
        ));
    }

    #[test]
    fn test_gpu_lists_are_joined() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let s = settings(json!({"gpu": ["0", ["1", "2"]], "temp_folder": dir.path()}))?;
        assert_eq!(s.gpu, vec!["0", "1,2"]);
        Ok(())
    }

    #[test]
    fn test_gpu_slots() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let s = settings(json!({"gpu": ["0", ["1", "2"]], "temp_folder": dir.path()}))?;
        let slots = s.gpu_slots();
        assert_eq!(slots.len(), s.gpu.len());
        assert_eq!(slots[0].name, "gpu0");
        assert_eq!(slots[0].env["CUDA_VISIBLE_DEVICES"], "0");
        assert_eq!(slots[1].name, "gpu1,2");
        assert_eq!(slots[1].env["CUDA_VISIBLE_DEVICES"], "1,2");
        assert_eq!(slots[1].env.len(), 1);
        Ok(())
    }

    #[test]
    fn test_repeated_gpu_gets_distinct_slot_names() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let s = settings(json!({"gpu": ["0", "1", "0", "0"], "temp_folder": dir.path()}))?;
        let names: Vec<_> = s.gpu_slots().into_iter().map(|slot| slot.name).collect();
        assert_eq!(names, ["gpu0", "gpu1", "gpu0.1", "gpu0.2"]);
        for slot in s.gpu_slots() {
            assert_eq!(slot.env.len(), 1);
        }
        assert_eq!(s.gpu_slots()[3].env["CUDA_VISIBLE_DEVICES"], "0");
        Ok(())
    }

    #[test]
    fn test_custom_device_env_var() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let s = settings(json!({
            "gpu": ["3"],
            "temp_folder": dir.path(),
            "device_env_var": "HIP_VISIBLE_DEVICES",
        }))?;
        assert_eq!(s.gpu_slots()[0].env["HIP_VISIBLE_DEVICES"], "3");
        Ok(())
    }
}
