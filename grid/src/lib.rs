//! Declarative experiment grids: scheduler settings, global defaults, and the
//! axis groups that expand into an ordered list of task configurations.

use std::collections::BTreeMap;

mod settings;
pub use settings::{GpuSlot, RawSchedulerSettings, SchedulerSettings};

mod grid;
pub use grid::{AxisGroup, GridSpec};

mod config_string;
pub use config_string::render_value;

mod plan;
pub use plan::{GridConfig, Plan, WorkItem};

pub use serde_json::Value;

/// A flat key -> value mapping; used both for global defaults and for
/// fully-resolved task configurations. Keys iterate in sorted order.
pub type ConfigMap = BTreeMap<String, Value>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not find scheduler_config in config")]
    MissingSchedulerConfig,
    #[error("could not find gpu in scheduler_config")]
    MissingGpu,
    #[error("please specify at least one gpu in scheduler_config")]
    NoGpus,
    #[error("gpu can only be a string or a list of strings (found {0})")]
    InvalidGpuEntry(String),
    #[error("values for \"{0}\" in test_config must be a list (found {1})")]
    AxisNotList(String, String),
}
