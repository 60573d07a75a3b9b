use std::collections::BTreeMap;

/// What a worker hands to an execution unit
mod descriptor;
pub use descriptor::TaskDescriptor;

/// Task-type identifier -> constructor
mod registry;
pub use registry::{Constructor, TaskRegistry};

/// Built-in task that runs a shell command
mod shell;
pub use shell::ShellTask;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unknown task type \"{0}\"")]
    UnknownTaskType(String),
    #[error("Task config has no string value for \"{0}\"")]
    MissingConfigKey(&'static str),
    #[error("Command exited with {0}")]
    CommandFailed(std::process::ExitStatus),
}

/// User task logic. One instance is built per claimed configuration:
/// once in the worker (to ask for `required_env`), and once more inside
/// the execution unit, where `run` is called.
pub trait GpuTask {
    /// Do the work. Runs inside the execution unit process, with the slot's
    /// device selection already in the environment.
    fn run(&self) -> anyhow::Result<()>;

    /// Extra environment variables the execution unit needs.
    /// These override both the process and the slot environment.
    fn required_env(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}
