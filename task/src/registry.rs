use anyhow::Result;

use util::HashMap;

use crate::{Error, GpuTask, ShellTask, TaskDescriptor};

/// Builds a task from its descriptor.
pub type Constructor = Box<dyn Fn(&TaskDescriptor) -> Result<Box<dyn GpuTask>> + Send + Sync>;

/// Maps task-type identifiers to constructors, so that only plain data
/// crosses the process boundary.
///
/// Workers and execution units must be built with the same registry;
/// in practice that means the same binary.
#[derive(Default)]
pub struct TaskRegistry {
    constructors: HashMap<String, Constructor>,
}

impl TaskRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry containing the built-in task types (`shell`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ShellTask::TYPE, ShellTask::from_descriptor);
        registry
    }

    /// Register `constructor` under `name`, replacing any earlier entry.
    pub fn register<F>(&mut self, name: &str, constructor: F) -> &mut Self
    where
        F: Fn(&TaskDescriptor) -> Result<Box<dyn GpuTask>> + Send + Sync + 'static,
    {
        if self
            .constructors
            .insert(name.to_owned(), Box::new(constructor))
            .is_some()
        {
            log::debug!("replacing task type \"{name}\"");
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Construct the task a descriptor refers to.
    pub fn build(&self, descriptor: &TaskDescriptor) -> Result<Box<dyn GpuTask>> {
        let constructor = self
            .constructors
            .get(&descriptor.task_type)
            .ok_or_else(|| Error::UnknownTaskType(descriptor.task_type.clone()))?;
        constructor(descriptor)
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}
