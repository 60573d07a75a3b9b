use std::path::Path;

use anyhow::{Context, Result};

use task::{TaskDescriptor, TaskRegistry};
use util::Timer;

/// Entry point of an execution unit process: unmarshal the descriptor,
/// build the task it names, and run it. Any error becomes a non-zero exit.
pub fn run_unit(descriptor_path: &Path, registry: &TaskRegistry) -> Result<()> {
    let descriptor = TaskDescriptor::read(descriptor_path)?;
    log::info!(
        "starting {} task in {:?}",
        descriptor.task_type,
        descriptor.work_dir
    );

    let task = registry
        .build(&descriptor)
        .context("while constructing task")?;

    let timer = Timer::now();
    task.run().context("while running task")?;
    log::info!("task completed in {:?}", timer.elapsed());
    Ok(())
}
