/// High-level command line app
mod app;
/// Definition of command-line args
mod args;
/// Spawning and joining per-slot workers
mod dispatch;
/// Worker loops and execution units
mod exec;
/// Filesystem operations
mod fs;
/// Console + scheduler log file output
mod logging;
/// Interpreted command-line settings
mod settings;

// exported for tests and for binaries with their own task types:
pub use app::App;
pub use args::Args;
pub use dispatch::{run_worker, Dispatcher};
pub use exec::{LaunchRequest, Launcher, ProcessLauncher, WorkerLoop, WorkerSummary};
pub use fs::Fs;
pub use logging::DispatchLogger;
pub use settings::Settings;

pub use cursor::{Claim, Cursor, FileCursor, MemoryCursor};
pub use grid::{GpuSlot, GridConfig, Plan, SchedulerSettings, WorkItem};
pub use task::{GpuTask, TaskDescriptor, TaskRegistry};

/// Run the command-line app with the built-in task types.
pub fn run() -> Result<(), anyhow::Error> {
    run_with_registry(TaskRegistry::with_builtins())
}

/// Run the command-line app with a custom set of task types.
///
/// The binary re-invokes itself for worker processes and execution units,
/// so every task type in `registry` is available on both sides.
pub fn run_with_registry(registry: TaskRegistry) -> Result<(), anyhow::Error> {
    use clap::Parser;
    let args = Args::parse();

    let settings: Settings = args.try_into()?;

    let app = App::new(settings, registry);
    app.run()?;

    Ok(())
}
