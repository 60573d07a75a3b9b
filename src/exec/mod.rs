/// Per-slot claim/skip/run loop
mod worker_loop;
pub use worker_loop::{WorkerLoop, WorkerSummary};

/// Start an execution unit and wait for it
mod launcher;
pub use launcher::{LaunchRequest, Launcher, ProcessLauncher};

/// The execution unit side: unmarshal a descriptor and run the task
mod unit;
pub use unit::run_unit;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Claimed index {0} but the plan only has {1} configurations")]
    ClaimOutOfRange(usize, usize),
}
