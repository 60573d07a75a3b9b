use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;

use anyhow::{Context, Result};

use cursor::{FileCursor, MemoryCursor};
use grid::Plan;
use task::TaskRegistry;

use crate::exec::{Launcher, WorkerLoop, WorkerSummary};
use crate::fs::Fs;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to start {0} worker process(es)")]
    WorkerSpawnFailed(usize),
    #[error("Plan has no slot {0} ({1} slots configured)")]
    NoSuchSlot(usize, usize),
}

/// Spreads a plan's configurations over its GPU slots, one worker per slot,
/// and waits for all of them. Nothing is reported back beyond completion:
/// outcomes are only visible in the logs.
pub struct Dispatcher<'a> {
    plan: Plan,
    registry: &'a TaskRegistry,
    fs: Fs,
}

impl<'a> Dispatcher<'a> {
    /// Fails before anything runs if the plan's task type isn't registered.
    pub fn new(plan: Plan, registry: &'a TaskRegistry) -> Result<Self> {
        if !registry.contains(&plan.settings.task) {
            return Err(task::Error::UnknownTaskType(plan.settings.task.clone()).into());
        }
        let fs = Fs::new(&plan.settings);
        Ok(Self { plan, registry, fs })
    }

    /// Run one worker process per slot: `<exe> worker --plan .. --slot N`.
    /// Workers share a file-backed cursor in the temp folder.
    pub fn run_processes(&self, exe: &Path, verbose: bool) -> Result<()> {
        self.fs.check_result_root()?;

        let mut buf = PathBuf::with_capacity(128);
        let plan_path = self.fs.plan_file(&mut buf).to_path_buf();
        self.fs.write_plan(&plan_path, &self.plan)?;
        FileCursor::create(self.fs.cursor_dir(), self.plan.len())
            .context("while resetting shared cursor")?;

        let slots = self.plan.settings.gpu_slots();
        log::info!(
            "dispatching {} configurations to {} slots",
            self.plan.len(),
            slots.len()
        );

        let mut children = Vec::with_capacity(slots.len());
        let mut spawn_failures = 0;
        for (index, slot) in slots.iter().enumerate() {
            let mut cmd = Command::new(exe);
            cmd.arg("worker")
                .arg("--plan")
                .arg(&plan_path)
                .arg("--slot")
                .arg(index.to_string());
            if verbose {
                cmd.arg("--verbose");
            }
            match cmd.spawn() {
                Ok(child) => {
                    log::info!("{} worker started (pid {})", slot.name, child.id());
                    children.push((&slot.name, child));
                }
                Err(e) => {
                    log::error!("{} worker failed to start: {e}", slot.name);
                    spawn_failures += 1;
                }
            }
        }

        for (name, mut child) in children {
            match child.wait() {
                Ok(status) if status.success() => log::debug!("{name} worker exited"),
                Ok(status) => log::warn!("{name} worker exited with {status}"),
                Err(e) => log::error!("failed to wait on {name} worker: {e}"),
            }
        }

        if spawn_failures > 0 {
            return Err(Error::WorkerSpawnFailed(spawn_failures).into());
        }
        log::info!("all slots finished");
        Ok(())
    }

    /// Run one worker thread per slot in this process, sharing an in-memory
    /// cursor. Execution units are still launched through `launcher`.
    pub fn run_threads<L: Launcher + ?Sized>(&self, launcher: &L) -> Result<Vec<WorkerSummary>> {
        self.fs.check_result_root()?;

        let cursor = MemoryCursor::new(self.plan.len());
        let slots = self.plan.settings.gpu_slots();
        log::info!(
            "dispatching {} configurations to {} slots (in-process)",
            self.plan.len(),
            slots.len()
        );

        let results = thread::scope(|s| {
            let handles: Vec<_> = slots
                .into_iter()
                .map(|slot| {
                    let name = slot.name.clone();
                    let cursor = &cursor;
                    let handle = s.spawn(move || {
                        WorkerLoop::new(slot, &self.plan, cursor, launcher, self.registry).run()
                    });
                    (name, handle)
                })
                .collect();
            handles
                .into_iter()
                .map(|(name, handle)| (name, handle.join()))
                .collect::<Vec<_>>()
        });

        let mut summaries = Vec::with_capacity(results.len());
        for (name, result) in results {
            match result {
                Ok(Ok(summary)) => summaries.push(summary),
                Ok(Err(e)) => log::error!("{name} worker failed: {e:#}"),
                Err(_) => log::error!("{name} worker panicked"),
            }
        }
        log::info!("all slots finished");
        Ok(summaries)
    }
}

/// Body of a `worker` process: attach to the shared cursor the orchestrator
/// set up for `plan` and drive slot `slot_index`.
pub fn run_worker<L: Launcher + ?Sized>(
    plan: &Plan,
    slot_index: usize,
    registry: &TaskRegistry,
    launcher: &L,
) -> Result<WorkerSummary> {
    let slots = plan.settings.gpu_slots();
    let num_slots = slots.len();
    let slot = slots
        .into_iter()
        .nth(slot_index)
        .ok_or(Error::NoSuchSlot(slot_index, num_slots))?;

    let fs = Fs::new(&plan.settings);
    let cursor = FileCursor::open(fs.cursor_dir(), plan.len());
    WorkerLoop::new(slot, plan, &cursor, launcher, registry).run()
}
