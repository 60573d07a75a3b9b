use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use cursor::{Claim, Cursor};
use grid::{GpuSlot, Plan, WorkItem};
use task::{TaskDescriptor, TaskRegistry};
use util::Timer;

use crate::fs::Fs;

use super::{Error, LaunchRequest, Launcher};

/// Counts of what one worker loop did; only used for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Execution units launched
    pub ran: usize,
    /// Configurations skipped because their work dir already existed
    pub skipped: usize,
    /// Configurations whose task could not be constructed
    pub failed_to_prepare: usize,
}

/// `WorkerLoop` drives a single GPU slot.
///
/// It claims configurations from the shared cursor until the cursor is
/// exhausted. For each one it either skips it (its work dir already exists
/// and `force_rerun` is off) or creates the work dir, marshals a task
/// descriptor, and launches an execution unit pinned to this slot's device,
/// blocking until the unit exits. The unit's exit status is logged but never
/// acted on: there are no retries.
///
/// There is no timeout either. A unit that never exits stalls this slot
/// for good; other slots keep going.
pub struct WorkerLoop<'a, C: ?Sized, L: ?Sized> {
    slot: GpuSlot,
    plan: &'a Plan,
    cursor: &'a C,
    launcher: &'a L,
    registry: &'a TaskRegistry,
    /// Filesystem interface
    fs: Fs,
    /// for whenever we need to create a path:
    pathbuf: PathBuf,
    /// keeps track of time for each task
    timer: Timer,
}

impl<'a, C, L> WorkerLoop<'a, C, L>
where
    C: Cursor + ?Sized,
    L: Launcher + ?Sized,
{
    /// Create a new `WorkerLoop` bound to `slot` for its whole lifetime.
    pub fn new(
        slot: GpuSlot,
        plan: &'a Plan,
        cursor: &'a C,
        launcher: &'a L,
        registry: &'a TaskRegistry,
    ) -> Self {
        Self {
            slot,
            plan,
            cursor,
            launcher,
            registry,
            fs: Fs::new(&plan.settings),
            pathbuf: PathBuf::with_capacity(256),
            timer: Timer::now(),
        }
    }

    /// Claim and process configurations until none are left.
    pub fn run(&mut self) -> Result<WorkerSummary> {
        let mut summary = WorkerSummary::default();
        let name = self.slot.name.clone();

        while let Some(item) = self.claim()? {
            log::info!("{name} receives task {}", item.config_string);
            if let Ok(left) = self.cursor.remaining() {
                log::debug!("{left} of {} configurations unclaimed", self.cursor.len());
            }

            if self.fs.exists(&item.work_dir) && !self.plan.settings.force_rerun {
                log::info!("{name} skips task {}", item.config_string);
                summary.skipped += 1;
                continue;
            }

            let (descriptor, env) = match self.prepare(&item) {
                Ok(prepared) => prepared,
                Err(e) => {
                    log::error!("{name} could not prepare task {}: {e:#}", item.config_string);
                    summary.failed_to_prepare += 1;
                    continue;
                }
            };

            self.execute(&item, &descriptor, &env)?;
            summary.ran += 1;
        }

        log::info!(
            "{name} finished ({} run, {} skipped, {} failed to prepare)",
            summary.ran,
            summary.skipped,
            summary.failed_to_prepare
        );
        Ok(summary)
    }

    fn claim(&self) -> Result<Option<WorkItem>> {
        match self.cursor.claim_next().context("while claiming next task")? {
            Claim::Exhausted => Ok(None),
            Claim::Item(index) => {
                let item = self
                    .plan
                    .work_item(index)
                    .ok_or(Error::ClaimOutOfRange(index, self.plan.len()))?;
                Ok(Some(item))
            }
        }
    }

    /// Create the work dir, build the unit's environment, and marshal the
    /// task descriptor. Returns the descriptor path and env overrides.
    fn prepare(&mut self, item: &WorkItem) -> Result<(PathBuf, BTreeMap<String, String>)> {
        if !self.fs.exists(&item.work_dir) {
            self.fs
                .create_dir(&item.work_dir)
                .context("creating work dir")?;
        }

        let descriptor = TaskDescriptor {
            task_type: self.plan.settings.task.clone(),
            config: item.config.clone(),
            work_dir: item.work_dir.clone(),
        };
        let task = self.registry.build(&descriptor)?;

        // process env is inherited; slot overrides it, and the task overrides both:
        let mut env = self.slot.env.clone();
        env.extend(task.required_env());

        let path = self.fs.descriptor(&self.slot.name, &mut self.pathbuf).to_path_buf();
        self.fs.write_descriptor(&path, &descriptor)?;

        Ok((path, env))
    }

    fn execute(
        &mut self,
        item: &WorkItem,
        descriptor: &Path,
        env: &BTreeMap<String, String>,
    ) -> Result<()> {
        let log_file = self
            .plan
            .settings
            .log_file
            .as_deref()
            .map(|name| self.fs.task_log(&item.work_dir, name, &mut self.pathbuf).to_path_buf());

        let request = LaunchRequest {
            slot: &self.slot.name,
            descriptor,
            env,
            log_file: log_file.as_deref(),
        };

        self.timer.reset();
        let code = self.launcher.launch(&request, &self.fs)?;
        let elapsed = self.timer.elapsed();

        match code {
            Some(0) => {}
            Some(code) => log::debug!("{} unit exited with code {code}", self.slot.name),
            None => log::debug!("{} unit was terminated by a signal", self.slot.name),
        }
        log::info!(
            "{} finishes task {} in {:?}",
            self.slot.name,
            item.config_string,
            elapsed
        );
        Ok(())
    }
}
