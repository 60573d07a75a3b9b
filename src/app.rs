use std::path::Path;

use anyhow::{Context, Result};

use grid::{GridConfig, Plan};
use task::TaskRegistry;
use util::Timer;

use crate::dispatch::{self, Dispatcher};
use crate::exec::{self, ProcessLauncher};
use crate::logging::DispatchLogger;
use crate::settings::{Action, Settings};

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// Task types this binary can run
    registry: TaskRegistry,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings, registry: TaskRegistry) -> Self {
        Self { settings, registry }
    }

    /// Run the app, using settings to determine what to do.
    pub fn run(self) -> Result<()> {
        match &self.settings.action {
            Action::Run {
                config,
                force_rerun,
                in_process,
            } => self.dispatch(config, *force_rerun, *in_process),
            Action::List { config } => self.list(config),
            Action::Worker { plan, slot } => self.worker(plan, *slot),
            Action::Exec { descriptor } => self.exec(descriptor),
        }
    }

    /// Read and expand a grid file. All configuration errors surface here,
    /// before any logger is installed or worker is started.
    fn load_plan(config: &Path, force_rerun: bool) -> Result<Plan> {
        let mut grid = GridConfig::from_path(config)?;
        if force_rerun {
            if let Some(scheduler) = grid.scheduler_config.as_mut() {
                scheduler.force_rerun = true;
            }
        }
        grid.try_into()
            .with_context(|| format!("while loading grid from {:?}", config))
    }

    fn dispatch(&self, config: &Path, force_rerun: bool, in_process: bool) -> Result<()> {
        let plan = Self::load_plan(config, force_rerun)?;

        DispatchLogger::new(
            self.settings.log_level(),
            plan.settings.scheduler_log_file_path.as_deref(),
        )?
        .init()?;
        log::info!("loaded {} configurations from {:?}", plan.len(), config);
        log_plan_details(&plan);

        let dispatcher = Dispatcher::new(plan, &self.registry)?;
        let timer = Timer::now();
        if in_process {
            let launcher = ProcessLauncher::current_exe()?;
            dispatcher.run_threads(&launcher)?;
        } else {
            let exe = std::env::current_exe().context("while locating current executable")?;
            dispatcher.run_processes(&exe, self.settings.verbose)?;
        }
        timer.log_elapsed("dispatch");
        Ok(())
    }

    fn list(&self, config: &Path) -> Result<()> {
        let plan = Self::load_plan(config, false)?;

        println!("{} configurations:", plan.len());
        for index in 0..plan.len() {
            if let Some(item) = plan.work_item(index) {
                println!("{index}\t{}\t{}", item.config_string, item.work_dir.display());
            }
        }
        println!("\ngrid: {}", plan.summary_string());

        println!("\nslots:");
        for slot in plan.settings.gpu_slots() {
            let env: Vec<_> = slot.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
            println!("{}\t{}", slot.name, env.join(" "));
        }
        Ok(())
    }

    fn worker(&self, plan_path: &Path, slot: usize) -> Result<()> {
        let plan = Plan::load(plan_path)?;
        DispatchLogger::new(
            self.settings.log_level(),
            plan.settings.scheduler_log_file_path.as_deref(),
        )?
        .init()?;

        let launcher = ProcessLauncher::current_exe()?;
        dispatch::run_worker(&plan, slot, &self.registry, &launcher)?;
        Ok(())
    }

    fn exec(&self, descriptor: &Path) -> Result<()> {
        // everything on stderr lands in the task's log file:
        simple_logging::log_to_stderr(self.settings.log_level());
        exec::run_unit(descriptor, &self.registry)
    }
}

/// Loading happens before a logger exists, so what it did is reported here.
fn log_plan_details(plan: &Plan) {
    log::debug!(
        "expanded {} axis groups into {} configurations",
        plan.grid.groups().len(),
        plan.len()
    );
    log::debug!("temp folder: {:?}", plan.settings.temp_folder);
    log::debug!("result root: {:?}", plan.settings.result_root_folder);
}
