use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

use crate::fs::Fs;

/// Everything needed to start one execution unit.
#[derive(Debug)]
pub struct LaunchRequest<'a> {
    /// Name of the slot doing the launching, e.g. "gpu0".
    pub slot: &'a str,
    /// Marshaled task descriptor.
    pub descriptor: &'a Path,
    /// Slot overrides merged with the task's required env. Applied on top of
    /// the inherited process environment.
    pub env: &'a BTreeMap<String, String>,
    /// Where combined stdout/stderr goes; `None` discards it.
    pub log_file: Option<&'a Path>,
}

/// Starts an execution unit and blocks until it exits.
pub trait Launcher: Send + Sync {
    /// Returns the exit code, or `None` if the unit was killed by a signal.
    /// The code is informational only.
    fn launch(&self, request: &LaunchRequest<'_>, fs: &Fs) -> Result<Option<i32>>;
}

/// Runs `<exe> exec <descriptor>` as a child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    exe: PathBuf,
}

impl ProcessLauncher {
    pub fn new(exe: PathBuf) -> Self {
        Self { exe }
    }

    /// Launch units with the currently running binary, which must have been
    /// built with the same task registry.
    pub fn current_exe() -> Result<Self> {
        let exe = std::env::current_exe().context("while locating current executable")?;
        Ok(Self::new(exe))
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, request: &LaunchRequest<'_>, fs: &Fs) -> Result<Option<i32>> {
        let (stdout, stderr) = match request.log_file {
            Some(path) => {
                let out = fs
                    .create_file(path)
                    .with_context(|| format!("creating task log file {:?}", path))?;
                let err = out.try_clone().context("duplicating task log handle")?;
                (Stdio::from(out), Stdio::from(err))
            }
            None => (Stdio::null(), Stdio::null()),
        };

        let mut child = Command::new(&self.exe)
            .arg("exec")
            .arg(request.descriptor)
            .envs(request.env)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .with_context(|| {
                format!(
                    "{} failed to start execution unit {:?}",
                    request.slot, self.exe
                )
            })?;

        log::debug!("{} started execution unit pid {}", request.slot, child.id());

        // our copies of the log handles went away with the `Command`.
        let status = child
            .wait()
            .with_context(|| format!("{} failed to wait on execution unit", request.slot))?;
        Ok(status.code())
    }
}
