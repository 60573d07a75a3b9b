use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use serde_json::Value;

use grid::render_value;

use crate::{Error, GpuTask, TaskDescriptor};

const COMMAND_KEY: &str = "command";
const ENV_KEY: &str = "env";
const WORK_DIR_VAR: &str = "WORK_DIR";

/// Runs the config's `command` with bash, inside the work dir.
///
/// Every config entry whose key is a valid environment variable name is
/// exported with its rendered value, so a command like
/// `python train.py --lr $lr` sees the current configuration.
/// An optional `env` object in the config becomes the task's required env.
#[derive(Debug)]
pub struct ShellTask {
    command: String,
    work_dir: PathBuf,
    vars: Vec<(String, String)>,
    env: BTreeMap<String, String>,
}

impl ShellTask {
    pub const TYPE: &'static str = "shell";

    pub fn new(descriptor: &TaskDescriptor) -> Result<Self> {
        let command = match descriptor.config.get(COMMAND_KEY) {
            Some(Value::String(command)) => command.clone(),
            _ => return Err(Error::MissingConfigKey(COMMAND_KEY).into()),
        };

        let vars = descriptor
            .config
            .iter()
            .filter(|(k, _)| is_env_name(k))
            .map(|(k, v)| (k.clone(), render_value(v).into_owned()))
            .collect();

        let mut env = BTreeMap::new();
        if let Some(Value::Object(map)) = descriptor.config.get(ENV_KEY) {
            for (k, v) in map {
                env.insert(k.clone(), render_value(v).into_owned());
            }
        }

        Ok(Self {
            command,
            work_dir: descriptor.work_dir.clone(),
            vars,
            env,
        })
    }

    /// [`Constructor`](crate::Constructor)-shaped wrapper around [`ShellTask::new`].
    pub fn from_descriptor(descriptor: &TaskDescriptor) -> Result<Box<dyn GpuTask>> {
        Ok(Box::new(Self::new(descriptor)?))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("/usr/bin/env");
        cmd.arg("bash").arg("-euo").arg("pipefail");
        cmd.current_dir(&self.work_dir);
        cmd.envs(self.vars.iter().map(|(k, v)| (k, v)));
        cmd.env(WORK_DIR_VAR, &self.work_dir);
        cmd.arg("-c").arg(&self.command);
        cmd
    }
}

impl GpuTask for ShellTask {
    fn run(&self) -> Result<()> {
        log::info!("running `{}` in {:?}", self.command, self.work_dir);
        let status = self
            .command()
            .status()
            .with_context(|| format!("while starting `{}`", self.command))?;
        if !status.success() {
            return Err(Error::CommandFailed(status).into());
        }
        Ok(())
    }

    fn required_env(&self) -> BTreeMap<String, String> {
        self.env.clone()
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
