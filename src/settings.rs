use std::path::PathBuf;

use anyhow::Result;
use log::LevelFilter;

use crate::args::{Args, Command};
use crate::logging;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Config file {0:?} does not exist")]
    ConfigNotFound(PathBuf),
}

/// What the invocation asked for, with paths resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Run {
        config: PathBuf,
        force_rerun: bool,
        in_process: bool,
    },
    List {
        config: PathBuf,
    },
    Worker {
        plan: PathBuf,
        slot: usize,
    },
    Exec {
        descriptor: PathBuf,
    },
}

/// Settings are like Args, except all the logic has
/// been applied so e.g. config paths are checked and canonicalized.
#[derive(Debug)]
pub struct Settings {
    pub action: Action,
    pub verbose: bool,
}

impl Settings {
    pub fn log_level(&self) -> LevelFilter {
        logging::level(self.verbose)
    }
}

fn config_path(config: &str) -> Result<PathBuf> {
    let path = PathBuf::from(config);
    if !path.exists() {
        return Err(Error::ConfigNotFound(path).into());
    }
    Ok(path.canonicalize()?)
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let action = match args.command {
            Command::Run {
                config,
                force_rerun,
                in_process,
            } => Action::Run {
                config: config_path(&config)?,
                force_rerun,
                in_process,
            },
            Command::List { config } => Action::List {
                config: config_path(&config)?,
            },
            Command::Worker { plan, slot } => Action::Worker { plan, slot },
            Command::Exec { descriptor } => Action::Exec { descriptor },
        };
        Ok(Self {
            action,
            verbose: args.verbose,
        })
    }
}
