use std::path::PathBuf;

use clap::{Parser, Subcommand};

const CMD_NAME: &str = "gd";
const DEFAULT_CONFIG: &str = "grid.json";

/// Stores our command-line args format.
#[derive(Parser, Debug)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Print additional debugging info
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every configuration in the grid across the configured GPUs
    Run {
        /// Grid definition file
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
        #[arg(env = "GD_CONFIG")]
        config: String,

        /// Re-run configurations whose result directory already exists
        #[arg(short, long)]
        force_rerun: bool,

        /// Drive all slots from threads of this process instead of one process per slot
        #[arg(long)]
        in_process: bool,
    },

    /// Print the expanded configurations and slots without running anything
    List {
        /// Grid definition file
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
        #[arg(env = "GD_CONFIG")]
        config: String,
    },

    /// Drive one slot of a running dispatch (started by `run`)
    #[command(hide = true)]
    Worker {
        #[arg(long, value_name = "FILE")]
        plan: PathBuf,
        #[arg(long, value_name = "N")]
        slot: usize,
    },

    /// Run a single task descriptor (started by a worker)
    #[command(hide = true)]
    Exec {
        #[arg(value_name = "DESCRIPTOR")]
        descriptor: PathBuf,
    },
}
