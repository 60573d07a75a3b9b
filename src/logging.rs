use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use colored::Colorize;
use log::{Level, LevelFilter, Log, Metadata, Record};

const TIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("A logger has already been installed for this process")]
    AlreadyInitialized,
}

/// Logger for the scheduler and its worker processes.
///
/// Every line goes to stderr; if a scheduler log path is configured, lines
/// are also appended there with their source location. Several processes
/// may append to the same file.
pub struct DispatchLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
}

impl DispatchLogger {
    pub fn new(level: LevelFilter, file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(path) => {
                let f = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("while opening scheduler log {:?}", path))?;
                Some(Mutex::new(f))
            }
            None => None,
        };
        Ok(Self { level, file })
    }

    /// Install as the process-wide logger. Only the first call succeeds.
    pub fn init(self) -> Result<(), Error> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self)).map_err(|_| Error::AlreadyInitialized)?;
        log::set_max_level(level);
        Ok(())
    }

    fn timestamp() -> impl std::fmt::Display {
        chrono::Local::now().format(TIME_FORMAT)
    }

    /// "<time> file[line:N] LEVEL message", level colored
    fn console_line(record: &Record) -> String {
        let level = match record.level() {
            Level::Error => "ERROR".red(),
            Level::Warn => "WARN".yellow(),
            Level::Info => "INFO".green(),
            Level::Debug => "DEBUG".magenta(),
            Level::Trace => "TRACE".normal(),
        };
        format!(
            "{} {} {} {}",
            Self::timestamp(),
            Self::location(record),
            level,
            record.args()
        )
    }

    /// "<time> file[line:N] LEVEL message"
    fn file_line(record: &Record) -> String {
        format!(
            "{} {} {} {}",
            Self::timestamp(),
            Self::location(record),
            record.level(),
            record.args()
        )
    }

    fn location(record: &Record) -> String {
        let file = record
            .file()
            .map(|f| f.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(f))
            .unwrap_or("?");
        format!("{}[line:{}]", file, record.line().unwrap_or(0))
    }
}

impl Log for DispatchLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!("{}", Self::console_line(record));
        if let Some(file) = &self.file {
            let mut f = file.lock().unwrap_or_else(|e| e.into_inner());
            // one write per line, so appends from other processes don't interleave mid-line:
            let _ = f.write_all(format!("{}\n", Self::file_line(record)).as_bytes());
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.lock().unwrap_or_else(|e| e.into_inner()).flush();
        }
    }
}

/// Map the `-v` flag to a level.
pub fn level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}
