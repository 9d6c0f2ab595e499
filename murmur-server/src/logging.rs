//! Tracing setup. Stdout carries protocol lines only, so every log line goes
//! to stderr and, when it can be opened, to a durable log file.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::settings::DEFAULT_LOG_FILTER;

pub const LOG_FILE_NAME: &str = "murmur-server.log";

/// Where logs ended up.
#[derive(Debug)]
pub enum LogFile {
    Opened(PathBuf),
    Unavailable { path: PathBuf, error: io::Error },
}

/// Install the global subscriber. `RUST_LOG` overrides `filter`.
pub fn init(filter: &str, dir: &Path) -> LogFile {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let path = dir.join(LOG_FILE_NAME);
    let (file_layer, outcome) = match open_log_file(dir, &path) {
        Ok(file) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            ),
            LogFile::Opened(path),
        ),
        Err(error) => (None, LogFile::Unavailable { path, error }),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    outcome
}

fn open_log_file(dir: &Path, path: &Path) -> io::Result<File> {
    fs::create_dir_all(dir)?;
    OpenOptions::new().create(true).append(true).open(path)
}
