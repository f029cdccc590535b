//! Logger setup for the `snapfetch` binary.
//!
//! Logs go to stderr through `env_logger` with an `info` default filter
//! (`RUST_LOG` overrides it). With a log file, every line is also appended
//! to that file.

use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Writes every log line to stderr and to a file.
struct TeeWriter<A, B> {
    primary: A,
    secondary: B,
}

impl<A: Write, B: Write> Write for TeeWriter<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.primary.write_all(buf)?;
        self.secondary.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()?;
        self.secondary.flush()
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("Failed to open log file {}: {}", path.display(), e),
            ))
        })
}

/// Initializes the global logger.
///
/// # Errors
///
/// Fails if the log file cannot be opened or a logger is already installed.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(path) = log_file {
        let file = open_log_file(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(TeeWriter {
            primary: io::stderr(),
            secondary: file,
        })));
    }

    builder
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}
