//! High-level snapshot capture workflow.
//!
//! Connects to the device, runs the capture script, waits for it to write
//! the images, then downloads the left and right images:
//!
//! 1. Trigger `bash <remote_script> <epoch> <unique_id>`
//! 2. Wait `command_delay` seconds
//! 3. Download `<remote_base_dir>/<id>/<side>/<id>_<epoch>_<side>.<ext>` for
//!    each side into `<local_base_dir>/<id>/<side>/`
//!
//! A failed trigger or a transport fault aborts the run. An image that fails
//! verification is only marked as failed in the report.

use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use crate::remote::session::RemoteSession;
use crate::remote::transport::Connector;
use log::{error, info};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

/// The two camera sides captured on every run.
pub const SIDES: [&str; 2] = ["left", "right"];

/// One image to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFile {
    pub side: &'static str,
    pub remote_path: String,
    pub local_path: PathBuf,
}

/// Per-image result of a capture run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub side: String,
    pub remote_path: String,
    pub local_path: PathBuf,
    pub downloaded: bool,
}

/// Result of a capture run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureReport {
    pub unique_id: String,
    pub epoch: i64,
    pub files: Vec<FileOutcome>,
}

impl CaptureReport {
    pub fn all_succeeded(&self) -> bool {
        self.files.iter().all(|f| f.downloaded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| !f.downloaded)
    }
}

/// Drives one capture-and-download cycle.
pub struct CaptureOrchestrator {
    config: CaptureConfig,
}

impl CaptureOrchestrator {
    /// Creates an orchestrator, validating the capture settings.
    pub fn new(config: CaptureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Local directory holding the per-side folders of this device.
    pub fn local_root(&self) -> PathBuf {
        self.config.local_base_dir.join(&self.config.unique_id)
    }

    /// Command that makes the device take a snapshot stamped with `epoch`.
    pub fn trigger_command(&self, epoch: i64) -> String {
        format!(
            "bash {} {} {}",
            self.config.remote_script, epoch, self.config.unique_id
        )
    }

    /// Lists the images a run stamped with `epoch` produces.
    pub fn plan(&self, epoch: i64) -> Vec<CaptureFile> {
        let id = &self.config.unique_id;
        let base = self.config.remote_base_dir.trim_end_matches('/');

        SIDES
            .iter()
            .map(|&side| {
                let file_name = format!(
                    "{}_{}_{}.{}",
                    id, epoch, side, self.config.image_extension
                );
                CaptureFile {
                    side,
                    remote_path: format!("{}/{}/{}/{}", base, id, side, file_name),
                    local_path: self.local_root().join(side).join(file_name),
                }
            })
            .collect()
    }

    /// Creates `<local_base_dir>/<unique_id>/<side>` for every side.
    pub fn prepare_local_dirs(&self) -> Result<()> {
        for side in SIDES {
            let dir = self.local_root().join(side);
            fs::create_dir_all(&dir).map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create {}: {}", dir.display(), e),
                ))
            })?;
        }
        Ok(())
    }

    /// Runs the full capture cycle on `session`.
    ///
    /// The session is connected here and closed before returning, whatever
    /// the outcome.
    ///
    /// # Errors
    ///
    /// Returns connection, command and transfer errors; verification
    /// failures are reported in the [`CaptureReport`] instead.
    pub fn run<C: Connector>(
        &self,
        session: &mut RemoteSession<C>,
        epoch: i64,
    ) -> Result<CaptureReport> {
        self.prepare_local_dirs()?;

        let report = session.with_connection(|session| {
            info!("Executing snapshot script...");
            session.execute(&self.trigger_command(epoch))?;

            let delay = self.config.command_delay();
            if !delay.is_zero() {
                info!("Waiting {:?} for the capture to finish", delay);
                thread::sleep(delay);
            }

            let mut files = Vec::new();
            for file in self.plan(epoch) {
                ensure_parent(&file.local_path)?;
                let downloaded = session.download_file(&file.remote_path, &file.local_path)?;
                if downloaded {
                    info!("Successfully downloaded {}", file.remote_path);
                } else {
                    error!("Failed to download {}", file.remote_path);
                }
                files.push(FileOutcome {
                    side: file.side.to_string(),
                    remote_path: file.remote_path,
                    local_path: file.local_path,
                    downloaded,
                });
            }

            Ok(CaptureReport {
                unique_id: self.config.unique_id.clone(),
                epoch,
                files,
            })
        });

        match &report {
            Ok(report) if report.all_succeeded() => info!("All images downloaded successfully"),
            Ok(_) => error!("Some images failed to download"),
            Err(e) => error!("Critical error in capture run: {}", e),
        }

        report
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
