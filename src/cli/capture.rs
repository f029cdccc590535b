//! CLI command for running a snapshot capture.
//!
//! Triggers the capture script on the device, waits, then downloads the
//! left and right images into `<local_dir>/<unique_id>/<side>/`.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::ConnectionArgs;
use snapfetch::remote::{CaptureOrchestrator, RemoteSession};

#[derive(Args)]
#[command(about = "Trigger a snapshot on the device and download the images")]
pub struct CaptureCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Device/run identifier used in remote and local paths
    #[arg(long)]
    pub unique_id: Option<String>,

    /// Local directory receiving the images
    #[arg(long)]
    pub local_dir: Option<PathBuf>,

    /// Seconds to wait after triggering the capture
    #[arg(long)]
    pub command_delay: Option<u64>,

    /// Epoch stamped on the images (defaults to now)
    #[arg(long)]
    pub epoch: Option<i64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl CaptureCommand {
    pub fn execute(&self) -> Result<()> {
        let config = self.connection.load_config()?;
        let connection = self.connection.resolve(&config)?;

        let mut capture = config.capture.clone();
        if let Some(id) = &self.unique_id {
            capture.unique_id = id.clone();
        }
        if let Some(dir) = &self.local_dir {
            capture.local_base_dir = dir.clone();
        }
        if let Some(delay) = self.command_delay {
            capture.command_delay = delay;
        }

        let orchestrator = CaptureOrchestrator::new(capture)?;
        let mut session = RemoteSession::new(connection)?;
        let epoch = self
            .epoch
            .unwrap_or_else(|| chrono::Utc::now().timestamp());

        let report = orchestrator.run(&mut session, epoch)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            for file in &report.files {
                let mark = if file.downloaded { "✓" } else { "✗" };
                println!(
                    "{} {:<5} {} -> {}",
                    mark,
                    file.side,
                    file.remote_path,
                    file.local_path.display()
                );
            }
        }

        if !report.all_succeeded() {
            let failed: Vec<_> = report.failed().map(|f| f.side.as_str()).collect();
            anyhow::bail!("Some images failed to download: {}", failed.join(", "));
        }
        Ok(())
    }
}
