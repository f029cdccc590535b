//! CLI command for downloading a single file with verification.

use anyhow::Result;
use clap::Args;
use std::fs;
use std::path::PathBuf;

use super::ConnectionArgs;
use snapfetch::remote::RemoteSession;

#[derive(Args)]
#[command(about = "Download one file from the device and verify its size")]
pub struct FetchCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Path of the file on the device
    pub remote_path: String,

    /// Local destination file
    pub local_path: PathBuf,
}

impl FetchCommand {
    pub fn execute(&self) -> Result<()> {
        let config = self.connection.load_config()?;
        let mut session = RemoteSession::new(self.connection.resolve(&config)?)?;

        if let Some(parent) = self.local_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let downloaded = session.with_connection(|session| {
            session.download_file(&self.remote_path, &self.local_path)
        })?;

        if !downloaded {
            anyhow::bail!(
                "Failed to download {} (missing on the device or failed verification)",
                self.remote_path
            );
        }

        println!("✓ {} -> {}", self.remote_path, self.local_path.display());
        Ok(())
    }
}
