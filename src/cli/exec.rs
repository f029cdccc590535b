//! CLI command for running a command on the device.

use anyhow::Result;
use clap::Args;

use super::ConnectionArgs;
use snapfetch::remote::RemoteSession;

#[derive(Args)]
#[command(about = "Run a command on the device, retrying on failure")]
pub struct ExecCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Command line to run remotely
    pub command: String,
}

impl ExecCommand {
    pub fn execute(&self) -> Result<()> {
        let config = self.connection.load_config()?;
        let mut session = RemoteSession::new(self.connection.resolve(&config)?)?;

        let output = session.with_connection(|session| session.execute(&self.command))?;

        if let Some(stdout) = output {
            println!("{}", stdout);
        }
        Ok(())
    }
}
