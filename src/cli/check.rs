//! CLI command for testing the SSH connection.

use anyhow::Result;
use clap::Args;

use super::ConnectionArgs;
use snapfetch::remote::RemoteSession;

#[derive(Args)]
#[command(about = "Test the SSH connection to the device")]
pub struct CheckCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl CheckCommand {
    pub fn execute(&self) -> Result<()> {
        let config = self.connection.load_config()?;
        let connection = self.connection.resolve(&config)?;
        let target = connection.connection_string();

        print!("Testing SSH connection to {}... ", target);
        let mut session = RemoteSession::new(connection)?;
        session.with_connection(|_| Ok(()))?;
        println!("✓");
        Ok(())
    }
}
