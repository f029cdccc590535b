//! CLI command for managing snapfetch configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use snapfetch::config::Config;

#[derive(Args)]
#[command(about = "Manage snapfetch configuration")]
pub struct ConfigCommand {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show the configuration file path
    Path,

    /// Write an example configuration file
    Init {
        /// Overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(&self) -> Result<()> {
        match &self.action {
            ConfigAction::Show => self.show_config(),
            ConfigAction::Path => self.show_path(),
            ConfigAction::Init { force } => self.init_config(*force),
        }
    }

    fn config_path(&self) -> Result<PathBuf> {
        self.config
            .clone()
            .or_else(Config::default_path)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Could not determine config directory\n\n\
                     Suggestions:\n\
                     • Check HOME environment variable is set\n\
                     • Pass an explicit path with --config <path>"
                )
            })
    }

    fn show_config(&self) -> Result<()> {
        let path = self.config_path()?;
        let config = Config::load_from(&path)?;

        match &config.connection {
            Some(conn) => {
                println!("Connection: {}", conn.connection_string());
                println!(
                    "  Auth:        {}{}",
                    if conn.password.is_some() { "password " } else { "" },
                    conn.ssh_key.as_deref().unwrap_or("")
                );
                println!(
                    "  Retries:     {} attempts, {}s apart",
                    conn.max_retries, conn.retry_delay
                );
                println!(
                    "  Timeouts:    connect {}s, command {}s, transfer {}s",
                    conn.connect_timeout, conn.command_timeout, conn.transfer_timeout
                );
            }
            None => {
                println!("No connection configured.");
                println!();
                println!("To create a configuration file, run:");
                println!("  snapfetch config init");
            }
        }

        let capture = &config.capture;
        println!();
        println!("Capture:");
        println!("  Unique id:   {}", capture.unique_id);
        println!("  Script:      {}", capture.remote_script);
        println!("  Remote dir:  {}", capture.remote_base_dir);
        println!("  Local dir:   {}", capture.local_base_dir.display());
        println!("  Delay:       {}s", capture.command_delay);
        Ok(())
    }

    fn show_path(&self) -> Result<()> {
        let path = self.config_path()?;
        println!("{}", path.display());
        if !path.exists() {
            println!("(file does not exist yet)");
        }
        Ok(())
    }

    fn init_config(&self, force: bool) -> Result<()> {
        let path = self.config_path()?;
        if path.exists() && !force {
            anyhow::bail!(
                "Configuration already exists at {}\n\nUse --force to overwrite it.",
                path.display()
            );
        }

        Config::example().save_to(&path)?;
        println!("✓ Wrote example configuration to {}", path.display());
        println!("  Edit the connection and capture settings before running a capture.");
        Ok(())
    }
}
