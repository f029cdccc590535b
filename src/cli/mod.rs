pub mod capture;
pub mod check;
pub mod config;
pub mod exec;
pub mod fetch;

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use snapfetch::config::{Config, ConnectionConfig};

/// Connection flags shared by every command that talks to the device.
///
/// Flags override the values from the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Hostname or IP address of the device
    #[arg(long)]
    pub host: Option<String>,

    /// SSH port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// SSH username
    #[arg(short, long)]
    pub user: Option<String>,

    /// SSH password
    #[arg(long, env = "SNAPFETCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Path to an SSH private key
    #[arg(long)]
    pub ssh_key: Option<String>,

    /// Attempts for connect, command and download
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long)]
    pub retry_delay: Option<u64>,
}

impl ConnectionArgs {
    /// Loads the configuration file named by `--config`, or the default one.
    pub fn load_config(&self) -> Result<Config> {
        let config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        Ok(config)
    }

    /// Merges the flags over the file's connection settings.
    pub fn resolve(&self, config: &Config) -> Result<ConnectionConfig> {
        let mut connection = match (&config.connection, &self.host, &self.user) {
            (Some(existing), _, _) => existing.clone(),
            (None, Some(host), Some(user)) => ConnectionConfig::new(host.clone(), user.clone()),
            (None, _, _) => {
                return Err(anyhow::anyhow!(
                    "No connection configured.\n\n\
                     Pass --host and --user, or create a config file with:\n\
                     \n  snapfetch config init\n"
                ))
            }
        };

        if let Some(host) = &self.host {
            connection.host = host.clone();
        }
        if let Some(user) = &self.user {
            connection.user = user.clone();
        }
        if let Some(port) = self.port {
            connection.port = port;
        }
        if let Some(password) = &self.password {
            connection.password = Some(password.clone());
        }
        if let Some(key) = &self.ssh_key {
            connection.ssh_key = Some(key.clone());
        }
        if let Some(max_retries) = self.max_retries {
            connection.max_retries = max_retries;
        }
        if let Some(retry_delay) = self.retry_delay {
            connection.retry_delay = retry_delay;
        }

        connection.validate()?;
        Ok(connection)
    }
}
