//! Configuration management for snapfetch.
//!
//! This module handles loading and saving the SSH connection settings and the
//! capture job settings used by the `snapfetch` binary.
//!
//! # Configuration File Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/snapfetch/config.yml`
//! - macOS: `~/Library/Application Support/snapfetch/config.yml`
//! - Windows: `C:\Users\<User>\AppData\Roaming\snapfetch\config.yml`
//!
//! # Example Configuration
//!
//! ```yaml
//! connection:
//!   host: "192.168.0.105"
//!   user: "pi"
//!   port: 22
//!   password: "raspberry"
//!   max_retries: 5
//!   retry_delay: 10
//! capture:
//!   unique_id: "C250416_v0.1"
//!   remote_script: "/home/pi/take_snap_shot.bash"
//!   remote_base_dir: "/home/pi"
//!   local_base_dir: "./downloaded_images/v0.1"
//!   command_delay: 15
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default SSH port
const DEFAULT_SSH_PORT: u16 = 22;

/// Default number of attempts for connect, execute and download
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay between attempts in seconds
const DEFAULT_RETRY_DELAY: u64 = 5;

/// Connect and banner timeout in seconds
const DEFAULT_CONNECT_TIMEOUT: u64 = 30;

/// Remote command timeout in seconds
const DEFAULT_COMMAND_TIMEOUT: u64 = 60;

/// SCP socket timeout in seconds
const DEFAULT_TRANSFER_TIMEOUT: u64 = 60;

const DEFAULT_REMOTE_SCRIPT: &str = "/home/pi/take_snap_shot.bash";
const DEFAULT_REMOTE_BASE_DIR: &str = "/home/pi";
const DEFAULT_LOCAL_BASE_DIR: &str = "./downloaded_images/v0.1";
const DEFAULT_COMMAND_DELAY: u64 = 15;
const DEFAULT_IMAGE_EXTENSION: &str = "jpg";

/// Main configuration structure for snapfetch.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// SSH connection to the capture device
    #[serde(default)]
    pub connection: Option<ConnectionConfig>,

    /// Capture job settings
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Connection settings for a remote device.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Hostname or IP address of the device
    pub host: String,

    /// SSH username for authentication
    pub user: String,

    /// SSH port (default: 22)
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Password, tried first when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Path to SSH private key file, tried after the password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,

    /// Number of attempts for each retried operation
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between attempts in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,

    /// Connect and banner timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Remote command timeout in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,

    /// File transfer socket timeout in seconds
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout: u64,
}

/// Settings for the snapshot capture job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Identifier of the device/run, used in remote and local paths
    #[serde(default)]
    pub unique_id: String,

    /// Script on the device that takes the snapshot
    #[serde(default = "default_remote_script")]
    pub remote_script: String,

    /// Directory on the device holding the `<unique_id>/<side>` folders
    #[serde(default = "default_remote_base_dir")]
    pub remote_base_dir: String,

    /// Local directory receiving the `<unique_id>/<side>` folders
    #[serde(default = "default_local_base_dir")]
    pub local_base_dir: PathBuf,

    /// Seconds to wait after triggering the capture before downloading
    #[serde(default = "default_command_delay")]
    pub command_delay: u64,

    /// Extension of the captured images
    #[serde(default = "default_image_extension")]
    pub image_extension: String,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay() -> u64 {
    DEFAULT_RETRY_DELAY
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT
}

fn default_transfer_timeout() -> u64 {
    DEFAULT_TRANSFER_TIMEOUT
}

fn default_remote_script() -> String {
    DEFAULT_REMOTE_SCRIPT.to_string()
}

fn default_remote_base_dir() -> String {
    DEFAULT_REMOTE_BASE_DIR.to_string()
}

fn default_local_base_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOCAL_BASE_DIR)
}

fn default_command_delay() -> u64 {
    DEFAULT_COMMAND_DELAY
}

fn default_image_extension() -> String {
    DEFAULT_IMAGE_EXTENSION.to_string()
}

impl Config {
    /// Returns the default configuration file path for the current platform.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("snapfetch").join("config.yml"))
    }

    /// Loads configuration from the default location.
    ///
    /// Returns `Ok(Config::default())` if no config file exists.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    /// Loads configuration from a specific file path.
    ///
    /// Returns `Ok(Config::default())` if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to read config file: {}\n\n\
                     File path: {}\n\n\
                     Suggestions:\n\
                     • Check file permissions: ls -la {}\n\
                     • Try recreating with: snapfetch config init --force",
                    e,
                    path.display(),
                    path.display()
                ),
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file: {}\n\n\
                 File path: {}\n\n\
                 Suggestions:\n\
                 • Check YAML syntax in the config file\n\
                 • Verify indentation uses spaces, not tabs\n\
                 • Backup and recreate: mv {} {}.bak && snapfetch config init",
                e,
                path.display(),
                path.display(),
                path.display()
            ))
        })
    }

    /// Saves configuration to a specific file path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create config directory {}: {}",
                        parent.display(),
                        e
                    ),
                ))
            })?;
        }

        let contents = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, contents).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write config file {}: {}", path.display(), e),
            ))
        })
    }

    /// Example configuration written by `snapfetch config init`.
    pub fn example() -> Self {
        Self {
            connection: Some(
                ConnectionConfig::new("192.168.0.105".to_string(), "pi".to_string())
                    .with_password("changeme".to_string())
                    .with_max_retries(5)
                    .with_retry_delay(10),
            ),
            capture: CaptureConfig::new("C250416_v0.1".to_string()),
        }
    }
}

impl ConnectionConfig {
    /// Creates a new connection configuration with required fields.
    pub fn new(host: String, user: String) -> Self {
        Self {
            host,
            user,
            port: DEFAULT_SSH_PORT,
            password: None,
            ssh_key: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
        }
    }

    /// Builder method to set the SSH port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder method to set the password.
    pub fn with_password(mut self, password: String) -> Self {
        self.password = Some(password);
        self
    }

    /// Builder method to set the SSH key path.
    pub fn with_ssh_key(mut self, key_path: String) -> Self {
        self.ssh_key = Some(key_path);
        self
    }

    /// Builder method to set the number of attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Builder method to set the delay between attempts, in seconds.
    pub fn with_retry_delay(mut self, seconds: u64) -> Self {
        self.retry_delay = seconds;
        self
    }

    /// Builder method to set the connect, command and transfer timeouts.
    pub fn with_timeouts(mut self, connect: u64, command: u64, transfer: u64) -> Self {
        self.connect_timeout = connect;
        self.command_timeout = command;
        self.transfer_timeout = transfer;
        self
    }

    /// Checks the settings that would otherwise fail on first use.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(Error::Config("user must not be empty".to_string()));
        }
        if self.max_retries == 0 {
            return Err(Error::Config(
                "max_retries must be at least 1".to_string(),
            ));
        }
        for (name, seconds) in [
            ("connect_timeout", self.connect_timeout),
            ("command_timeout", self.command_timeout),
            ("transfer_timeout", self.transfer_timeout),
        ] {
            if seconds == 0 {
                return Err(Error::Config(format!("{} must be at least 1 second", name)));
            }
        }
        Ok(())
    }

    /// Returns the SSH connection string (user@host:port).
    pub fn connection_string(&self) -> String {
        if self.port == DEFAULT_SSH_PORT {
            format!("{}@{}", self.user, self.host)
        } else {
            format!("{}@{}:{}", self.user, self.host, self.port)
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout)
    }

    /// Expands the SSH key path, replacing ~ with the home directory.
    pub fn expanded_ssh_key(&self) -> Option<PathBuf> {
        self.ssh_key.as_ref().map(|key| {
            if let Some(stripped) = key.strip_prefix("~/") {
                if let Some(home) = dirs::home_dir() {
                    return home.join(stripped);
                }
            }
            PathBuf::from(key)
        })
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ssh_key", &self.ssh_key)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .field("transfer_timeout", &self.transfer_timeout)
            .finish()
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl CaptureConfig {
    /// Creates a capture configuration with default paths for `unique_id`.
    pub fn new(unique_id: String) -> Self {
        Self {
            unique_id,
            remote_script: DEFAULT_REMOTE_SCRIPT.to_string(),
            remote_base_dir: DEFAULT_REMOTE_BASE_DIR.to_string(),
            local_base_dir: PathBuf::from(DEFAULT_LOCAL_BASE_DIR),
            command_delay: DEFAULT_COMMAND_DELAY,
            image_extension: DEFAULT_IMAGE_EXTENSION.to_string(),
        }
    }

    /// Builder method to set the local base directory.
    pub fn with_local_base_dir(mut self, dir: PathBuf) -> Self {
        self.local_base_dir = dir;
        self
    }

    /// Builder method to set the remote base directory.
    pub fn with_remote_base_dir(mut self, dir: String) -> Self {
        self.remote_base_dir = dir;
        self
    }

    /// Builder method to set the post-trigger delay, in seconds.
    pub fn with_command_delay(mut self, seconds: u64) -> Self {
        self.command_delay = seconds;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.unique_id.trim().is_empty() {
            return Err(Error::Config(
                "capture.unique_id must be set (or pass --unique-id)".to_string(),
            ));
        }
        if self.unique_id.contains('/') {
            return Err(Error::Config(format!(
                "capture.unique_id must not contain '/': {}",
                self.unique_id
            )));
        }
        Ok(())
    }

    pub fn command_delay(&self) -> Duration {
        Duration::from_secs(self.command_delay)
    }
}
