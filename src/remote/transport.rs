//! The transport seam between the session logic and the SSH library.
//!
//! `RemoteSession` only talks to these traits. The production implementation
//! lives in [`crate::remote::ssh`]; tests plug in scripted fakes.

use crate::config::ConnectionConfig;
use crate::error::Result;
use std::path::Path;
use std::time::Duration;

/// Result of executing a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Standard output from the command
    pub stdout: String,
    /// Standard error from the command
    pub stderr: String,
    /// Exit code (0 for success)
    pub exit_code: i32,
}

impl ExecutionResult {
    /// Returns true if the command succeeded (exit code 0).
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Metadata of a remote path, as reported by SFTP `stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteFileStat {
    pub size: u64,
    pub is_regular_file: bool,
}

/// Opens live transport handles.
pub trait Connector {
    type Handle: TransportHandle;

    /// Opens, verifies and authenticates one fresh connection.
    ///
    /// A failed call must not leave anything open.
    fn open(&self, config: &ConnectionConfig) -> Result<Self::Handle>;
}

/// One live, authenticated connection.
pub trait TransportHandle {
    /// Runs `command` and waits for it to exit.
    fn exec(&mut self, command: &str, timeout: Duration) -> Result<ExecutionResult>;

    /// Stats `remote_path` over a short-lived SFTP channel.
    fn stat(&mut self, remote_path: &str) -> Result<RemoteFileStat>;

    /// Copies `remote_path` to `local_path`, returning the bytes written.
    fn download(&mut self, remote_path: &str, local_path: &Path, timeout: Duration)
        -> Result<u64>;

    /// Gracefully shuts the connection down.
    fn disconnect(&mut self) -> Result<()>;
}
