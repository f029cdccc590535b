use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapfetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("Connection to {target} failed after {attempts} attempt(s): {message}")]
    Connection {
        target: String,
        attempts: u32,
        message: String,
    },

    #[error("Command `{command}` failed after {attempts} attempt(s): {message}")]
    Command {
        command: String,
        attempts: u32,
        message: String,
    },

    #[error("Transfer of {remote_path} failed after {attempts} attempt(s): {message}")]
    Transfer {
        remote_path: String,
        attempts: u32,
        message: String,
    },

    #[error("Command failed with exit status {0}")]
    ExitStatus(i32),

    #[error("Host key verification failed: {0}")]
    HostKey(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Session is not connected")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Error = SnapfetchError;
pub type Result<T> = std::result::Result<T, Error>;
