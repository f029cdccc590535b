//! Trigger snapshot captures on a remote device over SSH and fetch the
//! resulting images with retried, size-verified transfers.

pub mod config;
pub mod error;
pub mod logging;
pub mod remote;

pub use config::{CaptureConfig, Config, ConnectionConfig};
pub use error::{Error, Result, SnapfetchError};
pub use remote::{CaptureOrchestrator, CaptureReport, RemoteSession};
