//! Remote device access over SSH.
//!
//! This module provides a retrying SSH session to a capture device, remote
//! command execution, size-verified file download, and the capture workflow
//! built on top of them.

pub mod executor;
pub mod orchestrator;
pub mod retry;
pub mod session;
pub mod ssh;
pub mod transfer;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use orchestrator::{CaptureFile, CaptureOrchestrator, CaptureReport, FileOutcome, SIDES};
pub use retry::{diagnose_ssh_error, retry_with_policy, Backoff, RetryExhausted, RetryPolicy};
pub use session::{RemoteSession, SessionState};
pub use ssh::{Ssh2Connector, Ssh2Handle};
pub use transport::{Connector, ExecutionResult, RemoteFileStat, TransportHandle};
