//! Scripted in-memory transport for unit tests.

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::remote::session::RemoteSession;
use crate::remote::transport::{Connector, ExecutionResult, RemoteFileStat, TransportHandle};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum RemoteEntry {
    File(Vec<u8>),
    Directory,
}

#[derive(Debug, Clone)]
pub enum ExecReply {
    Output(ExecutionResult),
    TransportError(String),
}

impl ExecReply {
    pub fn ok(stdout: &str) -> Self {
        ExecReply::Output(ExecutionResult {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
        })
    }

    pub fn exit(code: i32, stderr: &str) -> Self {
        ExecReply::Output(ExecutionResult {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code: code,
        })
    }
}

/// What the fake does when asked to copy a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadBehavior {
    Exact,
    /// Writes only this many bytes.
    Truncate(usize),
    /// Writes a few bytes, then fails.
    FailMidway,
}

#[derive(Debug)]
pub struct FakeRemote {
    pub connect_failures: u32,
    pub connect_attempts: u32,
    pub live_handles: u32,
    pub max_live_handles: u32,
    pub disconnects: u32,
    pub fail_disconnect: bool,
    pub exec_replies: VecDeque<ExecReply>,
    pub exec_log: Vec<String>,
    pub entries: HashMap<String, RemoteEntry>,
    pub stat_calls: u32,
    pub stat_error: bool,
    pub download_calls: u32,
    /// Consumed one per download call; `Exact` once empty.
    pub download_script: VecDeque<DownloadBehavior>,
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self {
            connect_failures: 0,
            connect_attempts: 0,
            live_handles: 0,
            max_live_handles: 0,
            disconnects: 0,
            fail_disconnect: false,
            exec_replies: VecDeque::new(),
            exec_log: Vec::new(),
            entries: HashMap::new(),
            stat_calls: 0,
            stat_error: false,
            download_calls: 0,
            download_script: VecDeque::new(),
        }
    }
}

impl FakeRemote {
    pub fn with_file(mut self, path: &str, contents: &[u8]) -> Self {
        self.entries
            .insert(path.to_string(), RemoteEntry::File(contents.to_vec()));
        self
    }

    pub fn with_directory(mut self, path: &str) -> Self {
        self.entries.insert(path.to_string(), RemoteEntry::Directory);
        self
    }

    pub fn with_downloads(mut self, behaviors: &[DownloadBehavior]) -> Self {
        self.download_script = behaviors.iter().copied().collect();
        self
    }

    pub fn with_exec_replies(mut self, replies: Vec<ExecReply>) -> Self {
        self.exec_replies = replies.into();
        self
    }
}

pub type SharedRemote = Rc<RefCell<FakeRemote>>;

pub struct FakeConnector {
    remote: SharedRemote,
}

impl FakeConnector {
    pub fn new(remote: FakeRemote) -> (Self, SharedRemote) {
        let shared = Rc::new(RefCell::new(remote));
        (
            Self {
                remote: Rc::clone(&shared),
            },
            shared,
        )
    }
}

impl Connector for FakeConnector {
    type Handle = FakeHandle;

    fn open(&self, _config: &ConnectionConfig) -> Result<FakeHandle> {
        let mut remote = self.remote.borrow_mut();
        remote.connect_attempts += 1;
        if remote.connect_attempts <= remote.connect_failures {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        remote.live_handles += 1;
        remote.max_live_handles = remote.max_live_handles.max(remote.live_handles);
        Ok(FakeHandle {
            remote: Rc::clone(&self.remote),
            open: true,
        })
    }
}

pub struct FakeHandle {
    remote: SharedRemote,
    open: bool,
}

impl FakeHandle {
    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.remote.borrow_mut().live_handles -= 1;
        }
    }
}

impl TransportHandle for FakeHandle {
    fn exec(&mut self, command: &str, _timeout: Duration) -> Result<ExecutionResult> {
        let mut remote = self.remote.borrow_mut();
        remote.exec_log.push(command.to_string());
        match remote.exec_replies.pop_front() {
            Some(ExecReply::Output(result)) => Ok(result),
            Some(ExecReply::TransportError(message)) => {
                Err(Error::Io(io::Error::new(io::ErrorKind::TimedOut, message)))
            }
            None => Ok(ExecutionResult::default()),
        }
    }

    fn stat(&mut self, remote_path: &str) -> Result<RemoteFileStat> {
        let mut remote = self.remote.borrow_mut();
        remote.stat_calls += 1;
        if remote.stat_error {
            return Err(Error::Io(io::Error::other("sftp subsystem failed")));
        }
        match remote.entries.get(remote_path) {
            Some(RemoteEntry::File(bytes)) => Ok(RemoteFileStat {
                size: bytes.len() as u64,
                is_regular_file: true,
            }),
            Some(RemoteEntry::Directory) => Ok(RemoteFileStat {
                size: 4096,
                is_regular_file: false,
            }),
            None => Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no such file",
            ))),
        }
    }

    fn download(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        _timeout: Duration,
    ) -> Result<u64> {
        let mut remote = self.remote.borrow_mut();
        remote.download_calls += 1;
        let behavior = remote
            .download_script
            .pop_front()
            .unwrap_or(DownloadBehavior::Exact);
        let bytes = match remote.entries.get(remote_path) {
            Some(RemoteEntry::File(bytes)) => bytes.clone(),
            _ => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    "scp: no such file",
                )))
            }
        };

        match behavior {
            DownloadBehavior::Exact => {
                fs::write(local_path, &bytes)?;
                Ok(bytes.len() as u64)
            }
            DownloadBehavior::Truncate(n) => {
                let n = n.min(bytes.len());
                fs::write(local_path, &bytes[..n])?;
                Ok(n as u64)
            }
            DownloadBehavior::FailMidway => {
                fs::write(local_path, &bytes[..bytes.len() / 2])?;
                Err(Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "scp: connection reset",
                )))
            }
        }
    }

    fn disconnect(&mut self) -> Result<()> {
        let fail = {
            let mut remote = self.remote.borrow_mut();
            remote.disconnects += 1;
            remote.fail_disconnect
        };
        self.release();
        if fail {
            return Err(Error::Io(io::Error::other("socket already closed")));
        }
        Ok(())
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// A session over a fake remote with zero retry delay.
pub fn fake_session(
    max_retries: u32,
    remote: FakeRemote,
) -> (RemoteSession<FakeConnector>, SharedRemote) {
    let config = ConnectionConfig::new("cam.local".to_string(), "pi".to_string())
        .with_max_retries(max_retries)
        .with_retry_delay(0);
    let (connector, shared) = FakeConnector::new(remote);
    let session = RemoteSession::with_connector(config, connector)
        .expect("test config is valid");
    (session, shared)
}
