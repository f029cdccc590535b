//! libssh2-backed transport.
//!
//! Connections are verified against `~/.ssh/known_hosts`: a matching key is
//! accepted, an unknown host is accepted and logged, and a changed key is
//! rejected. Metadata comes over SFTP and file bytes over SCP.

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::remote::transport::{Connector, ExecutionResult, RemoteFileStat, TransportHandle};
use log::{debug, info, warn};
use ssh2::{CheckResult, KnownHostFileKind, Session};
use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Opens SSH sessions with libssh2.
#[derive(Debug, Clone, Default)]
pub struct Ssh2Connector {
    known_hosts: Option<PathBuf>,
}

impl Ssh2Connector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a specific known-hosts file instead of `~/.ssh/known_hosts`.
    pub fn with_known_hosts(mut self, path: PathBuf) -> Self {
        self.known_hosts = Some(path);
        self
    }

    fn known_hosts_path(&self) -> Option<PathBuf> {
        self.known_hosts
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".ssh").join("known_hosts")))
    }

    /// Checks the server key against known_hosts, accepting unknown hosts.
    fn verify_host_key(&self, session: &Session, config: &ConnectionConfig) -> Result<()> {
        let (key, _key_type) = session
            .host_key()
            .ok_or_else(|| Error::HostKey("server did not present a host key".to_string()))?;

        let mut known_hosts = session.known_hosts()?;
        if let Some(path) = self.known_hosts_path() {
            if path.exists() {
                if let Err(e) = known_hosts.read_file(&path, KnownHostFileKind::OpenSSH) {
                    warn!("Could not read {}: {}", path.display(), e);
                }
            }
        }

        match known_hosts.check_port(&config.host, config.port, key) {
            CheckResult::Match => {
                debug!("Host key for {} matches known_hosts", config.host);
                Ok(())
            }
            CheckResult::NotFound => {
                info!(
                    "Accepting unknown host key for {}:{}",
                    config.host, config.port
                );
                Ok(())
            }
            CheckResult::Mismatch => Err(Error::HostKey(format!(
                "host key for {} does not match the entry in known_hosts",
                config.host
            ))),
            CheckResult::Failure => Err(Error::HostKey(format!(
                "could not check host key for {}",
                config.host
            ))),
        }
    }

    /// Authenticates using the password, then the key file, then the agent.
    fn authenticate(&self, session: &Session, config: &ConnectionConfig) -> Result<()> {
        debug!("Authenticating as user: {}", config.user);
        let mut tried = Vec::new();

        if let Some(password) = &config.password {
            tried.push("password");
            match session.userauth_password(&config.user, password) {
                Ok(()) => {
                    debug!("Password authentication successful");
                    return Ok(());
                }
                Err(e) => warn!("Password authentication failed: {}", e),
            }
        }

        if let Some(key_path) = config.expanded_ssh_key() {
            tried.push("public key");
            debug!("Attempting public key authentication with: {:?}", key_path);
            match session.userauth_pubkey_file(&config.user, None, &key_path, None) {
                Ok(()) => {
                    debug!("Public key authentication successful");
                    return Ok(());
                }
                Err(e) => warn!("Public key authentication failed: {}", e),
            }
        }

        tried.push("agent");
        match session.userauth_agent(&config.user) {
            Ok(()) => {
                debug!("Agent authentication successful");
                return Ok(());
            }
            Err(e) => warn!("Agent authentication failed: {}", e),
        }

        Err(Error::Authentication(format!(
            "no method succeeded for user {} (tried: {})",
            config.user,
            tried.join(", ")
        )))
    }
}

impl Connector for Ssh2Connector {
    type Handle = Ssh2Handle;

    fn open(&self, config: &ConnectionConfig) -> Result<Ssh2Handle> {
        let addr_str = format!("{}:{}", config.host, config.port);
        let addr = addr_str
            .to_socket_addrs()
            .map_err(|e| {
                Error::Io(io::Error::new(
                    e.kind(),
                    format!("Failed to resolve host '{}': {}", config.host, e),
                ))
            })?
            .next()
            .ok_or_else(|| {
                Error::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Failed to resolve host '{}': no addresses", config.host),
                ))
            })?;

        let tcp = TcpStream::connect_timeout(&addr, config.connect_timeout()).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("Failed to connect to {}: {}", addr_str, e),
            ))
        })?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        // Bounds the banner exchange and authentication.
        session.set_timeout(timeout_millis(config.connect_timeout()));
        session.handshake()?;

        self.verify_host_key(&session, config)?;
        self.authenticate(&session, config)?;

        if !session.authenticated() {
            return Err(Error::Authentication(
                "SSH connection established but not authenticated".to_string(),
            ));
        }

        Ok(Ssh2Handle { session })
    }
}

/// A connected, authenticated libssh2 session.
pub struct Ssh2Handle {
    session: Session,
}

impl TransportHandle for Ssh2Handle {
    fn exec(&mut self, command: &str, timeout: Duration) -> Result<ExecutionResult> {
        self.session.set_timeout(timeout_millis(timeout));

        let mut channel = self.session.channel_session()?;
        channel.exec(command)?;

        let mut stdout = Vec::new();
        channel.read_to_end(&mut stdout)?;

        let mut stderr = Vec::new();
        channel.stderr().read_to_end(&mut stderr)?;

        channel.wait_close()?;
        let exit_code = channel.exit_status()?;

        debug!("Command exit code: {}", exit_code);

        Ok(ExecutionResult {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
        })
    }

    fn stat(&mut self, remote_path: &str) -> Result<RemoteFileStat> {
        // The SFTP channel closes when `sftp` drops, on every return path.
        let sftp = self.session.sftp()?;
        let stat = sftp.stat(Path::new(remote_path))?;

        Ok(RemoteFileStat {
            size: stat.size.unwrap_or(0),
            is_regular_file: stat.is_file(),
        })
    }

    fn download(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        timeout: Duration,
    ) -> Result<u64> {
        self.session.set_timeout(timeout_millis(timeout));

        let (mut channel, scp_stat) = self.session.scp_recv(Path::new(remote_path))?;
        debug!(
            "SCP receiving {} ({} bytes) -> {}",
            remote_path,
            scp_stat.size(),
            local_path.display()
        );

        let mut file = File::create(local_path)?;
        let written = copy_exact(&mut channel, &mut file, scp_stat.size())?;
        file.sync_all()?;

        channel.send_eof()?;
        channel.wait_eof()?;
        channel.close()?;
        channel.wait_close()?;

        Ok(written)
    }

    fn disconnect(&mut self) -> Result<()> {
        self.session
            .disconnect(None, "snapfetch session closed", None)?;
        Ok(())
    }
}

/// Copies exactly `expected` bytes; an early EOF is a transport error.
fn copy_exact<R: Read, W: Write>(reader: &mut R, writer: &mut W, expected: u64) -> Result<u64> {
    let written = io::copy(&mut reader.take(expected), writer)?;
    if written != expected {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "SCP channel closed after {} of {} bytes",
                written, expected
            ),
        )));
    }
    Ok(written)
}

fn timeout_millis(timeout: Duration) -> u32 {
    timeout.as_millis().min(u32::MAX as u128) as u32
}
