//! SSH session lifecycle: connect with retry, close, scoped use.
//!
//! A `RemoteSession` owns at most one live transport handle. `close()` is
//! idempotent and never fails, and dropping a session closes it, so every
//! successful `connect()` is paired with exactly one shutdown.

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::remote::retry::{diagnose_ssh_error, retry_with_policy, RetryPolicy};
use crate::remote::ssh::Ssh2Connector;
use crate::remote::transport::{Connector, TransportHandle};
use log::{error, info};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A retrying SSH session to one device.
pub struct RemoteSession<C: Connector = Ssh2Connector> {
    pub(crate) config: ConnectionConfig,
    pub(crate) retry_policy: RetryPolicy,
    connector: C,
    pub(crate) handle: Option<C::Handle>,
    state: SessionState,
}

impl RemoteSession<Ssh2Connector> {
    /// Creates a session backed by libssh2. Nothing is opened yet.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Self::with_connector(config, Ssh2Connector::new())
    }
}

impl<C: Connector> RemoteSession<C> {
    /// Creates a session using a custom connector.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation.
    pub fn with_connector(config: ConnectionConfig, connector: C) -> Result<Self> {
        config.validate()?;
        let retry_policy = RetryPolicy::from_config(&config);
        Ok(Self {
            config,
            retry_policy,
            connector,
            handle: None,
            state: SessionState::Disconnected,
        })
    }

    /// Replaces the retry policy derived from the configuration.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Establishes the connection, retrying up to `max_retries` times.
    ///
    /// An already-connected session is closed first, so the session never
    /// holds two handles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] once every attempt has failed.
    pub fn connect(&mut self) -> Result<()> {
        if self.handle.is_some() {
            info!("Reconnecting: closing existing SSH connection first");
            self.close();
        }

        self.state = SessionState::Connecting;
        let target = self.config.connection_string();
        let max_attempts = self.retry_policy.attempts();

        let connector = &self.connector;
        let config = &self.config;
        let result = retry_with_policy(&self.retry_policy, "SSH connection", |attempt| {
            info!(
                "Attempting SSH connection to {} (attempt {}/{})",
                target, attempt, max_attempts
            );
            // A failed open drops whatever it had built.
            connector.open(config)
        });

        match result {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state = SessionState::Connected;
                info!("SSH connection established successfully");
                Ok(())
            }
            Err(exhausted) => {
                self.state = SessionState::Disconnected;
                error!("{}", diagnose_ssh_error(&exhausted.last_error, &self.config));
                Err(Error::Connection {
                    target,
                    attempts: exhausted.attempts,
                    message: exhausted.last_error.to_string(),
                })
            }
        }
    }

    /// Closes the connection if one is open. Never fails.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            match handle.disconnect() {
                Ok(()) => info!("SSH connection closed"),
                Err(e) => error!("Error closing SSH connection: {}", e),
            }
        }
        self.state = SessionState::Disconnected;
    }

    /// Connects, runs `operation`, and closes on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the connection error or whatever `operation` returned.
    pub fn with_connection<T, F>(&mut self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.connect()?;
        let result = operation(self);
        self.close();
        result
    }

    /// Borrows the live handle, or fails with `NotConnected`.
    pub(crate) fn handle_mut(&mut self) -> Result<&mut C::Handle> {
        self.handle.as_mut().ok_or(Error::NotConnected)
    }
}

impl<C: Connector> Drop for RemoteSession<C> {
    fn drop(&mut self) {
        self.close();
    }
}
