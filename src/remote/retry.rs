//! Retry logic for remote operations.
//!
//! Connect, execute and download all share the same bounded-attempt loop with
//! a sleep between attempts. The default backoff is a fixed delay; an
//! exponential strategy is available for callers that want it.

use crate::config::ConnectionConfig;
use crate::error::Error;
use log::{error, info};
use std::thread;
use std::time::Duration;

/// How the delay between attempts evolves.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// The same delay before every retry.
    Fixed,
    /// `delay * multiplier^(attempt - 1)`, capped at `max_delay`.
    Exponential { multiplier: f64, max_delay: Duration },
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between attempts
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(5))
    }
}

impl RetryPolicy {
    /// Creates a fixed-delay retry policy.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Fixed,
        }
    }

    /// Builds the policy described by a connection configuration.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::fixed(config.max_retries, config.retry_delay())
    }

    /// Switches to exponential backoff.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Number of attempts actually made; a zero bound still runs once.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Calculates the delay after a failed `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential {
                multiplier,
                max_delay,
            } => {
                let exponent = attempt.saturating_sub(1) as i32;
                let millis = self.delay.as_millis() as f64 * multiplier.powi(exponent);
                Duration::from_millis(millis.min(max_delay.as_millis() as f64) as u64)
            }
        }
    }

    /// Sleeps for the delay that follows a failed `attempt`.
    pub fn pause(&self, attempt: u32) {
        let delay = self.delay_after(attempt);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

/// The last failure of an operation that ran out of attempts.
#[derive(Debug)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: Error,
}

/// Runs `operation` until it succeeds or the policy's attempts are spent.
///
/// The closure receives the 1-based attempt number. Every failure is logged
/// with the attempt number before the sleep, and no sleep follows the final
/// attempt.
///
/// # Errors
///
/// Returns the last error together with the number of attempts made.
pub fn retry_with_policy<T, F>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> std::result::Result<T, RetryExhausted>
where
    F: FnMut(u32) -> crate::error::Result<T>,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match operation(attempt) {
            Ok(result) => {
                if attempt > 1 {
                    info!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                error!(
                    "{} failed (attempt {}/{}): {}",
                    operation_name, attempt, max_attempts, e
                );
                if attempt >= max_attempts {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                policy.pause(attempt);
                attempt += 1;
            }
        }
    }
}

/// Provides helpful diagnostic information for SSH connection failures.
pub fn diagnose_ssh_error(error: &Error, config: &ConnectionConfig) -> String {
    let error_str = error.to_string().to_lowercase();
    let host = &config.host;
    let port = config.port;

    let mut suggestions = Vec::new();

    if error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("no route to host")
        || error_str.contains("resolve")
    {
        suggestions.push(format!("• Verify the device '{}' is powered on and reachable", host));
        suggestions.push(format!(
            "• Check if SSH is running on port {} (try: ssh -p {} {})",
            port, port, host
        ));
        suggestions.push("• Verify your network connection and firewall settings".to_string());
    }

    if error_str.contains("authentication")
        || error_str.contains("permission denied")
        || error_str.contains("password")
    {
        if config.password.is_some() {
            suggestions.push(format!(
                "• Verify the password for user '{}' (or set SNAPFETCH_PASSWORD)",
                config.user
            ));
        }
        match &config.ssh_key {
            Some(key) => {
                suggestions.push(format!("• Check that the SSH key exists: {}", key));
                suggestions.push(format!(
                    "• Verify the public key is in ~/.ssh/authorized_keys on {}",
                    host
                ));
            }
            None => {
                suggestions.push("• Try specifying a password or an SSH key".to_string());
                suggestions.push("• Verify your SSH agent is running (ssh-add -l)".to_string());
            }
        }
    }

    if error_str.contains("host key") || error_str.contains("known_hosts") {
        suggestions.push(format!(
            "• The device key changed; remove the stale entry: ssh-keygen -R {}",
            host
        ));
        suggestions.push("• Then reconnect manually to accept the new key".to_string());
    }

    if suggestions.is_empty() {
        suggestions.push("• Verify the device is accessible".to_string());
        suggestions.push(format!(
            "• Test the connection manually: ssh -p {} {}",
            port,
            config.connection_string()
        ));
    }

    format!(
        "SSH connection failed: {}\n\nTroubleshooting suggestions:\n{}",
        error,
        suggestions.join("\n")
    )
}
