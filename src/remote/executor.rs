//! Remote command execution with retry.

use crate::error::{Error, Result};
use crate::remote::retry::retry_with_policy;
use crate::remote::session::RemoteSession;
use crate::remote::transport::{Connector, ExecutionResult, TransportHandle};
use log::{debug, info, warn};

impl<C: Connector> RemoteSession<C> {
    /// Runs `command` once, without retry or exit-status interpretation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] or the transport's error.
    pub fn run(&mut self, command: &str) -> Result<ExecutionResult> {
        let timeout = self.config.command_timeout();
        let result = self.handle_mut()?.exec(command, timeout)?;

        if !result.stdout.is_empty() {
            debug!("Command stdout: {}", result.stdout.trim_end());
        }
        Ok(result)
    }

    /// Executes a remote command, retrying up to `max_retries` times.
    ///
    /// Stderr output is logged as a warning and otherwise ignored; a non-zero
    /// exit status fails the attempt.
    ///
    /// # Returns
    ///
    /// The trimmed stdout, or `None` when the command printed nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] immediately when there is no
    /// connection, and [`Error::Command`] once every attempt has failed.
    pub fn execute(&mut self, command: &str) -> Result<Option<String>> {
        if self.handle.is_none() {
            return Err(Error::NotConnected);
        }

        let policy = self.retry_policy.clone();
        let max_attempts = policy.attempts();

        let result = retry_with_policy(&policy, "Command execution", |attempt| {
            info!(
                "Executing command (attempt {}/{}): {}",
                attempt, max_attempts, command
            );
            let output = self.run(command)?;

            let errors = output.stderr.trim();
            if !errors.is_empty() {
                warn!("Command produced stderr output: {}", errors);
            }

            if !output.is_success() {
                return Err(Error::ExitStatus(output.exit_code));
            }

            let stdout = output.stdout.trim();
            Ok((!stdout.is_empty()).then(|| stdout.to_string()))
        });

        result.map_err(|exhausted| Error::Command {
            command: command.to_string(),
            attempts: exhausted.attempts,
            message: exhausted.last_error.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::test_support::{fake_session, ExecReply, FakeRemote};

    #[test]
    fn test_execution_result_is_success() {
        let success = ExecutionResult {
            stdout: "ok".to_string(),
            stderr: String::new(),
            exit_code: 0,
        };
        assert!(success.is_success());

        let failure = ExecutionResult {
            stdout: String::new(),
            stderr: "error".to_string(),
            exit_code: 1,
        };
        assert!(!failure.is_success());
    }

    #[test]
    fn test_execute_echo_ok() {
        let (mut session, remote) = fake_session(
            3,
            FakeRemote::default().with_exec_replies(vec![ExecReply::ok("ok\n")]),
        );
        session.connect().unwrap();

        let output = session.execute("echo ok").unwrap();

        assert_eq!(output.as_deref(), Some("ok"));
        assert_eq!(remote.borrow().exec_log, vec!["echo ok".to_string()]);
    }

    #[test]
    fn test_execute_blank_stdout_is_none() {
        let (mut session, _remote) = fake_session(
            3,
            FakeRemote::default().with_exec_replies(vec![ExecReply::ok("  \n")]),
        );
        session.connect().unwrap();

        assert_eq!(session.execute("true").unwrap(), None);
    }

    #[test]
    fn test_stderr_alone_does_not_fail() {
        let reply = ExecReply::Output(ExecutionResult {
            stdout: "done".to_string(),
            stderr: "warning: low light".to_string(),
            exit_code: 0,
        });
        let (mut session, remote) =
            fake_session(3, FakeRemote::default().with_exec_replies(vec![reply]));
        session.connect().unwrap();

        assert_eq!(session.execute("snap").unwrap().as_deref(), Some("done"));
        assert_eq!(remote.borrow().exec_log.len(), 1);
    }

    #[test]
    fn test_nonzero_exit_on_every_attempt_raises() {
        let (mut session, remote) = fake_session(
            3,
            FakeRemote::default().with_exec_replies(vec![
                ExecReply::exit(1, "boom"),
                ExecReply::exit(1, "boom"),
                ExecReply::exit(2, "boom"),
            ]),
        );
        session.connect().unwrap();

        let err = session.execute("false").unwrap_err();

        match err {
            Error::Command {
                command,
                attempts,
                message,
            } => {
                assert_eq!(command, "false");
                assert_eq!(attempts, 3);
                assert!(message.contains("exit status 2"));
            }
            other => panic!("expected command error, got {:?}", other),
        }
        assert_eq!(remote.borrow().exec_log.len(), 3);
    }

    #[test]
    fn test_transient_failure_then_success() {
        let (mut session, remote) = fake_session(
            3,
            FakeRemote::default().with_exec_replies(vec![
                ExecReply::TransportError("timed out".to_string()),
                ExecReply::exit(1, ""),
                ExecReply::ok("captured"),
            ]),
        );
        session.connect().unwrap();

        assert_eq!(
            session.execute("snap").unwrap().as_deref(),
            Some("captured")
        );
        assert_eq!(remote.borrow().exec_log.len(), 3);
    }

    #[test]
    fn test_execute_without_connection() {
        let (mut session, remote) = fake_session(3, FakeRemote::default());
        assert!(matches!(
            session.execute("echo ok"),
            Err(Error::NotConnected)
        ));
        assert!(remote.borrow().exec_log.is_empty());
    }

    #[test]
    fn test_run_returns_raw_result() {
        let (mut session, _remote) = fake_session(
            3,
            FakeRemote::default().with_exec_replies(vec![ExecReply::exit(3, "nope")]),
        );
        session.connect().unwrap();

        let result = session.run("ls /missing").unwrap();
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stderr, "nope");
    }
}
