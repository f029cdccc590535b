//! Verified file download over the session's connection.
//!
//! A download only counts once the local file exists and has exactly the byte
//! size the remote reported just before the copy. Failed attempts never leave
//! a file behind.
//!
//! After the last attempt the two failure kinds surface differently: a size
//! mismatch returns `Ok(false)` so that one bad image does not abort a batch,
//! while a transport fault returns [`Error::Transfer`].

use crate::error::{Error, Result};
use crate::remote::session::RemoteSession;
use crate::remote::transport::{Connector, TransportHandle};
use log::{debug, error, info, warn};
use std::fs;
use std::path::Path;

/// Outcome of one download attempt that reached the verification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verification {
    Verified,
    /// `local_size` is `None` when nothing landed at the local path.
    Mismatch {
        remote_size: u64,
        local_size: Option<u64>,
    },
}

impl<C: Connector> RemoteSession<C> {
    /// Returns true only if `remote_path` exists and is a regular file.
    ///
    /// Every error, including "not found" and a missing connection, yields
    /// `false`.
    pub fn remote_file_exists(&mut self, remote_path: &str) -> bool {
        let handle = match self.handle_mut() {
            Ok(handle) => handle,
            Err(e) => {
                error!("Error checking remote file existence: {}", e);
                return false;
            }
        };

        match handle.stat(remote_path) {
            Ok(stat) => {
                if !stat.is_regular_file {
                    debug!("{} exists but is not a regular file", remote_path);
                }
                stat.is_regular_file
            }
            Err(e) => {
                debug!("stat {} failed: {}", remote_path, e);
                false
            }
        }
    }

    /// Downloads `remote_path` to `local_path` and verifies its size.
    ///
    /// # Returns
    ///
    /// `Ok(true)` once an attempt passes verification. `Ok(false)` if the
    /// remote file is absent (no attempt is made) or if every attempt ended
    /// in a size mismatch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transfer`] when the final attempt failed in the
    /// transport layer.
    pub fn download_file(&mut self, remote_path: &str, local_path: &Path) -> Result<bool> {
        if !self.remote_file_exists(remote_path) {
            error!("Remote file does not exist: {}", remote_path);
            return Ok(false);
        }

        let policy = self.retry_policy.clone();
        let max_attempts = policy.attempts();

        for attempt in 1..=max_attempts {
            info!(
                "Attempting download (attempt {}/{}): {} -> {}",
                attempt,
                max_attempts,
                remote_path,
                local_path.display()
            );

            match self.download_once(remote_path, local_path) {
                Ok(Verification::Verified) => {
                    info!("Download completed and verified successfully");
                    return Ok(true);
                }
                Ok(Verification::Mismatch {
                    remote_size,
                    local_size,
                }) => {
                    match local_size {
                        Some(local_size) => error!(
                            "File size mismatch (attempt {}/{}): remote={}, local={}",
                            attempt, max_attempts, remote_size, local_size
                        ),
                        None => error!(
                            "Downloaded file not found at local path (attempt {}/{}): {}",
                            attempt,
                            max_attempts,
                            local_path.display()
                        ),
                    }
                    if attempt == max_attempts {
                        return Ok(false);
                    }
                }
                Err(e) => {
                    error!(
                        "Download failed (attempt {}/{}): {}",
                        attempt, max_attempts, e
                    );
                    remove_partial(local_path);
                    if attempt == max_attempts {
                        return Err(Error::Transfer {
                            remote_path: remote_path.to_string(),
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                }
            }

            policy.pause(attempt);
        }

        Ok(false)
    }

    fn download_once(&mut self, remote_path: &str, local_path: &Path) -> Result<Verification> {
        let timeout = self.config.transfer_timeout();
        let handle = self.handle_mut()?;

        let remote_size = handle.stat(remote_path)?.size;
        handle.download(remote_path, local_path, timeout)?;

        if !local_path.exists() {
            return Ok(Verification::Mismatch {
                remote_size,
                local_size: None,
            });
        }

        let local_size = fs::metadata(local_path)?.len();
        if local_size == remote_size {
            return Ok(Verification::Verified);
        }

        fs::remove_file(local_path)?;
        Ok(Verification::Mismatch {
            remote_size,
            local_size: Some(local_size),
        })
    }
}

/// Best-effort removal of a partially written local file.
fn remove_partial(local_path: &Path) {
    if local_path.exists() {
        if let Err(e) = fs::remove_file(local_path) {
            warn!(
                "Could not remove partial file {}: {}",
                local_path.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::test_support::{fake_session, DownloadBehavior, FakeRemote};
    use tempfile::TempDir;

    const IMAGE: &str = "/home/pi/C1/left/C1_100_left.jpg";

    fn image_bytes() -> Vec<u8> {
        (0..2048u32).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_remote_file_exists_for_regular_file() {
        let (mut session, remote) =
            fake_session(3, FakeRemote::default().with_file(IMAGE, b"jpeg"));
        session.connect().unwrap();

        assert!(session.remote_file_exists(IMAGE));
        assert_eq!(remote.borrow().stat_calls, 1);
    }

    #[test]
    fn test_remote_file_exists_false_cases() {
        let (mut session, remote) =
            fake_session(3, FakeRemote::default().with_directory("/home/pi/C1"));
        session.connect().unwrap();

        assert!(!session.remote_file_exists("/home/pi/missing.jpg"));
        assert!(!session.remote_file_exists("/home/pi/C1"));

        remote.borrow_mut().stat_error = true;
        assert!(!session.remote_file_exists(IMAGE));
    }

    #[test]
    fn test_remote_file_exists_without_connection() {
        let (mut session, remote) =
            fake_session(3, FakeRemote::default().with_file(IMAGE, b"jpeg"));
        assert!(!session.remote_file_exists(IMAGE));
        assert_eq!(remote.borrow().stat_calls, 0);
    }

    #[test]
    fn test_download_round_trip() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("C1_100_left.jpg");
        let bytes = image_bytes();
        let (mut session, remote) =
            fake_session(3, FakeRemote::default().with_file(IMAGE, &bytes));
        session.connect().unwrap();

        assert!(session.download_file(IMAGE, &local).unwrap());

        assert_eq!(fs::read(&local).unwrap(), bytes);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(remote.borrow().download_calls, 1);
    }

    #[test]
    fn test_missing_remote_file_fails_fast() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("out.jpg");
        let (mut session, remote) = fake_session(3, FakeRemote::default());
        session.connect().unwrap();

        assert!(!session.download_file(IMAGE, &local).unwrap());

        assert_eq!(remote.borrow().download_calls, 0);
        assert!(!local.exists());
    }

    #[test]
    fn test_directory_is_not_downloaded() {
        let dir = TempDir::new().unwrap();
        let (mut session, remote) =
            fake_session(3, FakeRemote::default().with_directory("/home/pi/C1"));
        session.connect().unwrap();

        assert!(!session
            .download_file("/home/pi/C1", &dir.path().join("C1"))
            .unwrap());
        assert_eq!(remote.borrow().download_calls, 0);
    }

    #[test]
    fn test_size_mismatch_every_attempt_returns_false() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("out.jpg");
        let (mut session, remote) = fake_session(
            3,
            FakeRemote::default()
                .with_file(IMAGE, &image_bytes())
                .with_downloads(&[DownloadBehavior::Truncate(100); 3]),
        );
        session.connect().unwrap();

        assert!(!session.download_file(IMAGE, &local).unwrap());

        assert_eq!(remote.borrow().download_calls, 3);
        assert!(!local.exists());
    }

    #[test]
    fn test_mismatch_then_success() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("out.jpg");
        let bytes = image_bytes();
        let (mut session, remote) = fake_session(
            3,
            FakeRemote::default()
                .with_file(IMAGE, &bytes)
                .with_downloads(&[DownloadBehavior::Truncate(10), DownloadBehavior::Exact]),
        );
        session.connect().unwrap();

        assert!(session.download_file(IMAGE, &local).unwrap());
        assert_eq!(remote.borrow().download_calls, 2);
        assert_eq!(fs::metadata(&local).unwrap().len(), bytes.len() as u64);
    }

    #[test]
    fn test_short_copy_reports_both_sizes() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("out.jpg");
        let (mut session, _remote) = fake_session(
            3,
            FakeRemote::default()
                .with_file(IMAGE, &image_bytes())
                .with_downloads(&[DownloadBehavior::Truncate(100)]),
        );
        session.connect().unwrap();

        let outcome = session.download_once(IMAGE, &local).unwrap();

        assert_eq!(
            outcome,
            Verification::Mismatch {
                remote_size: 2048,
                local_size: Some(100),
            }
        );
        assert!(!local.exists());
    }

    #[test]
    fn test_transport_error_every_attempt_raises() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("out.jpg");
        let (mut session, remote) = fake_session(
            3,
            FakeRemote::default()
                .with_file(IMAGE, &image_bytes())
                .with_downloads(&[DownloadBehavior::FailMidway; 3]),
        );
        session.connect().unwrap();

        let err = session.download_file(IMAGE, &local).unwrap_err();

        match err {
            Error::Transfer {
                remote_path,
                attempts,
                ..
            } => {
                assert_eq!(remote_path, IMAGE);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected transfer error, got {:?}", other),
        }
        assert_eq!(remote.borrow().download_calls, 3);
        assert!(!local.exists());
    }

    #[test]
    fn test_mismatch_then_transport_error_on_last_attempt_raises() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("out.jpg");
        let (mut session, _remote) = fake_session(
            2,
            FakeRemote::default()
                .with_file(IMAGE, &image_bytes())
                .with_downloads(&[DownloadBehavior::Truncate(1), DownloadBehavior::FailMidway]),
        );
        session.connect().unwrap();

        assert!(matches!(
            session.download_file(IMAGE, &local),
            Err(Error::Transfer { .. })
        ));
    }

    #[test]
    fn test_transport_error_then_mismatch_on_last_attempt_returns_false() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("out.jpg");
        let (mut session, _remote) = fake_session(
            2,
            FakeRemote::default()
                .with_file(IMAGE, &image_bytes())
                .with_downloads(&[DownloadBehavior::FailMidway, DownloadBehavior::Truncate(1)]),
        );
        session.connect().unwrap();

        assert!(!session.download_file(IMAGE, &local).unwrap());
        assert!(!local.exists());
    }
}
