//! Bounded retry for snapshot I/O.

use std::io;
use std::time::Duration;

use quill_core::{Error, ErrorCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Retry policy for local file operations.
///
/// Backoff is linear: attempt `n` sleeps `backoff * n` before retrying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Zero is treated as one.
    pub max_attempts: u32,
    /// Base delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds or attempts run out.
    ///
    /// On exhaustion the last I/O error is wrapped in a persistence error
    /// carrying `code`.
    pub fn run<T>(
        &self,
        what: &str,
        code: ErrorCode,
        mut op: impl FnMut() -> io::Result<T>,
    ) -> quill_core::Result<T> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    warn!(attempt, max_attempts = attempts, error = %e, "{what} failed, retrying");
                    std::thread::sleep(self.backoff * attempt);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(Error::Persistence {
                        code,
                        message: format!("{what} failed after {attempts} attempts: {e}"),
                        source: Some(Box::new(e)),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_succeeds_after_transient_failures() {
        let mut calls = 0;

        let value = fast(3)
            .run("write", ErrorCode::StorageWrite, || {
                calls += 1;
                if calls < 3 {
                    Err(io::Error::new(io::ErrorKind::Interrupted, "busy"))
                } else {
                    Ok(calls)
                }
            })
            .unwrap();

        assert_eq!(value, 3);
    }

    #[test]
    fn test_exhaustion_is_persistence_error() {
        let mut calls = 0;

        let err = fast(2)
            .run("write", ErrorCode::StorageWrite, || -> io::Result<()> {
                calls += 1;
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            })
            .unwrap_err();

        assert_eq!(calls, 2);
        assert_eq!(err.code(), ErrorCode::StorageWrite);
        assert!(err.to_string().contains("after 2 attempts"));
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let mut calls = 0;
        let policy = RetryPolicy {
            max_attempts: 0,
            backoff: Duration::ZERO,
        };

        let _ = policy.run("read", ErrorCode::StorageRead, || -> io::Result<()> {
            calls += 1;
            Err(io::Error::new(io::ErrorKind::Other, "nope"))
        });

        assert_eq!(calls, 1);
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }
}
