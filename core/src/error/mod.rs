/// Error taxonomy for the overwrite engine
///
/// Every failure the engine can observe maps onto one `WipeError` variant.
/// All of them are fatal to the job: there is no automatic retry of a
/// partially written pass. The only retried operation is the exclusive
/// device open, driven by a [`RetryStrategy`] before the job starts writing.
///
/// ```text
///   Created ──InvalidConfig──▶ Failed
///   Locking ──Lock───────────▶ LockFailed
///   Running ──Write/Timeout/Verification──▶ Failed
///   any     ──Cancelled──────▶ Cancelled
/// ```
pub mod retry;

pub use retry::{FixedInterval, RetryStrategy};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WipeError {
    #[error("Could not lock {device}: {reason}")]
    Lock { device: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Write failed at offset {offset}: {reason}")]
    Write { offset: u64, reason: String },

    #[error("Verification failed for chunk {chunk} at offset {offset}: {reason}")]
    Verification {
        chunk: u64,
        offset: u64,
        reason: String,
    },

    #[error("{operation} took {elapsed:?} (limit {limit:?})")]
    Timeout {
        operation: String,
        elapsed: Duration,
        limit: Duration,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

pub type WipeResult<T> = Result<T, WipeError>;

impl WipeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WipeError::Lock { .. } => ErrorKind::Lock,
            WipeError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            WipeError::Write { .. } => ErrorKind::Write,
            WipeError::Verification { .. } => ErrorKind::Verification,
            WipeError::Timeout { .. } => ErrorKind::Timeout,
            WipeError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn write(offset: u64, err: impl fmt::Display) -> Self {
        WipeError::Write {
            offset,
            reason: err.to_string(),
        }
    }

    pub fn lock(device: impl Into<String>, reason: impl fmt::Display) -> Self {
        WipeError::Lock {
            device: device.into(),
            reason: reason.to_string(),
        }
    }
}

/// Serializable error category carried by the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Lock,
    InvalidConfig,
    Write,
    Verification,
    Timeout,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Lock => "LockError",
            ErrorKind::InvalidConfig => "InvalidConfigError",
            ErrorKind::Write => "WriteError",
            ErrorKind::Verification => "VerificationError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Cancelled => "CancelledError",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_one_to_one() {
        let cases = vec![
            (WipeError::lock("/dev/sdz", "busy"), ErrorKind::Lock),
            (WipeError::InvalidConfig("x".into()), ErrorKind::InvalidConfig),
            (WipeError::write(0, "short"), ErrorKind::Write),
            (
                WipeError::Verification {
                    chunk: 1,
                    offset: 0,
                    reason: "all zero".into(),
                },
                ErrorKind::Verification,
            ),
            (
                WipeError::Timeout {
                    operation: "write".into(),
                    elapsed: Duration::from_secs(2),
                    limit: Duration::from_secs(1),
                },
                ErrorKind::Timeout,
            ),
            (WipeError::Cancelled, ErrorKind::Cancelled),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{}", err);
        }
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = WipeError::write(4096, "Partial write: 10 of 20 bytes");
        assert!(err.to_string().contains("4096"));
        assert!(err.to_string().contains("Partial write"));

        let err = WipeError::Timeout {
            operation: "sync".into(),
            elapsed: Duration::from_secs(3),
            limit: Duration::from_secs(1),
        };
        assert!(err.to_string().contains("sync took 3s"));
    }

    #[test]
    fn test_error_kind_display_uses_taxonomy_names() {
        assert_eq!(ErrorKind::Verification.to_string(), "VerificationError");
        assert_eq!(ErrorKind::Lock.to_string(), "LockError");
    }
}
