//! Error types for quill.
//!
//! Every ledger failure is one of a small closed taxonomy:
//! - validation (malformed entry, overdrawn burn)
//! - signature (missing or mismatched entry signature)
//! - integrity (hash or link mismatch, out-of-order append)
//! - persistence (unreadable snapshot, failed write)
//! - duplicate key (key already pending in the mempool)
//!
//! Each carries a stable [`ErrorCode`] for callers that route errors to
//! a wire protocol.

use std::io;
use thiserror::Error;

/// Result type for quill operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error codes.
///
/// - 1xxx: validation errors (client)
/// - 3xxx: conflict errors (client)
/// - 5xxx: storage and integrity errors (server)
/// - 6xxx: internal errors (server)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Validation errors (1xxx)
    InvalidEntry = 1001,
    InvalidSignature = 1002,
    InsufficientBalance = 1003,
    MempoolFull = 1004,

    // Conflict errors (3xxx)
    DuplicateKey = 3001,

    // Storage / integrity errors (5xxx)
    StorageRead = 5001,
    StorageWrite = 5002,
    StorageCorruption = 5003,
    IntegrityViolation = 5004,

    // Internal errors (6xxx)
    Serialization = 6001,
    Internal = 6002,
}

impl ErrorCode {
    /// Get the numeric code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Check if this is a client error.
    pub fn is_client_error(self) -> bool {
        (1000..5000).contains(&self.code())
    }

    /// Check if this is a server error.
    pub fn is_server_error(self) -> bool {
        self.code() >= 5000
    }

    /// Check if this error is retryable.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCode::StorageRead | ErrorCode::StorageWrite)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

/// Errors that can occur in quill.
#[derive(Debug, Error)]
pub enum Error {
    /// Entry is malformed or its balance effect is invalid.
    #[error("[{code}] validation error: {message}")]
    Validation { code: ErrorCode, message: String },

    /// Entry signature is missing or does not match its content.
    #[error("[{code}] signature error: {message}")]
    Signature { code: ErrorCode, message: String },

    /// Chain hash or linkage mismatch.
    #[error("[{code}] integrity error: {message}")]
    Integrity { code: ErrorCode, message: String },

    /// Snapshot could not be read, parsed or written.
    #[error("[{code}] persistence error: {message}")]
    Persistence {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Key is already pending in the mempool.
    #[error("[{code}] duplicate key: {key}")]
    DuplicateKey { code: ErrorCode, key: String },

    /// Canonical encoding failed.
    #[error("[{code}] serialization error: {message}")]
    Serialization {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal error.
    #[error("[{code}] internal error: {message}")]
    Internal { code: ErrorCode, message: String },
}

impl Error {
    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Validation { code, .. } => *code,
            Error::Signature { code, .. } => *code,
            Error::Integrity { code, .. } => *code,
            Error::Persistence { code, .. } => *code,
            Error::DuplicateKey { code, .. } => *code,
            Error::Serialization { code, .. } => *code,
            Error::Internal { code, .. } => *code,
        }
    }

    /// Check if this is a client error.
    pub fn is_client_error(&self) -> bool {
        self.code().is_client_error()
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        self.code().is_server_error()
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl Error {
    /// Create a Validation error for a malformed entry.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            code: ErrorCode::InvalidEntry,
            message: message.into(),
        }
    }

    /// Create a Validation error for a burn that would overdraw a token.
    pub fn insufficient_balance(token_id: &str, balance: u64, requested: u64) -> Self {
        Error::Validation {
            code: ErrorCode::InsufficientBalance,
            message: format!(
                "burn of {requested} from token {token_id} exceeds balance {balance}"
            ),
        }
    }

    /// Create a Validation error for a full mempool.
    pub fn mempool_full(capacity: usize) -> Self {
        Error::Validation {
            code: ErrorCode::MempoolFull,
            message: format!("mempool is at capacity ({capacity} entries)"),
        }
    }

    /// Create a Signature error.
    pub fn signature(message: impl Into<String>) -> Self {
        Error::Signature {
            code: ErrorCode::InvalidSignature,
            message: message.into(),
        }
    }

    /// Create an Integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Error::Integrity {
            code: ErrorCode::IntegrityViolation,
            message: message.into(),
        }
    }

    /// Create a Persistence error for a failed read.
    pub fn persistence(message: impl Into<String>) -> Self {
        Error::Persistence {
            code: ErrorCode::StorageRead,
            message: message.into(),
            source: None,
        }
    }

    /// Create a Persistence error for a failed write.
    pub fn persistence_write(message: impl Into<String>) -> Self {
        Error::Persistence {
            code: ErrorCode::StorageWrite,
            message: message.into(),
            source: None,
        }
    }

    /// Create a Persistence error for a snapshot that exists but cannot be parsed.
    pub fn corrupt_snapshot(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Persistence {
            code: ErrorCode::StorageCorruption,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a DuplicateKey error.
    pub fn duplicate_key(key: impl Into<String>) -> Self {
        Error::DuplicateKey {
            code: ErrorCode::DuplicateKey,
            key: key.into(),
        }
    }

    /// Create an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            code: ErrorCode::Internal,
            message: message.into(),
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization {
            code: ErrorCode::Serialization,
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization {
            code: ErrorCode::Serialization,
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Persistence {
            code: ErrorCode::StorageRead,
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Validation {
            code: ErrorCode::InvalidEntry,
            message: format!("invalid hex: {e}"),
        }
    }
}
