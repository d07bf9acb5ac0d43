//! Error types module
//!
//! All failures surfaced by the staging workflow are unified under the
//! `SyncError` enum. Content that cannot be decoded for identifier extraction
//! has no variant: it degrades to the `UNKNOWN` sentinel and a risk flag.

use std::io;

use crate::hooks::Action;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like unknown ids
    Debug,
    /// Warning level - for refused operations
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error reporting - defines how an error should be presented
/// to an operator.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "NOT_FOUND")
    fn error_code(&self) -> &'static str;

    /// Whether the whole operation can be retried safely
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the caller
    fn suggested_action(&self) -> Option<&'static str>;

    /// Caller-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from callers
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;

    /// Process exit code used by the command-line surface
    fn exit_code(&self) -> i32;
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: user '{user}' may not {action}")]
    Forbidden { user: String, action: Action },

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Integrity mismatch for {upload_id}: expected {expected}, found {actual}")]
    IntegrityMismatch {
        upload_id: String,
        expected: String,
        actual: String,
    },

    #[error("Diff review required before approving {0}")]
    DiffRequired(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timed out after {seconds}s during {operation}")]
    Timeout { operation: String, seconds: u64 },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type SyncResult<T> = Result<T, SyncError>;

impl From<io::Error> for SyncError {
    fn from(err: io::Error) -> Self {
        SyncError::StorageFailure(format!("IO error: {}", err))
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        SyncError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::StorageFailure(format!("JSON encoding error: {}", err))
    }
}

impl From<uuid::Error> for SyncError {
    fn from(err: uuid::Error) -> Self {
        SyncError::InvalidInput(format!("Upload id is not a valid UUID: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, sensitive, log_level, exit_code).
fn sync_error_static_metadata(
    err: &SyncError,
) -> (&'static str, bool, Option<&'static str>, bool, LogLevel, i32) {
    match err {
        SyncError::NotFound(_) => (
            "NOT_FOUND",
            false,
            Some("Check the upload id and its current status"),
            false,
            LogLevel::Debug,
            2,
        ),
        SyncError::Forbidden { .. } => (
            "FORBIDDEN",
            false,
            Some("Ask an administrator for the required role"),
            false,
            LogLevel::Warn,
            3,
        ),
        SyncError::StorageFailure(_) => (
            "STORAGE_FAILURE",
            true,
            Some("Retry the whole operation"),
            true,
            LogLevel::Error,
            4,
        ),
        SyncError::IntegrityMismatch { .. } => (
            "INTEGRITY_MISMATCH",
            false,
            Some("Re-stage the original file"),
            false,
            LogLevel::Error,
            5,
        ),
        SyncError::DiffRequired(_) => (
            "DIFF_REQUIRED",
            false,
            Some("Review the diff for this upload before approving"),
            false,
            LogLevel::Debug,
            6,
        ),
        SyncError::InvalidInput(_) => (
            "INVALID_INPUT",
            false,
            Some("Check the arguments and try again"),
            false,
            LogLevel::Debug,
            7,
        ),
        SyncError::Timeout { .. } => (
            "TIMEOUT",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Warn,
            8,
        ),
        SyncError::Internal(_) | SyncError::InternalWithSource { .. } => (
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
            1,
        ),
    }
}

impl SyncError {
    /// Get the error type name for detailed error output
    pub fn error_type(&self) -> &'static str {
        match self {
            SyncError::NotFound(_) => "NotFound",
            SyncError::Forbidden { .. } => "Forbidden",
            SyncError::StorageFailure(_) => "StorageFailure",
            SyncError::IntegrityMismatch { .. } => "IntegrityMismatch",
            SyncError::DiffRequired(_) => "DiffRequired",
            SyncError::InvalidInput(_) => "InvalidInput",
            SyncError::Timeout { .. } => "Timeout",
            SyncError::Internal(_) | SyncError::InternalWithSource { .. } => "Internal",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for SyncError {
    fn error_code(&self) -> &'static str {
        sync_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        sync_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        sync_error_static_metadata(self).2
    }

    fn is_sensitive(&self) -> bool {
        sync_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        sync_error_static_metadata(self).4
    }

    fn exit_code(&self) -> i32 {
        sync_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            SyncError::NotFound(ref msg) => msg.clone(),
            SyncError::Forbidden { user, action } => {
                format!("User '{}' is not permitted to {}", user, action)
            }
            SyncError::StorageFailure(_) => "Failed to access the log store".to_string(),
            SyncError::IntegrityMismatch { upload_id, .. } => format!(
                "Stored bytes for {} no longer match their recorded digest",
                upload_id
            ),
            SyncError::DiffRequired(ref id) => {
                format!("Upload {} must be diff-reviewed before approval", id)
            }
            SyncError::InvalidInput(ref msg) => msg.clone(),
            SyncError::Timeout { operation, .. } => format!("Timed out during {}", operation),
            SyncError::Internal(_) | SyncError::InternalWithSource { .. } => {
                "Internal error".to_string()
            }
        }
    }
}
