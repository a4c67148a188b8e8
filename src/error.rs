//! Error types for planboard
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown item, invalid status)
//! - 3: Blocked (no authenticated user)
//! - 4: Operation failed (remote store rejected a write, IO error)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the planboard CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for planboard operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Blocked (exit code 3)
    #[error("No authenticated user; sign in with `planboard user set <id>`")]
    Unauthenticated,

    // Operation failures (exit code 4)
    #[error("Remote store rejected {} update(s) [{}]: {message}", failed.len(), failed.join(", "))]
    RemoteFailure { failed: Vec<String>, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotFound(_)
            | Error::Validation(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_) => exit_codes::USER_ERROR,

            Error::Unauthenticated => exit_codes::BLOCKED,

            Error::RemoteFailure { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output, when the error carries any
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::RemoteFailure { failed, .. } => Some(serde_json::json!({ "failed": failed })),
            Error::NotFound(id) => Some(serde_json::json!({ "id": id })),
            _ => None,
        }
    }

    /// Whether the error happened at the remote boundary (and so is retryable)
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::RemoteFailure { .. })
    }
}

/// Result type alias for planboard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
