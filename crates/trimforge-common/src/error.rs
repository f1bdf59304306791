//! Common error types used throughout trimforge.
//!
//! Each component reports failures in its own enum ([`StoreError`],
//! [`ProcessError`], [`NotifyError`]); the orchestrator surfaces all of them
//! through the unified [`Error`], which also knows how an HTTP layer should
//! map it to a status code.

use std::fmt;
use std::path::PathBuf;

/// Failures reported by the operation store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No matching record exists (or it is not in a state the call accepts).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record (e.g. "operation", "user").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The write would break a uniqueness or reference constraint.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backing database could not be reached or failed the statement.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Create a new NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a new Conflict error.
    pub fn conflict(msg: impl fmt::Display) -> Self {
        Self::Conflict(msg.to_string())
    }

    /// Create a new Unavailable error.
    pub fn unavailable(msg: impl fmt::Display) -> Self {
        Self::Unavailable(msg.to_string())
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Failures reported by the process runner. All are terminal for the job.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The transcoder exited unsuccessfully. `code` is `None` when it was
    /// killed by a signal or by the timeout.
    #[error("Transcoder failed (exit code {}): {message}", display_code(.code))]
    ToolFailed {
        /// Process exit code, if the process exited normally.
        code: Option<i32>,
        /// Human-readable failure description.
        message: String,
    },

    /// The source artifact does not exist.
    #[error("Source artifact missing: {}", .0.display())]
    SourceMissing(PathBuf),

    /// The working directory is unusable or the process could not be spawned.
    #[error("Environment error: {0}")]
    Environment(String),
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

impl ProcessError {
    /// Create a new ToolFailed error.
    pub fn tool_failed(code: Option<i32>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            code,
            message: message.into(),
        }
    }

    /// Create a new Environment error.
    pub fn environment(msg: impl Into<String>) -> Self {
        Self::Environment(msg.into())
    }
}

/// Failures reported by a notifier.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The push message could not be delivered.
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

impl NotifyError {
    /// Create a new DeliveryFailed error.
    pub fn delivery_failed(msg: impl fmt::Display) -> Self {
        Self::DeliveryFailed(msg.to_string())
    }
}

/// Common error type for trimforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request was missing a field or carried a malformed one.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested result does not exist, is not ready, or is not owned by
    /// the caller.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "operation", "result").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The transcoder run failed.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// A notification could not be delivered.
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new Validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::NotFound { .. } => 404,
            Error::Store(StoreError::NotFound { .. }) => 404,
            Error::Store(StoreError::Conflict(_)) => 409,
            Error::Store(StoreError::Unavailable(_)) => 503,
            Error::Process(_) => 500,
            Error::Notify(_) => 500,
            Error::Io(_) => 500,
            Error::Internal(_) => 500,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
