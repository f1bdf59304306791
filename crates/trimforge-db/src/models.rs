//! Rust models matching the database schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trimforge_common::{OperationId, UserId};

/// Lifecycle state of a trim operation.
///
/// `Queued` is the only state an operation is created in; `Finished` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    Queued,
    Finished,
    Failed,
}

impl OperationState {
    /// Whether the operation has left `Queued` for good.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued)
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Finished => write!(f, "finished"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for OperationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "finished" => Ok(Self::Finished),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid operation state: {}", s)),
        }
    }
}

/// A single trim job and its lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    pub id: OperationId,
    pub user_id: UserId,
    /// Input artifact reference exactly as the caller supplied it.
    pub source_ref: String,
    pub trim_start: String,
    pub trim_end: String,
    /// Generated output artifact name; unique across all operations.
    pub output_ref: String,
    pub state: OperationState,
    /// Why the operation failed, when `state` is `Failed`.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// User model.
///
/// The password hash is never read back by trimforge and so is not part of
/// the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub has_push_subscription: bool,
    pub created_at: DateTime<Utc>,
}
