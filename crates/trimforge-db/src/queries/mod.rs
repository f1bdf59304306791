//! Database query modules.
//!
//! - users: user registration, email lookup, and push subscriptions
//! - operations: trim operation lifecycle tracking

pub mod operations;
pub mod users;

use rusqlite::ErrorCode;
use trimforge_common::StoreError;

/// Map an insert failure: constraint violations are the caller's problem,
/// anything else means the database could not do the work.
pub(crate) fn insert_error(err: rusqlite::Error) -> StoreError {
    if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
        StoreError::conflict(err)
    } else {
        StoreError::unavailable(err)
    }
}
