//! Operation query operations.
//!
//! This module provides the CRUD operations that track a trim job from
//! submission to its terminal state. Every mutation is a single SQL
//! statement, so concurrent workers never observe a half-applied change.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use trimforge_common::{OperationId, StoreError, UserId};

use super::insert_error;
use crate::models::{Operation, OperationState};

type Result<T> = std::result::Result<T, StoreError>;

const OPERATION_COLUMNS: &str = "id, user_id, source_ref, trim_start, trim_end, output_ref, state,
                                 error_message, created_at, completed_at";

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_to_operation(row: &Row<'_>) -> rusqlite::Result<Operation> {
    Ok(Operation {
        id: OperationId::from(row.get::<_, i64>(0)?),
        user_id: UserId::from(row.get::<_, i64>(1)?),
        source_ref: row.get(2)?,
        trim_start: row.get(3)?,
        trim_end: row.get(4)?,
        output_ref: row.get(5)?,
        state: row
            .get::<_, String>(6)?
            .parse()
            .map_err(|e: String| {
                rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, e.into())
            })?,
        error_message: row.get(7)?,
        created_at: parse_timestamp(&row.get::<_, String>(8)?).unwrap_or_else(Utc::now),
        completed_at: row
            .get::<_, Option<String>>(9)?
            .as_deref()
            .and_then(parse_timestamp),
    })
}

/// Create a new operation in the `queued` state.
pub fn create_operation(
    conn: &Connection,
    user_id: UserId,
    source_ref: &str,
    trim_start: &str,
    trim_end: &str,
    output_ref: &str,
) -> Result<Operation> {
    let now = Utc::now();

    conn.execute(
        "INSERT INTO operations (user_id, source_ref, trim_start, trim_end, output_ref, state, created_at)
         VALUES (?, ?, ?, ?, ?, 'queued', ?)",
        params![
            user_id.as_i64(),
            source_ref,
            trim_start,
            trim_end,
            output_ref,
            now.to_rfc3339(),
        ],
    )
    .map_err(insert_error)?;

    Ok(Operation {
        id: OperationId::from(conn.last_insert_rowid()),
        user_id,
        source_ref: source_ref.to_string(),
        trim_start: trim_start.to_string(),
        trim_end: trim_end.to_string(),
        output_ref: output_ref.to_string(),
        state: OperationState::Queued,
        error_message: None,
        created_at: now,
        completed_at: None,
    })
}

/// Get an operation by ID, but only if it belongs to `user_id`.
pub fn get_operation_for_user(
    conn: &Connection,
    user_id: UserId,
    id: OperationId,
) -> Result<Option<Operation>> {
    conn.query_row(
        &format!("SELECT {OPERATION_COLUMNS} FROM operations WHERE id = ? AND user_id = ?"),
        params![id.as_i64(), user_id.as_i64()],
        row_to_operation,
    )
    .optional()
    .map_err(StoreError::unavailable)
}

/// Get the most recently created operation for a user.
pub fn get_latest_for_user(conn: &Connection, user_id: UserId) -> Result<Option<Operation>> {
    conn.query_row(
        &format!(
            "SELECT {OPERATION_COLUMNS} FROM operations
             WHERE user_id = ?
             ORDER BY id DESC LIMIT 1"
        ),
        [user_id.as_i64()],
        row_to_operation,
    )
    .optional()
    .map_err(StoreError::unavailable)
}

/// List a user's operations, newest first.
pub fn list_for_user(conn: &Connection, user_id: UserId, limit: usize) -> Result<Vec<Operation>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {OPERATION_COLUMNS} FROM operations
             WHERE user_id = ?
             ORDER BY id DESC
             LIMIT ?"
        ))
        .map_err(StoreError::unavailable)?;

    let operations = stmt
        .query_map(params![user_id.as_i64(), limit as i64], row_to_operation)
        .map_err(StoreError::unavailable)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StoreError::unavailable)?;

    Ok(operations)
}

/// List operations still in the `queued` state, oldest first.
pub fn list_queued(conn: &Connection) -> Result<Vec<Operation>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {OPERATION_COLUMNS} FROM operations
             WHERE state = 'queued'
             ORDER BY id ASC"
        ))
        .map_err(StoreError::unavailable)?;

    let operations = stmt
        .query_map([], row_to_operation)
        .map_err(StoreError::unavailable)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StoreError::unavailable)?;

    Ok(operations)
}

/// Transition a queued operation to `finished`.
///
/// Fails with [`StoreError::NotFound`] if no queued operation has this id,
/// which covers both unknown ids and operations that already left `queued`.
pub fn mark_finished(conn: &Connection, id: OperationId) -> Result<()> {
    let now = Utc::now();
    let affected = conn
        .execute(
            "UPDATE operations SET state = 'finished', completed_at = ?
             WHERE id = ? AND state = 'queued'",
            params![now.to_rfc3339(), id.as_i64()],
        )
        .map_err(StoreError::unavailable)?;

    if affected == 0 {
        return Err(StoreError::not_found("queued operation", id));
    }

    Ok(())
}

/// Transition a queued operation to `failed`, recording why.
pub fn mark_failed(conn: &Connection, id: OperationId, error_message: &str) -> Result<()> {
    let now = Utc::now();
    let affected = conn
        .execute(
            "UPDATE operations SET state = 'failed', error_message = ?, completed_at = ?
             WHERE id = ? AND state = 'queued'",
            params![error_message, now.to_rfc3339(), id.as_i64()],
        )
        .map_err(StoreError::unavailable)?;

    if affected == 0 {
        return Err(StoreError::not_found("queued operation", id));
    }

    Ok(())
}
