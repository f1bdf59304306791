//! The operation store.
//!
//! [`OperationStore`] is the handle the orchestrator holds instead of a
//! global connection. Every method checks a connection out of the pool,
//! runs one query module call, and hands the connection back when it
//! returns, so no connection outlives the operation that needed it.

use trimforge_common::{OperationId, StoreError, UserId};

use crate::models::{Operation, User};
use crate::pool::{get_conn, DbPool};
use crate::queries::{operations, users};

type Result<T> = std::result::Result<T, StoreError>;

/// Pool-backed access to users and operations.
#[derive(Clone)]
pub struct OperationStore {
    pool: DbPool,
}

impl OperationStore {
    /// Wrap an initialized pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record a new operation in the `queued` state.
    pub fn create(
        &self,
        user_id: UserId,
        source_ref: &str,
        trim_start: &str,
        trim_end: &str,
        output_ref: &str,
    ) -> Result<Operation> {
        let conn = get_conn(&self.pool)?;
        operations::create_operation(&conn, user_id, source_ref, trim_start, trim_end, output_ref)
    }

    /// Transition a queued operation to `finished`.
    pub fn mark_finished(&self, id: OperationId) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        operations::mark_finished(&conn, id)
    }

    /// Transition a queued operation to `failed`.
    pub fn mark_failed(&self, id: OperationId, reason: &str) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        operations::mark_failed(&conn, id, reason)
    }

    /// The user's most recently created operation, if any.
    pub fn get_latest_for_user(&self, user_id: UserId) -> Result<Option<Operation>> {
        let conn = get_conn(&self.pool)?;
        operations::get_latest_for_user(&conn, user_id)
    }

    /// An operation by id, only if `user_id` owns it.
    pub fn get_by_id(&self, user_id: UserId, id: OperationId) -> Result<Option<Operation>> {
        let conn = get_conn(&self.pool)?;
        operations::get_operation_for_user(&conn, user_id, id)
    }

    /// The user's operations, newest first.
    pub fn list_for_user(&self, user_id: UserId, limit: usize) -> Result<Vec<Operation>> {
        let conn = get_conn(&self.pool)?;
        operations::list_for_user(&conn, user_id, limit)
    }

    /// A user's profile.
    pub fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let conn = get_conn(&self.pool)?;
        users::get_user(&conn, user_id)
    }

    /// The user's push subscription descriptor, if registered.
    pub fn get_subscription(&self, user_id: UserId) -> Result<Option<Vec<u8>>> {
        let conn = get_conn(&self.pool)?;
        users::get_push_subscription(&conn, user_id)
    }

    /// Replace or clear the user's push subscription descriptor.
    pub fn set_subscription(&self, user_id: UserId, subscription: Option<&[u8]>) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        users::set_push_subscription(&conn, user_id, subscription)
    }

    /// Resolve the caller's email to a user id.
    pub fn resolve_user(&self, email: &str) -> Result<Option<UserId>> {
        let conn = get_conn(&self.pool)?;
        users::get_user_id_by_email(&conn, email)
    }

    /// Register a user.
    pub fn register_user(&self, email: &str, password_hash: &str) -> Result<UserId> {
        let conn = get_conn(&self.pool)?;
        users::create_user(&conn, email, password_hash)
    }

    /// Fail every operation still `queued`, returning the ones that were
    /// transitioned.
    ///
    /// Meant for startup, before any worker is running: a queued operation
    /// at that point belongs to a process that no longer exists.
    pub fn fail_interrupted(&self, reason: &str) -> Result<Vec<Operation>> {
        let conn = get_conn(&self.pool)?;
        let mut failed = Vec::new();
        for op in operations::list_queued(&conn)? {
            match operations::mark_failed(&conn, op.id, reason) {
                Ok(()) => failed.push(op),
                // Another process finished it between the list and the update.
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(failed)
    }
}
