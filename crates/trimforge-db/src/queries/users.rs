//! User query operations.
//!
//! Credentials are stored but never checked here; the auth layer owns that.
//! Trimforge only needs to resolve an email to a [`UserId`] and read or
//! replace the push subscription descriptor.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use trimforge_common::{StoreError, UserId};

use super::insert_error;
use crate::models::User;

type Result<T> = std::result::Result<T, StoreError>;

/// Register a new user, returning its id.
pub fn create_user(conn: &Connection, email: &str, password_hash: &str) -> Result<UserId> {
    conn.execute(
        "INSERT INTO users (email, password_hash, created_at) VALUES (?, ?, ?)",
        params![email, password_hash, Utc::now().to_rfc3339()],
    )
    .map_err(insert_error)?;

    Ok(UserId::from(conn.last_insert_rowid()))
}

/// Look up a user id by email.
pub fn get_user_id_by_email(conn: &Connection, email: &str) -> Result<Option<UserId>> {
    conn.query_row("SELECT id FROM users WHERE email = ?", [email], |row| {
        row.get::<_, i64>(0)
    })
    .optional()
    .map(|id| id.map(UserId::from))
    .map_err(StoreError::unavailable)
}

/// Get a user by id.
pub fn get_user(conn: &Connection, id: UserId) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, email, push_subscription IS NOT NULL, created_at FROM users WHERE id = ?",
        [id.as_i64()],
        |row| {
            Ok(User {
                id: UserId::from(row.get::<_, i64>(0)?),
                email: row.get(1)?,
                has_push_subscription: row.get(2)?,
                created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(3)?)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        },
    )
    .optional()
    .map_err(StoreError::unavailable)
}

/// Get the push subscription descriptor for a user.
///
/// Returns `None` both when the user has no subscription and when the user
/// does not exist.
pub fn get_push_subscription(conn: &Connection, id: UserId) -> Result<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT push_subscription FROM users WHERE id = ?",
        [id.as_i64()],
        |row| row.get::<_, Option<Vec<u8>>>(0),
    )
    .optional()
    .map(Option::flatten)
    .map_err(StoreError::unavailable)
}

/// Replace (or clear, with `None`) a user's push subscription descriptor.
pub fn set_push_subscription(
    conn: &Connection,
    id: UserId,
    subscription: Option<&[u8]>,
) -> Result<()> {
    let affected = conn
        .execute(
            "UPDATE users SET push_subscription = ? WHERE id = ?",
            params![subscription, id.as_i64()],
        )
        .map_err(StoreError::unavailable)?;

    if affected == 0 {
        return Err(StoreError::not_found("user", id));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{init_memory_pool, PooledConnection};
    use assert_matches::assert_matches;

    fn setup_test_db() -> PooledConnection {
        let pool = init_memory_pool().unwrap();
        pool.get().unwrap()
    }

    #[test]
    fn test_create_and_resolve_user() {
        let conn = setup_test_db();
        let id = create_user(&conn, "u1@example.com", "hash").unwrap();

        assert_eq!(get_user_id_by_email(&conn, "u1@example.com").unwrap(), Some(id));
        assert_eq!(get_user_id_by_email(&conn, "nobody@example.com").unwrap(), None);

        let user = get_user(&conn, id).unwrap().unwrap();
        assert_eq!(user.email, "u1@example.com");
        assert!(!user.has_push_subscription);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let conn = setup_test_db();
        create_user(&conn, "u1@example.com", "hash").unwrap();
        let err = create_user(&conn, "u1@example.com", "other").unwrap_err();
        assert_matches!(err, StoreError::Conflict(_));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_push_subscription_lifecycle() {
        let conn = setup_test_db();
        let id = create_user(&conn, "u1@example.com", "hash").unwrap();

        assert_eq!(get_push_subscription(&conn, id).unwrap(), None);

        let descriptor = br#"{"endpoint":"https://push.example/abc"}"#;
        set_push_subscription(&conn, id, Some(descriptor)).unwrap();
        assert_eq!(
            get_push_subscription(&conn, id).unwrap().as_deref(),
            Some(&descriptor[..])
        );
        assert!(get_user(&conn, id).unwrap().unwrap().has_push_subscription);

        set_push_subscription(&conn, id, None).unwrap();
        assert_eq!(get_push_subscription(&conn, id).unwrap(), None);
    }

    #[test]
    fn test_subscription_for_unknown_user() {
        let conn = setup_test_db();
        assert_eq!(get_push_subscription(&conn, UserId::from(7)).unwrap(), None);
        assert_matches!(
            set_push_subscription(&conn, UserId::from(7), Some(b"x")),
            Err(StoreError::NotFound { .. })
        );
    }
}
