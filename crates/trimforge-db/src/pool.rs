//! Database connection pool management.
//!
//! This module provides connection pooling for SQLite using r2d2.
//! It handles pool initialization, connection customization, and running migrations.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use trimforge_common::StoreError;

use crate::migrations;

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Initialize a new database pool with the given file path.
///
/// This function will:
/// - Create the SQLite database file if it doesn't exist
/// - Enable foreign keys, WAL journaling, and a busy timeout on every connection
/// - Run pending database migrations
///
/// # Example
///
/// ```no_run
/// use trimforge_db::pool::init_pool;
///
/// let pool = init_pool("/var/lib/trimforge/trimforge.db").unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_pool(db_path: &str) -> Result<DbPool, StoreError> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
    });

    build(manager, "Failed to create connection pool")
}

/// Initialize an in-memory database pool for testing.
///
/// Each call creates a uniquely named shared-cache in-memory database, so
/// parallel tests stay isolated while every connection within one pool sees
/// the same data. The database is lost when the pool is dropped.
///
/// # Example
///
/// ```
/// use trimforge_db::pool::init_memory_pool;
///
/// let pool = init_memory_pool().unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_memory_pool() -> Result<DbPool, StoreError> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let uri = format!("file:trimforge_mem_{n}?mode=memory&cache=shared");

    let manager = SqliteConnectionManager::file(uri)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

    build(manager, "Failed to create in-memory pool")
}

fn build(manager: SqliteConnectionManager, context: &str) -> Result<DbPool, StoreError> {
    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| StoreError::unavailable(format!("{context}: {e}")))?;

    let conn = get_conn(&pool)?;
    migrations::run_migrations(&conn)
        .map_err(|e| StoreError::unavailable(format!("Failed to run migrations: {e}")))?;

    Ok(pool)
}

/// Get a connection from the pool.
///
/// This is a convenience wrapper around `pool.get()` that converts the r2d2
/// error into [`StoreError::Unavailable`]. The connection goes back to the
/// pool when the guard is dropped.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection, StoreError> {
    pool.get()
        .map_err(|e| StoreError::unavailable(format!("Failed to get connection from pool: {e}")))
}
