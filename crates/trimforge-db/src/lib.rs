//! Trimforge-DB: Database schema, migrations, and the operation store
//!
//! This crate provides persistence for trimforge using SQLite with rusqlite
//! and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//! - `store` - The pool-backed [`OperationStore`](store::OperationStore)
//!
//! # Example
//!
//! ```no_run
//! use trimforge_db::pool::init_pool;
//! use trimforge_db::store::OperationStore;
//!
//! let store = OperationStore::new(init_pool("/var/lib/trimforge/trimforge.db").unwrap());
//! let user = store.register_user("u1@example.com", "hash").unwrap();
//! let op = store
//!     .create(user, "clip.mp4", "00:00:05", "00:00:10", "trim_0.mp4")
//!     .unwrap();
//! println!("Queued operation {}", op.id);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod store;

pub use models::{Operation, OperationState, User};
pub use store::OperationStore;
