//! Trimforge-Common: Shared types, errors, and artifact naming.
//!
//! This crate provides the pieces every other trimforge crate agrees on:
//!
//! - **Typed IDs**: Integer-backed wrappers for users and operations
//! - **Error Handling**: The unified error taxonomy and result alias
//! - **Artifact Naming**: Collision-free file names for trim outputs
//!
//! # Examples
//!
//! ```
//! use trimforge_common::artifacts::new_artifact_name;
//! use trimforge_common::{Error, OperationId, Result};
//!
//! let name = new_artifact_name("trim_", ".mp4");
//! assert!(name.starts_with("trim_") && name.ends_with(".mp4"));
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("operation", OperationId::from(7)))
//! }
//! assert!(example().is_err());
//! ```

pub mod artifacts;
pub mod error;
pub mod ids;

pub use error::{Error, NotifyError, ProcessError, Result, StoreError};
pub use ids::*;
