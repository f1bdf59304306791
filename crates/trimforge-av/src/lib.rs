//! Trimforge-AV: external transcoder invocation
//!
//! This crate wraps the external transcoder (ffmpeg) used to cut a time
//! range out of an uploaded video.
//!
//! # Modules
//!
//! - `command` - Async process builder with timeout and kill-on-drop
//! - `tools` - Tool availability checks
//! - `trim` - The [`ProcessRunner`] that performs one trim attempt

pub mod command;
pub mod tools;
pub mod trim;

pub use command::{ToolCommand, ToolOutput, DEFAULT_TIMEOUT};
pub use tools::{check_tool, check_tools, require_tool, ToolInfo};
pub use trim::{ProcessRunner, SourceGuard, TrimJob};
