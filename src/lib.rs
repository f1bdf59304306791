//! Trimforge - asynchronous video trim jobs
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod notifications;
pub mod orchestrator;
