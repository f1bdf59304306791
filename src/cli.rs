use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trimforge")]
#[command(author, version, about = "Asynchronous video trim jobs")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a trim of an uploaded video and wait for it to finish
    Submit {
        /// Email of the submitting user
        #[arg(short, long)]
        user: String,

        /// Source video, relative to the upload directory
        #[arg(short, long)]
        source: String,

        /// Trim start ([[HH:]MM:]SS[.frac] or e.g. 1500ms)
        #[arg(long)]
        start: String,

        /// Trim end
        #[arg(long)]
        end: String,
    },

    /// Show an operation (the latest one by default)
    Status {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        operation: Option<i64>,
    },

    /// Print the download location of a finished operation
    Fetch {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        operation: Option<i64>,
    },

    /// List a user's operations, newest first
    History {
        #[arg(short, long)]
        user: String,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Register a user
    AddUser {
        #[arg(long)]
        email: String,

        /// Pre-hashed password, stored as given
        #[arg(long)]
        password_hash: String,
    },

    /// Register a push subscription descriptor for a user
    Subscribe {
        #[arg(short, long)]
        user: String,

        /// File holding the opaque subscription descriptor
        #[arg(short, long)]
        descriptor: PathBuf,
    },

    /// Remove a user's push subscription
    Unsubscribe {
        #[arg(short, long)]
        user: String,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
