use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub transcoder: TranscoderConfig,

    #[serde(default)]
    pub push: PushConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Directory uploaded source artifacts are resolved against
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Directory trimmed artifacts are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./resources/trimforge.db")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./resources/upload")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./resources/output")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscoderConfig {
    /// Transcoder executable, a bare name looked up on PATH or a path
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Arguments placed before the generated trim arguments
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Wall-clock limit for one transcode (default: 300)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Transcodes allowed to run at once (default: 2)
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

fn default_program() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_concurrent_jobs() -> usize {
    2
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            extra_args: Vec::new(),
            timeout_secs: default_timeout_secs(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushConfig {
    /// Push gateway endpoint; notifications are disabled when unset
    #[serde(default)]
    pub gateway_url: Option<String>,

    /// Bearer token sent to the gateway
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_push_timeout")]
    pub timeout_secs: u64,
}

fn default_push_timeout() -> u64 {
    10
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            gateway_url: None,
            api_key: None,
            timeout_secs: default_push_timeout(),
        }
    }
}
