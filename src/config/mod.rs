mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./trimforge.toml",
        "~/.config/trimforge/config.toml",
        "/etc/trimforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Create the storage directories the configuration refers to
pub fn prepare_storage(config: &Config) -> Result<()> {
    let storage = &config.storage;
    for dir in [&storage.upload_dir, &storage.output_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {:?}", dir))?;
    }

    if let Some(parent) = storage.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
    }

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let transcoder = &config.transcoder;
    if transcoder.program.as_os_str().is_empty() {
        anyhow::bail!("Transcoder program cannot be empty");
    }
    if transcoder.timeout_secs == 0 {
        anyhow::bail!("Transcoder timeout cannot be 0");
    }
    if transcoder.max_concurrent_jobs == 0 {
        anyhow::bail!("Transcoder max_concurrent_jobs cannot be 0");
    }

    if let Some(url) = &config.push.gateway_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("Push gateway URL must be http(s): {}", url);
        }
        if config.push.timeout_secs == 0 {
            anyhow::bail!("Push timeout cannot be 0");
        }
    }

    if config.storage.upload_dir == config.storage.output_dir {
        tracing::warn!(
            "Upload and output directories are the same: {:?}",
            config.storage.upload_dir
        );
    }

    Ok(())
}
