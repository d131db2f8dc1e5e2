mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./livemux.toml",
        "./config.toml",
        "~/.config/livemux/config.toml",
        "/etc/livemux/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    let sub = &config.subscribe;
    if sub.channel_capacity == 0 {
        anyhow::bail!("subscribe.channel_capacity must be greater than 0");
    }
    if sub.output_buffer == 0 {
        anyhow::bail!("subscribe.output_buffer must be greater than 0");
    }
    if !sub.sub_audio && !sub.sub_video {
        tracing::warn!("Both sub_audio and sub_video are disabled; sessions will carry no media");
    }

    let mut names = HashSet::new();
    for source in &config.test_sources {
        if source.name.trim().is_empty() {
            anyhow::bail!("Test source name cannot be empty");
        }
        if !names.insert(source.name.as_str()) {
            anyhow::bail!("Duplicate test source '{}'", source.name);
        }
        if source.sample_rate == 0 {
            anyhow::bail!("Test source '{}' has sample_rate 0", source.name);
        }
        if !(1..=1000).contains(&source.frame_ms) {
            anyhow::bail!(
                "Test source '{}' frame_ms must be between 1 and 1000",
                source.name
            );
        }
    }

    Ok(())
}
