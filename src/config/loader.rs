//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// A relative `backend.system_prompt_path` is resolved against the config
/// file's directory.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_config(&content, base_dir)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str, base_dir: &Path) -> Result<RelayConfig, ConfigError> {
    let mut config: RelayConfig = toml::from_str(content)?;

    if let Some(prompt_path) = config.backend.system_prompt_path.clone() {
        let resolved = base_dir.join(&prompt_path);
        let prompt = fs::read_to_string(&resolved).map_err(|source| ConfigError::Io {
            path: resolved.clone(),
            source,
        })?;
        tracing::debug!(path = %resolved.display(), "Loaded system prompt from file");
        config.backend.system_prompt = prompt.trim().to_string();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
