use std::path::Path;

use crate::errors::{ConfigError, Result};
use crate::model::MaskConfig;

/// Load a registry file, picking the format from its extension.
pub fn load_config(path: &Path) -> Result<MaskConfig> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => parse_config_toml(&content),
        Some("json") => parse_config_json(&content),
        other => Err(ConfigError::Format(format!(
            "expected .toml or .json, got {}",
            other.unwrap_or("no extension")
        ))),
    }
}

pub fn parse_config_toml(content: &str) -> Result<MaskConfig> {
    Ok(toml::from_str(content)?)
}

pub fn parse_config_json(content: &str) -> Result<MaskConfig> {
    Ok(serde_json::from_str(content)?)
}
