use super::SealerConfig;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Maximum size for a plugin config file (10 MB).
pub const MAX_CONFIG_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Read the plugin configuration from a YAML or JSON file.
///
/// The format follows the extension; anything other than `.json` is read as
/// YAML, which also accepts JSON documents.
pub fn read_config_file(path: &Path) -> Result<SealerConfig> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Cannot stat config file '{}'", path.display()))?;

    if !metadata.is_file() {
        bail!("Config path '{}' is not a regular file", path.display());
    }

    if metadata.len() > MAX_CONFIG_FILE_BYTES {
        bail!(
            "Config file '{}' is {} bytes, exceeds limit of {} bytes",
            path.display(),
            metadata.len(),
            MAX_CONFIG_FILE_BYTES,
        );
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in config file '{}'", path.display())),
        _ => parse_config_yaml(&content)
            .with_context(|| format!("Invalid YAML in config file '{}'", path.display())),
    }
}

/// Parse a plugin configuration document.
pub fn parse_config_yaml(content: &str) -> Result<SealerConfig> {
    if content.trim().is_empty() {
        return Ok(SealerConfig::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

// ============================================================================
// Tests
// ============================================================================
