use super::SealerConfig;
use crate::errors::{Result, SealError};

/// A single problem found in the plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.path, self.message)
    }
}

/// Validate a configuration object.
pub fn validate_config(config: &SealerConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    if config.cert.trim().is_empty() {
        errors.push(ConfigValidationError {
            path: "cert".to_string(),
            message: "is required".to_string(),
        });
    }

    if config.timeout_seconds == 0 {
        errors.push(ConfigValidationError {
            path: "timeoutSeconds".to_string(),
            message: "must be greater than 0".to_string(),
        });
    }

    errors
}

/// Validate configuration and return the first-class error the transform reports.
pub fn validate_config_object(config: &SealerConfig) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        Err(SealError::Configuration(messages.join("; ")))
    }
}
