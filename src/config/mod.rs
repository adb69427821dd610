mod defaults;
mod io;
mod validation;

pub use defaults::*;
pub use io::*;
pub use validation::*;

use crate::resources::Selector;
use crate::sealer::SealerStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Plugin configuration, as written in the overlay's transformer manifest.
///
/// ```yaml
/// apiVersion: devjoes/v1
/// kind: SecretSealer
/// metadata:
///   name: sealer
/// cert: $CERT_DIR/sealing.pem
/// copyLabelsAnnotations: true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealerConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub metadata: PluginMetadata,

    /// Which resources to seal. Only `Secret`s are ever sealed.
    #[serde(default = "Selector::secrets")]
    pub target: Selector,

    /// Certificate path or URI; `$NAME` placeholders expand from the environment.
    #[serde(default)]
    pub cert: String,

    #[serde(default)]
    pub verbose: bool,

    /// Copy the source secret's labels and annotations onto the sealed resource.
    #[serde(default)]
    pub copy_labels_annotations: bool,

    #[serde(default)]
    pub sealer: SealerStrategy,

    /// Overrides `FIND_KUBESEAL` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub find_kubeseal: Option<bool>,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl SealerConfig {
    pub fn new(cert: impl Into<String>) -> Self {
        Self {
            cert: cert.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Whether `kubeseal` may be searched for in ancestor directories.
    pub fn discovery_enabled(&self) -> bool {
        self.find_kubeseal.unwrap_or_else(|| {
            std::env::var(FIND_KUBESEAL_ENV)
                .map(|v| !v.is_empty())
                .unwrap_or(false)
        })
    }
}

impl Default for SealerConfig {
    fn default() -> Self {
        Self {
            api_version: String::new(),
            kind: String::new(),
            metadata: PluginMetadata::default(),
            target: Selector::secrets(),
            cert: String::new(),
            verbose: false,
            copy_labels_annotations: false,
            sealer: SealerStrategy::default(),
            find_kubeseal: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}
