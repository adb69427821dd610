//! Sealing backends.
//!
//! A backend turns one plaintext `Secret` into the serialized text of a
//! `SealedSecret`. Two are provided: the in-process hybrid encryptor and a
//! wrapper around the `kubeseal` executable.

pub mod crypto;
pub mod discovery;
pub mod in_process;
pub mod kubeseal;
pub mod seed;

pub use discovery::ExecutableLocator;
pub use in_process::{InProcessSealer, SEALED_SECRET_API_VERSION, SEALED_SECRET_KIND};
pub use kubeseal::KubesealSealer;
pub use seed::SessionSeed;

use crate::cert::{CertificateReference, CertificateResolver};
use crate::config::SealerConfig;
use crate::errors::Result;
use crate::resources::Resource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Produces sealed output for a single secret.
#[async_trait]
pub trait SealerBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Seal `secret`, returning the serialized sealed resource.
    async fn seal(&self, secret: &Resource) -> Result<Vec<u8>>;
}

/// Which backend the transform uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SealerStrategy {
    #[default]
    InProcess,
    #[serde(alias = "subprocess")]
    Kubeseal,
}

/// Build the backend named by `config.sealer`.
pub fn build_backend(config: &SealerConfig) -> Result<Arc<dyn SealerBackend>> {
    let cert = CertificateReference::new(config.cert.clone());
    let backend: Arc<dyn SealerBackend> = match config.sealer {
        SealerStrategy::InProcess => {
            let resolver = CertificateResolver::new(config.timeout())?;
            Arc::new(InProcessSealer::new(cert, resolver, SessionSeed::from_env()))
        }
        SealerStrategy::Kubeseal => Arc::new(KubesealSealer::locate(
            Some(cert.expanded()),
            config.discovery_enabled(),
            config.timeout(),
        )?),
    };
    debug!("Using {} sealer", backend.name());
    Ok(backend)
}
