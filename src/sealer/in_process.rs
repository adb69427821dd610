//! In-process sealing backend.

use super::crypto::{hybrid_encrypt, scope_label, seeded_rng};
use super::seed::SessionSeed;
use super::SealerBackend;
use crate::cert::{CertificateReference, CertificateResolver};
use crate::errors::{Result, SealError};
use crate::resources::Resource;
use crate::secrets::{prepare_for_sealing, secret_data};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rsa::RsaPublicKey;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

pub const SEALED_SECRET_API_VERSION: &str = "bitnami.com/v1alpha1";
pub const SEALED_SECRET_KIND: &str = "SealedSecret";

/// Seals secrets with the hybrid primitive, loading the certificate lazily
/// and at most once.
pub struct InProcessSealer {
    cert: Option<CertificateReference>,
    resolver: Option<CertificateResolver>,
    key: OnceCell<RsaPublicKey>,
    seed: Option<SessionSeed>,
}

impl InProcessSealer {
    pub fn new(
        cert: CertificateReference,
        resolver: CertificateResolver,
        seed: Option<SessionSeed>,
    ) -> Self {
        warn_if_unseeded(&seed);
        Self {
            cert: Some(cert),
            resolver: Some(resolver),
            key: OnceCell::new(),
            seed,
        }
    }

    /// Sealer with an already loaded key.
    pub fn with_public_key(key: RsaPublicKey, seed: Option<SessionSeed>) -> Self {
        warn_if_unseeded(&seed);
        Self {
            cert: None,
            resolver: None,
            key: OnceCell::new_with(Some(key)),
            seed,
        }
    }

    async fn public_key(&self) -> Result<&RsaPublicKey> {
        self.key
            .get_or_try_init(|| async {
                match (&self.cert, &self.resolver) {
                    (Some(cert), Some(resolver)) => resolver.load_public_key(cert).await,
                    _ => Err(SealError::Configuration("cert is required".to_string())),
                }
            })
            .await
    }

    fn encrypt_value(
        &self,
        key: &RsaPublicKey,
        label: &str,
        data_key: &str,
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        match &self.seed {
            Some(seed) => {
                let mut rng = seeded_rng(seed, key, label, data_key, plaintext)?;
                hybrid_encrypt(&mut rng, key, plaintext, label)
            }
            None => hybrid_encrypt(&mut OsRng, key, plaintext, label),
        }
    }
}

fn warn_if_unseeded(seed: &Option<SessionSeed>) {
    if seed.is_none() {
        warn!("No usable SESSION_KEY_SEED; sealed output will differ between runs");
    }
}

#[async_trait]
impl SealerBackend for InProcessSealer {
    fn name(&self) -> &str {
        "in-process"
    }

    async fn seal(&self, secret: &Resource) -> Result<Vec<u8>> {
        let prepared = prepare_for_sealing(secret)?;
        let key = self.public_key().await?;
        let label = scope_label(prepared.namespace(), prepared.name());

        let mut encrypted = BTreeMap::new();
        for (data_key, plaintext) in secret_data(&prepared)? {
            let ciphertext = self.encrypt_value(key, &label, &data_key, &plaintext)?;
            encrypted.insert(data_key, STANDARD.encode(ciphertext));
        }
        debug!("Sealed {} value(s) for {}", encrypted.len(), label);

        let sealed = sealed_secret(&prepared, encrypted);
        Ok(serde_yaml::to_string(&sealed)?.into_bytes())
    }
}

/// Build the `SealedSecret` document for a prepared secret.
///
/// The template carries the secret's metadata and type so the controller
/// can rebuild the original.
pub fn sealed_secret(prepared: &Resource, encrypted: BTreeMap<String, String>) -> Value {
    let template_metadata = prepared
        .body()
        .get("metadata")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    let mut template = Map::new();
    template.insert("metadata".to_string(), template_metadata);
    for field in ["type", "immutable"] {
        if let Some(value) = prepared.body().get(field) {
            template.insert(field.to_string(), value.clone());
        }
    }

    json!({
        "apiVersion": SEALED_SECRET_API_VERSION,
        "kind": SEALED_SECRET_KIND,
        "metadata": {
            "name": prepared.name(),
            "namespace": prepared.namespace(),
        },
        "spec": {
            "encryptedData": encrypted,
            "template": template,
        },
    })
}
