//! Seal-and-merge orchestration.
//!
//! [`Transformer::transform`] replaces every selected `Secret` in a
//! collection with its sealed equivalent. The run is all-or-nothing: sealed
//! resources are staged and only appended once every secret has sealed.
//! On failure the removed secrets are appended back in selection order and
//! nothing sealed is added.

pub mod merge;

pub use merge::{merge_metadata, RESERVED_MARKER};

use crate::config::{validate_config_object, SealerConfig};
use crate::errors::{Result, SealError};
use crate::resources::{ResMap, Resource, ResourceCollection, DEFAULT_NAMESPACE};
use crate::sealer::{build_backend, SealerBackend};
use crate::secrets::{extract_and_remove, restore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A configured sealing transform. Holds no state between runs.
pub struct Transformer {
    config: SealerConfig,
    backend: Option<Arc<dyn SealerBackend>>,
}

impl Transformer {
    /// Transformer whose backend is chosen by `config.sealer` on each run.
    pub fn new(config: SealerConfig) -> Self {
        Self {
            config,
            backend: None,
        }
    }

    /// Transformer using a caller-supplied backend.
    pub fn with_backend(config: SealerConfig, backend: Arc<dyn SealerBackend>) -> Self {
        Self {
            config,
            backend: Some(backend),
        }
    }

    /// Replace the selected secrets in `collection` with sealed resources.
    ///
    /// Configuration problems are reported before the collection is touched.
    pub async fn transform<C>(&self, collection: &mut C) -> Result<()>
    where
        C: ResourceCollection + ?Sized,
    {
        validate_config_object(&self.config)?;
        let backend = match &self.backend {
            Some(backend) => Arc::clone(backend),
            None => build_backend(&self.config)?,
        };
        let matcher = self.config.target.compile()?;

        let secrets = extract_and_remove(collection, &matcher)?;
        if secrets.is_empty() {
            debug!("No secrets matched the target selector");
            return Ok(());
        }
        debug!("Sealing {} secret(s) with the {} sealer", secrets.len(), backend.name());

        match self.seal_all(backend.as_ref(), &secrets).await {
            Ok(sealed) => {
                for resource in sealed {
                    collection.append(resource);
                }
                Ok(())
            }
            Err(err) => {
                warn!("Sealing aborted, restoring {} secret(s): {}", secrets.len(), err);
                restore(collection, secrets);
                Err(err)
            }
        }
    }

    async fn seal_all(
        &self,
        backend: &dyn SealerBackend,
        secrets: &[Resource],
    ) -> Result<Vec<Resource>> {
        let mut staged = Vec::with_capacity(secrets.len());
        for secret in secrets {
            staged.push(self.seal_one(backend, secret).await?);
        }
        Ok(staged)
    }

    async fn seal_one(&self, backend: &dyn SealerBackend, secret: &Resource) -> Result<Resource> {
        // The ciphertext is bound to the namespace, so default it first.
        let mut secret = secret.clone();
        if secret.namespace().is_empty() {
            secret.set_namespace(DEFAULT_NAMESPACE);
        }
        let namespace = secret.namespace().to_string();
        let name = secret.name().to_string();

        let sealed = async {
            let output = backend.seal(&secret).await?;
            let mut sealed = parse_single(&output)?;
            if self.config.copy_labels_annotations {
                merge_metadata(&mut sealed, &secret);
            }
            Ok::<_, SealError>(sealed)
        }
        .await
        .map_err(|e| SealError::processing(&namespace, &name, e))?;

        if self.config.verbose {
            info!("Sealed secret {}/{}", namespace, name);
        } else {
            debug!("Sealed secret {}/{}", namespace, name);
        }
        Ok(sealed)
    }
}

/// Parse backend output, requiring exactly one resource.
fn parse_single(output: &[u8]) -> Result<Resource> {
    let text = std::str::from_utf8(output)
        .map_err(|e| SealError::MalformedSealerOutput(format!("output is not UTF-8: {e}")))?;
    let parsed = ResMap::from_yaml(text)
        .map_err(|e| SealError::MalformedSealerOutput(format!("cannot parse output: {e}")))?;

    let mut resources = parsed.into_resources();
    if resources.len() != 1 {
        return Err(SealError::MalformedSealerOutput(format!(
            "expected a single SealedSecret but received {}",
            resources.len()
        )));
    }
    Ok(resources.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sealer::crypto::tests::test_keys;
    use crate::sealer::InProcessSealer;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const INPUT: &str = r#"
apiVersion: v1
kind: Secret
metadata:
  name: db
  labels:
    app: web
data:
  password: aHVudGVyMg==
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
data:
  mode: fast
---
apiVersion: v1
kind: Secret
metadata:
  name: api
  namespace: prod
stringData:
  token: abc
"#;

    /// Backend returning fixed output, optionally failing on the Nth call.
    struct Scripted {
        output: String,
        fail_on: Option<usize>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(output: &str) -> Arc<Self> {
            Arc::new(Self {
                output: output.to_string(),
                fail_on: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing_on(call: usize) -> Arc<Self> {
            Arc::new(Self {
                output: "kind: SealedSecret\nmetadata:\n  name: x\n".to_string(),
                fail_on: Some(call),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SealerBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn seal(&self, _secret: &Resource) -> Result<Vec<u8>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(call) == self.fail_on {
                return Err(SealError::SealerExecution {
                    message: "kubeseal exited with exit status: 1".into(),
                    stderr: "boom".into(),
                });
            }
            Ok(self.output.clone().into_bytes())
        }
    }

    fn in_process(config: SealerConfig) -> Transformer {
        let (_, public) = test_keys();
        Transformer::with_backend(config, Arc::new(InProcessSealer::with_public_key(public, None)))
    }

    fn kinds(map: &ResMap) -> Vec<String> {
        map.iter().map(|r| format!("{}/{}", r.kind(), r.name())).collect()
    }

    #[tokio::test]
    async fn missing_cert_leaves_collection_untouched() {
        let mut map = ResMap::from_yaml(INPUT).unwrap();
        let before = map.clone();

        let err = Transformer::new(SealerConfig::default())
            .transform(&mut map)
            .await
            .unwrap_err();
        assert!(matches!(err, SealError::Configuration(ref m) if m == "cert is required"));
        assert_eq!(map, before);
    }

    #[tokio::test]
    async fn secrets_replaced_and_other_resources_untouched() {
        let mut map = ResMap::from_yaml(INPUT).unwrap();
        in_process(SealerConfig::new("/unused.pem"))
            .transform(&mut map)
            .await
            .unwrap();

        assert_eq!(
            kinds(&map),
            vec!["ConfigMap/settings", "SealedSecret/db", "SealedSecret/api"]
        );
        assert_eq!(map.of_kind("Secret").count(), 0);

        let db = map.of_kind("SealedSecret").next().unwrap();
        assert_eq!(db.namespace(), "default");
        // Metadata is only copied when asked for.
        assert!(db.labels().is_empty());

        let config_map = map.iter().find(|r| r.kind() == "ConfigMap").unwrap();
        assert_eq!(config_map.body()["data"]["mode"], "fast");
    }

    #[tokio::test]
    async fn copies_labels_when_enabled() {
        let mut map = ResMap::from_yaml(INPUT).unwrap();
        let config = SealerConfig {
            copy_labels_annotations: true,
            ..SealerConfig::new("/unused.pem")
        };
        in_process(config).transform(&mut map).await.unwrap();

        let db = map.of_kind("SealedSecret").next().unwrap();
        assert_eq!(db.labels().get("app").map(String::as_str), Some("web"));
    }

    #[tokio::test]
    async fn target_narrows_selection() {
        let mut map = ResMap::from_yaml(INPUT).unwrap();
        let mut config = SealerConfig::new("/unused.pem");
        config.target.namespace = "prod".into();
        in_process(config).transform(&mut map).await.unwrap();

        assert_eq!(
            kinds(&map),
            vec!["Secret/db", "ConfigMap/settings", "SealedSecret/api"]
        );
    }

    #[tokio::test]
    async fn multiple_documents_rejected() {
        let backend = Scripted::new("kind: SealedSecret\nmetadata:\n  name: a\n---\nkind: SealedSecret\nmetadata:\n  name: b\n");
        let mut map = ResMap::from_yaml(INPUT).unwrap();
        let err = Transformer::with_backend(SealerConfig::new("/c.pem"), backend)
            .transform(&mut map)
            .await
            .unwrap_err();

        assert!(matches!(err.root(), SealError::MalformedSealerOutput(_)));
        assert_eq!(
            err.to_string(),
            "failed to seal secret default/db: malformed sealer output: expected a single SealedSecret but received 2"
        );
    }

    #[tokio::test]
    async fn empty_output_rejected() {
        let mut map = ResMap::from_yaml(INPUT).unwrap();
        let err = Transformer::with_backend(SealerConfig::new("/c.pem"), Scripted::new(""))
            .transform(&mut map)
            .await
            .unwrap_err();
        assert!(matches!(err.root(), SealError::MalformedSealerOutput(_)));
    }

    #[tokio::test]
    async fn failure_restores_every_secret() {
        let mut map = ResMap::from_yaml(INPUT).unwrap();
        let err = Transformer::with_backend(SealerConfig::new("/c.pem"), Scripted::failing_on(1))
            .transform(&mut map)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "failed to seal secret prod/api: kubeseal exited with exit status: 1: boom"
        );
        // Nothing sealed survives; the originals move to the tail in order.
        assert_eq!(kinds(&map), vec!["ConfigMap/settings", "Secret/db", "Secret/api"]);
        let db = map.iter().find(|r| r.name() == "db").unwrap();
        assert_eq!(db.namespace(), "");
    }

    #[tokio::test]
    async fn no_matching_secrets_is_a_no_op() {
        let mut map = ResMap::from_yaml("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n").unwrap();
        let before = map.clone();
        Transformer::with_backend(SealerConfig::new("/c.pem"), Scripted::failing_on(0))
            .transform(&mut map)
            .await
            .unwrap();
        assert_eq!(map, before);
    }

    #[test]
    fn parse_single_requires_utf8() {
        let err = parse_single(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, SealError::MalformedSealerOutput(_)));
    }
}
