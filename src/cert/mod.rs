//! Sealing certificate resolution.
//!
//! A certificate reference is a local path or a URI, optionally containing
//! `$NAME` placeholders. Placeholders are expanded first; the result is then
//! classified, loaded and parsed into the RSA public key used for sealing.

pub mod expand;
pub mod key;

pub use expand::{expand_env, expand_placeholders_with, find_placeholders};
pub use key::parse_public_key;

use crate::config::MAX_CERT_BYTES;
use crate::errors::{Result, SealError};
use reqwest::StatusCode;
use rsa::RsaPublicKey;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};
use url::Url;

/// Configured certificate reference, as written by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateReference {
    raw: String,
}

/// Where an expanded reference points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertSource {
    /// Reference without a scheme.
    Path(PathBuf),
    /// `file://` URI.
    File(PathBuf),
    /// `http://` or `https://` URI.
    Remote(Url),
}

impl fmt::Display for CertSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertSource::Path(path) | CertSource::File(path) => write!(f, "{}", path.display()),
            CertSource::Remote(url) => write!(f, "{url}"),
        }
    }
}

impl CertificateReference {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The reference with placeholders expanded from the environment.
    pub fn expanded(&self) -> String {
        for placeholder in find_placeholders(&self.raw) {
            if std::env::var_os(&placeholder.name).is_none() {
                warn!(
                    "Certificate reference '{}' uses unset variable ${}",
                    self.raw, placeholder.name
                );
            }
        }
        expand_env(&self.raw)
    }

    pub fn source(&self) -> Result<CertSource> {
        classify(&self.expanded())
    }
}

/// Classify an already-expanded reference.
pub fn classify(reference: &str) -> Result<CertSource> {
    match Url::parse(reference) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(CertSource::Remote(url)),
            "file" => url.to_file_path().map(CertSource::File).map_err(|_| {
                SealError::Configuration(format!(
                    "certificate URI '{reference}' does not name a local file"
                ))
            }),
            // Windows drive letters parse as one-letter schemes.
            scheme if scheme.len() == 1 => Ok(CertSource::Path(PathBuf::from(reference))),
            scheme => Err(SealError::CertFetch {
                uri: reference.to_string(),
                reason: format!("unsupported protocol scheme \"{scheme}\""),
            }),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Ok(CertSource::Path(PathBuf::from(reference)))
        }
        Err(e) => Err(SealError::Configuration(format!(
            "invalid certificate reference '{reference}': {e}"
        ))),
    }
}

/// Loads certificate bytes and extracts the sealing key.
#[derive(Debug, Clone)]
pub struct CertificateResolver {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

/// Outcome of a remote fetch that reached the server.
enum Fetched {
    Body(Vec<u8>),
    Status(StatusCode),
    TooLarge,
}

impl CertificateResolver {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SealError::Configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout,
            max_bytes: MAX_CERT_BYTES,
        })
    }

    /// Read the raw certificate bundle a reference points at.
    ///
    /// Reads stop once the bundle exceeds the size limit.
    pub async fn resolve(&self, reference: &CertificateReference) -> Result<Vec<u8>> {
        let source = reference.source()?;
        debug!("Resolving certificate '{}' from {}", reference.raw(), source);

        match source {
            CertSource::Path(path) | CertSource::File(path) => self.read_local(path).await,
            CertSource::Remote(url) => self.fetch(url).await,
        }
    }

    pub async fn load_public_key(&self, reference: &CertificateReference) -> Result<RsaPublicKey> {
        let bytes = self.resolve(reference).await?;
        parse_public_key(&bytes)
    }

    fn too_large(&self) -> SealError {
        SealError::InvalidCertificate(format!(
            "certificate bundle exceeds limit of {} bytes",
            self.max_bytes
        ))
    }

    async fn read_local(&self, path: PathBuf) -> Result<Vec<u8>> {
        let not_found = |source| SealError::CertNotFound {
            path: path.display().to_string(),
            source,
        };
        let file = tokio::fs::File::open(&path).await.map_err(not_found)?;

        let mut bytes = Vec::new();
        file.take(self.max_bytes as u64 + 1)
            .read_to_end(&mut bytes)
            .await
            .map_err(not_found)?;
        if bytes.len() > self.max_bytes {
            return Err(self.too_large());
        }
        Ok(bytes)
    }

    async fn fetch(&self, url: Url) -> Result<Vec<u8>> {
        let uri = url.to_string();
        let request = async {
            let mut response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Ok::<_, reqwest::Error>(Fetched::Status(status));
            }
            if response
                .content_length()
                .map_or(false, |len| len > self.max_bytes as u64)
            {
                return Ok(Fetched::TooLarge);
            }
            let mut body = Vec::new();
            while let Some(chunk) = response.chunk().await? {
                if body.len() + chunk.len() > self.max_bytes {
                    return Ok(Fetched::TooLarge);
                }
                body.extend_from_slice(&chunk);
            }
            Ok(Fetched::Body(body))
        };

        let timed_out = || SealError::Timeout {
            operation: format!("certificate fetch from '{uri}'"),
            after: self.timeout,
        };

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(Fetched::Body(bytes))) => Ok(bytes),
            Ok(Ok(Fetched::Status(status))) => Err(SealError::CertFetch {
                uri: uri.clone(),
                reason: format!("server responded {status}"),
            }),
            Ok(Ok(Fetched::TooLarge)) => Err(self.too_large()),
            Ok(Err(e)) if e.is_timeout() => Err(timed_out()),
            Ok(Err(e)) => Err(SealError::CertFetch {
                uri: uri.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(timed_out()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_plain_paths() {
        assert_eq!(
            classify("/etc/certs/pub.pem").unwrap(),
            CertSource::Path(PathBuf::from("/etc/certs/pub.pem"))
        );
        assert_eq!(
            classify("certs/pub.pem").unwrap(),
            CertSource::Path(PathBuf::from("certs/pub.pem"))
        );
    }

    #[test]
    fn classify_uris() {
        match classify("https://example.com/v1/cert.pem").unwrap() {
            CertSource::Remote(url) => assert_eq!(url.path(), "/v1/cert.pem"),
            other => panic!("unexpected source: {other:?}"),
        }
        assert_eq!(
            classify("file:///etc/certs/pub.pem").unwrap(),
            CertSource::File(PathBuf::from("/etc/certs/pub.pem"))
        );
    }

    #[test]
    fn classify_unsupported_scheme() {
        let err = classify("ftp://example.com/cert.pem").unwrap_err();
        assert!(matches!(err, SealError::CertFetch { .. }));
        assert!(err.to_string().contains("unsupported protocol scheme"));
    }

    #[tokio::test]
    async fn missing_local_file_is_cert_not_found() {
        let resolver = CertificateResolver::new(Duration::from_secs(5)).unwrap();
        let err = resolver
            .resolve(&CertificateReference::new("/definitely/not/here/cert.pem"))
            .await
            .unwrap_err();
        assert!(matches!(err, SealError::CertNotFound { .. }));
    }

    #[tokio::test]
    async fn reads_local_and_file_uri() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cert.pem");
        std::fs::write(&path, include_str!("../../tests/fixtures/sealing-cert.pem")).unwrap();

        let resolver = CertificateResolver::new(Duration::from_secs(5)).unwrap();
        let by_path = resolver
            .load_public_key(&CertificateReference::new(path.display().to_string()))
            .await
            .unwrap();

        let uri = Url::from_file_path(&path).unwrap().to_string();
        let by_uri = resolver
            .load_public_key(&CertificateReference::new(uri))
            .await
            .unwrap();
        assert_eq!(by_path, by_uri);
    }

    #[tokio::test]
    async fn oversized_local_bundle_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cert.pem");
        std::fs::write(&path, include_str!("../../tests/fixtures/sealing-cert.pem")).unwrap();

        let mut resolver = CertificateResolver::new(Duration::from_secs(5)).unwrap();
        resolver.max_bytes = 64;
        let err = resolver
            .resolve(&CertificateReference::new(path.display().to_string()))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid certificate: certificate bundle exceeds limit of 64 bytes"
        );
    }

    #[tokio::test]
    async fn oversized_remote_bundle_rejected() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 4096]))
            .mount(&server)
            .await;

        let mut resolver = CertificateResolver::new(Duration::from_secs(5)).unwrap();
        resolver.max_bytes = 1024;
        let err = resolver
            .resolve(&CertificateReference::new(format!("{}/cert.pem", server.uri())))
            .await
            .unwrap_err();
        assert!(matches!(err, SealError::InvalidCertificate(_)));

        // Exactly at the limit is accepted.
        resolver.max_bytes = 4096;
        let bytes = resolver
            .resolve(&CertificateReference::new(format!("{}/cert.pem", server.uri())))
            .await
            .unwrap();
        assert_eq!(bytes.len(), 4096);
    }
}
