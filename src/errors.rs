//! Error taxonomy for the sealing transform.
//!
//! Every variant is terminal: the transform never retries on its own and
//! never returns a partial result.

use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = SealError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SealError {
    /// Missing or invalid plugin configuration. Raised before any I/O.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The local certificate file could not be opened.
    #[error("cannot open certificate '{path}': {source}")]
    CertNotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote certificate could not be fetched (transport failure or non-2xx).
    #[error("cannot fetch certificate '{uri}': {reason}")]
    CertFetch { uri: String, reason: String },

    /// No certificate parsed, or its key is not RSA.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("sealer executable '{0}' not found")]
    SealerNotFound(String),

    /// The external sealer exited non-zero or its pipes failed.
    #[error("{message}{}", stderr_suffix(.stderr))]
    SealerExecution { message: String, stderr: String },

    /// The backend did not produce exactly one resource.
    #[error("malformed sealer output: {0}")]
    MalformedSealerOutput(String),

    /// A selected resource vanished from the collection before removal, or
    /// its identity resolved to a different resource.
    #[error("cannot remove resource {0}")]
    ResourceRemoval(String),

    /// Two resources in one stream share an identity.
    #[error("duplicate resource {0} in the input stream")]
    DuplicateResource(String),

    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout { operation: String, after: Duration },

    /// The secret itself cannot be sealed (for example undecodable data).
    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Wraps a failure with the identity of the secret being processed.
    #[error("failed to seal secret {namespace}/{name}: {source}")]
    Processing {
        namespace: String,
        name: String,
        #[source]
        source: Box<SealError>,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl SealError {
    /// Innermost error, looking through `Processing` wrappers.
    pub fn root(&self) -> &SealError {
        match self {
            SealError::Processing { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn processing(namespace: &str, name: &str, source: SealError) -> Self {
        SealError::Processing {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source: Box::new(source),
        }
    }
}

impl From<serde_yaml::Error> for SealError {
    fn from(err: serde_yaml::Error) -> Self {
        SealError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for SealError {
    fn from(err: serde_json::Error) -> Self {
        SealError::Serialization(err.to_string())
    }
}
