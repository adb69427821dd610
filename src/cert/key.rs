//! Public key extraction from PEM certificate bundles.

use crate::errors::{Result, SealError};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use x509_cert::der::{DecodePem, Encode};
use x509_cert::Certificate;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// `rsaEncryption` (PKCS #1).
const RSA_ENCRYPTION_OID: &str = "1.2.840.113549.1.1.1";

/// Split a bundle into its `CERTIFICATE` PEM blocks, in order.
///
/// Other PEM blocks and surrounding text are skipped.
fn certificate_blocks(bundle: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = bundle;
    while let Some(begin) = rest.find(PEM_BEGIN) {
        let after_begin = &rest[begin..];
        match after_begin.find(PEM_END) {
            Some(end) => {
                let block_end = end + PEM_END.len();
                blocks.push(&after_begin[..block_end]);
                rest = &after_begin[block_end..];
            }
            None => break,
        }
    }
    blocks
}

/// Extract the RSA public key of the first certificate in `pem`.
///
/// Certificates after the first are ignored. A bundle without any
/// certificate, or whose first certificate carries a non-RSA key, is an
/// [`SealError::InvalidCertificate`].
pub fn parse_public_key(pem: &[u8]) -> Result<RsaPublicKey> {
    let text = std::str::from_utf8(pem)
        .map_err(|_| SealError::InvalidCertificate("certificate data is not PEM text".into()))?;

    let first = certificate_blocks(text)
        .into_iter()
        .next()
        .ok_or_else(|| SealError::InvalidCertificate("failed to read any certificates".into()))?;

    let cert = Certificate::from_pem(first.as_bytes()).map_err(|e| {
        SealError::InvalidCertificate(format!("cannot parse certificate: {e}"))
    })?;

    let spki = &cert.tbs_certificate.subject_public_key_info;
    let algorithm = spki.algorithm.oid.to_string();
    if algorithm != RSA_ENCRYPTION_OID {
        return Err(SealError::InvalidCertificate(format!(
            "expected RSA public key but found algorithm {algorithm}"
        )));
    }

    let der = spki.to_der().map_err(|e| {
        SealError::InvalidCertificate(format!("cannot encode subject public key: {e}"))
    })?;
    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| SealError::InvalidCertificate(format!("cannot decode RSA public key: {e}")))
}
