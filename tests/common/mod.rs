//! Helpers shared by the integration tests.

#![allow(dead_code)]

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use secret_sealer::Resource;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const CERT_PEM: &str = include_str!("../fixtures/sealing-cert.pem");
pub const KEY_PEM: &str = include_str!("../fixtures/sealing-key.pem");

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

pub fn cert_path() -> PathBuf {
    fixtures_dir().join("sealing-cert.pem")
}

/// Decrypt one `encryptedData` value with the fixture private key.
pub fn unseal_value(encoded: &str, namespace: &str, name: &str) -> Vec<u8> {
    let key = RsaPrivateKey::from_pkcs8_pem(KEY_PEM).unwrap();
    let bytes = STANDARD.decode(encoded).unwrap();
    let rsa_len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let (rsa_part, aes_part) = bytes[2..].split_at(rsa_len);

    let label = format!("{namespace}/{name}");
    let session_key = key
        .decrypt(Oaep::new_with_label::<Sha256, _>(label), rsa_part)
        .unwrap();
    Aes256Gcm::new_from_slice(&session_key)
        .unwrap()
        .decrypt(Nonce::from_slice(&[0u8; 12]), aes_part)
        .unwrap()
}

pub fn encrypted_data(sealed: &Resource) -> BTreeMap<String, String> {
    serde_json::from_value(sealed.body()["spec"]["encryptedData"].clone()).unwrap()
}

pub const SECRETS: &str = r#"
apiVersion: v1
kind: Secret
metadata:
  name: db
  labels:
    app: web
  annotations:
    team: storage
    sealedsecrets.bitnami.com/managed: "true"
  uid: 8f0e7c1a
  resourceVersion: "42"
type: Opaque
data:
  password: aHVudGVyMg==
  user: YWRtaW4=
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
  namespace: prod
data:
  mode: fast
"#;
