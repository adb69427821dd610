//! Canonical secret shape handed to sealing backends.

use super::SECRET_KIND;
use crate::errors::{Result, SealError};
use crate::resources::{Resource, DEFAULT_NAMESPACE};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Server-populated metadata that must not reach the sealed identity.
const SERVER_METADATA_FIELDS: &[&str] = &[
    "selfLink",
    "uid",
    "resourceVersion",
    "generation",
    "creationTimestamp",
    "deletionTimestamp",
    "deletionGracePeriodSeconds",
    "managedFields",
];

/// Produce the canonical secret used as sealing input.
///
/// - an empty namespace becomes `default`
/// - server-populated metadata and `status` are dropped
/// - `stringData` is folded into `data`, overriding equal keys
/// - every `data` value must be valid base64; line breaks inside a value
///   are dropped, so wrapped values are accepted
pub fn prepare_for_sealing(secret: &Resource) -> Result<Resource> {
    if secret.kind() != SECRET_KIND {
        return Err(SealError::InvalidSecret(format!(
            "{} is a {}, not a Secret",
            secret.id(),
            secret.kind()
        )));
    }

    let mut prepared = secret.clone();
    if prepared.namespace().is_empty() {
        prepared.set_namespace(DEFAULT_NAMESPACE);
    }

    let metadata = prepared.metadata_mut();
    for field in SERVER_METADATA_FIELDS {
        metadata.remove(*field);
    }

    let body = prepared.body_mut();
    body.remove("status");

    let mut data = match body.remove("data") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(SealError::InvalidSecret(format!(
                "{}: data must be a mapping",
                secret.id()
            )))
        }
    };

    match body.remove("stringData") {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (key, value) in map {
                let text = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                data.insert(key, Value::String(STANDARD.encode(text.as_bytes())));
            }
        }
        Some(_) => {
            return Err(SealError::InvalidSecret(format!(
                "{}: stringData must be a mapping",
                secret.id()
            )))
        }
    }

    for (key, value) in data.iter_mut() {
        let encoded = value.as_str().ok_or_else(|| {
            SealError::InvalidSecret(format!("{}: data.{key} is not a string", secret.id()))
        })?;
        let compact = strip_line_breaks(encoded);
        STANDARD.decode(&compact).map_err(|e| {
            SealError::InvalidSecret(format!("{}: data.{key} is not valid base64: {e}", secret.id()))
        })?;
        *value = Value::String(compact);
    }

    if !data.is_empty() {
        body.insert("data".to_string(), Value::Object(data));
    }

    Ok(prepared)
}

/// Decoded `data` of a prepared secret, sorted by key.
pub fn secret_data(secret: &Resource) -> Result<BTreeMap<String, Vec<u8>>> {
    let Some(data) = secret.body().get("data").and_then(Value::as_object) else {
        return Ok(BTreeMap::new());
    };
    data.iter()
        .map(|(key, value)| {
            let encoded = strip_line_breaks(value.as_str().unwrap_or_default());
            STANDARD
                .decode(encoded)
                .map(|bytes| (key.clone(), bytes))
                .map_err(|e| SealError::InvalidSecret(format!("data.{key}: {e}")))
        })
        .collect()
}

fn strip_line_breaks(encoded: &str) -> String {
    encoded.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
}
