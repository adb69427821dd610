//! Resource selection.
//!
//! A [`Selector`] is the serialized form found in plugin configuration; it is
//! compiled once into a [`SelectorMatcher`] which does the actual matching.

use super::Resource;
use crate::errors::{Result, SealError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Namespace assumed for resources that do not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Predicate over resource identity and metadata.
///
/// Empty fields match anything. `name` and `namespace` are regular
/// expressions anchored to the whole value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Selector {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Comma-separated `key=value`, `key!=value`, `key` or `!key` terms.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub label_selector: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub annotation_selector: String,
}

impl Selector {
    /// Selects every `Secret`, whatever its name or namespace.
    pub fn secrets() -> Self {
        Self {
            kind: "Secret".to_string(),
            ..Self::default()
        }
    }

    pub fn compile(&self) -> Result<SelectorMatcher> {
        Ok(SelectorMatcher {
            group: self.group.clone(),
            version: self.version.clone(),
            kind: self.kind.clone(),
            name: compile_pattern("name", &self.name)?,
            namespace: compile_pattern("namespace", &self.namespace)?,
            labels: parse_requirements("labelSelector", &self.label_selector)?,
            annotations: parse_requirements("annotationSelector", &self.annotation_selector)?,
        })
    }
}

/// Compiled form of a [`Selector`].
#[derive(Debug, Clone)]
pub struct SelectorMatcher {
    group: String,
    version: String,
    kind: String,
    name: Option<Regex>,
    namespace: Option<Regex>,
    labels: Vec<Requirement>,
    annotations: Vec<Requirement>,
}

impl SelectorMatcher {
    pub fn matches(&self, resource: &Resource) -> bool {
        let id = resource.id();
        if !self.group.is_empty() && self.group != id.group {
            return false;
        }
        if !self.version.is_empty() && self.version != id.version {
            return false;
        }
        if !self.kind.is_empty() && self.kind != id.kind {
            return false;
        }
        if let Some(ref re) = self.name {
            if !re.is_match(&id.name) {
                return false;
            }
        }
        if let Some(ref re) = self.namespace {
            // Namespace-less resources land in the default namespace.
            let ns = if id.namespace.is_empty() {
                DEFAULT_NAMESPACE
            } else {
                id.namespace.as_str()
            };
            if !re.is_match(ns) {
                return false;
            }
        }
        if !self.labels.is_empty() {
            let labels = resource.labels();
            if !self.labels.iter().all(|r| r.matches(&labels)) {
                return false;
            }
        }
        if !self.annotations.is_empty() {
            let annotations = resource.annotations();
            if !self.annotations.iter().all(|r| r.matches(&annotations)) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    Absent(String),
}

impl Requirement {
    fn matches(&self, map: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals(k, v) => map.get(k) == Some(v),
            Requirement::NotEquals(k, v) => map.get(k) != Some(v),
            Requirement::Exists(k) => map.contains_key(k),
            Requirement::Absent(k) => !map.contains_key(k),
        }
    }
}

fn compile_pattern(field: &str, pattern: &str) -> Result<Option<Regex>> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!("^(?:{pattern})$"))
        .map(Some)
        .map_err(|e| SealError::Configuration(format!("target.{field}: invalid pattern: {e}")))
}

fn parse_requirements(field: &str, raw: &str) -> Result<Vec<Requirement>> {
    let mut requirements = Vec::new();
    for term in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let requirement = if let Some((k, v)) = term.split_once("!=") {
            Requirement::NotEquals(k.trim().to_string(), v.trim().to_string())
        } else if let Some((k, v)) = term.split_once("==").or_else(|| term.split_once('=')) {
            Requirement::Equals(k.trim().to_string(), v.trim().to_string())
        } else if let Some(k) = term.strip_prefix('!') {
            Requirement::Absent(k.trim().to_string())
        } else {
            Requirement::Exists(term.to_string())
        };

        let key = match &requirement {
            Requirement::Equals(k, _)
            | Requirement::NotEquals(k, _)
            | Requirement::Exists(k)
            | Requirement::Absent(k) => k,
        };
        if key.is_empty() {
            return Err(SealError::Configuration(format!(
                "target.{field}: empty key in term '{term}'"
            )));
        }
        requirements.push(requirement);
    }
    Ok(requirements)
}
