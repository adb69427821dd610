//! Resource model shared with the host build pipeline.
//!
//! The host owns the collection; the transform only borrows it through the
//! [`ResourceCollection`] trait. [`ResMap`] is the ordered in-memory
//! implementation used by the binary and the tests.

pub mod selector;

pub use selector::{Selector, SelectorMatcher, DEFAULT_NAMESPACE};

use crate::errors::{Result, SealError};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Identity
// ============================================================================

/// Identity key of a resource: group/version/kind plus name and namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResId {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

impl fmt::Display for ResId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.group.is_empty() {
            write!(f, "{}/", self.group)?;
        }
        write!(f, "{}/{} ", self.version, self.kind)?;
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

// ============================================================================
// Resource
// ============================================================================

/// A single manifest, kept as a JSON object so unknown fields round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    body: Map<String, Value>,
}

impl Resource {
    /// Wrap a parsed manifest. It must be an object carrying a `kind`.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(body) => {
                if body.get("kind").and_then(Value::as_str).unwrap_or("").is_empty() {
                    return Err(SealError::Serialization(
                        "resource is missing 'kind'".to_string(),
                    ));
                }
                Ok(Self { body })
            }
            other => Err(SealError::Serialization(format!(
                "expected a mapping for a resource, found {}",
                value_type(&other)
            ))),
        }
    }

    pub fn from_yaml(input: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(input)?;
        Self::from_value(value)
    }

    pub fn api_version(&self) -> &str {
        self.str_field("apiVersion")
    }

    pub fn kind(&self) -> &str {
        self.str_field("kind")
    }

    pub fn name(&self) -> &str {
        self.metadata_str("name")
    }

    pub fn namespace(&self) -> &str {
        self.metadata_str("namespace")
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.metadata_mut()
            .insert("namespace".to_string(), Value::String(namespace.to_string()));
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.string_map("labels")
    }

    pub fn set_labels(&mut self, labels: BTreeMap<String, String>) {
        self.set_string_map("labels", labels);
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.string_map("annotations")
    }

    pub fn set_annotations(&mut self, annotations: BTreeMap<String, String>) {
        self.set_string_map("annotations", annotations);
    }

    pub fn id(&self) -> ResId {
        let (group, version) = match self.api_version().split_once('/') {
            Some((g, v)) => (g.to_string(), v.to_string()),
            None => (String::new(), self.api_version().to_string()),
        };
        ResId {
            group,
            version,
            kind: self.kind().to_string(),
            name: self.name().to_string(),
            namespace: self.namespace().to_string(),
        }
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.body
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.body)?)
    }

    /// `metadata` as a mutable object, created if absent or malformed.
    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        let metadata = self
            .body
            .entry("metadata".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !metadata.is_object() {
            *metadata = Value::Object(Map::new());
        }
        match metadata {
            Value::Object(map) => map,
            _ => unreachable!("metadata is always an object here"),
        }
    }

    fn str_field(&self, key: &str) -> &str {
        self.body.get(key).and_then(Value::as_str).unwrap_or("")
    }

    fn metadata_str(&self, key: &str) -> &str {
        self.body
            .get("metadata")
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    fn string_map(&self, key: &str) -> BTreeMap<String, String> {
        let Some(Value::Object(map)) = self.body.get("metadata").and_then(|m| m.get(key)) else {
            return BTreeMap::new();
        };
        map.iter()
            .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), s)))
            .collect()
    }

    fn set_string_map(&mut self, key: &str, values: BTreeMap<String, String>) {
        let metadata = self.metadata_mut();
        if values.is_empty() {
            metadata.remove(key);
            return;
        }
        let map: Map<String, Value> = values
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        metadata.insert(key.to_string(), Value::Object(map));
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

// ============================================================================
// Collection interface
// ============================================================================

/// Mutation handle over the host's resource collection.
pub trait ResourceCollection {
    /// Identities of matching resources in native enumeration order.
    /// Selection never mutates the collection.
    fn select(&self, matcher: &SelectorMatcher) -> Vec<ResId>;

    /// Remove the first resource with this identity.
    fn remove(&mut self, id: &ResId) -> Option<Resource>;

    fn append(&mut self, resource: Resource);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered in-memory resource collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResMap {
    resources: Vec<Resource>,
}

impl ResMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a multi-document YAML stream.
    ///
    /// Empty documents are skipped and `kind: List` documents are flattened
    /// into their `items`. Two resources with the same [`ResId`] are rejected.
    pub fn from_yaml(input: &str) -> Result<Self> {
        let mut map = Self::new();
        for document in serde_yaml::Deserializer::from_str(input) {
            let value = Value::deserialize(document)?;
            map.push_value(value)?;
        }
        Ok(map)
    }

    /// Serialize as a multi-document YAML stream.
    pub fn to_yaml(&self) -> Result<String> {
        let mut out = String::new();
        for (idx, resource) in self.resources.iter().enumerate() {
            if idx > 0 {
                out.push_str("---\n");
            }
            out.push_str(&resource.to_yaml()?);
        }
        Ok(out)
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn into_resources(self) -> Vec<Resource> {
        self.resources
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources.iter().filter(move |r| r.kind() == kind)
    }

    fn push_value(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        if is_list(&value) {
            if let Value::Object(mut body) = value {
                if let Some(Value::Array(items)) = body.remove("items") {
                    for item in items {
                        self.push_value(item)?;
                    }
                }
            }
            return Ok(());
        }
        let resource = Resource::from_value(value)?;
        let id = resource.id();
        if self.resources.iter().any(|r| r.id() == id) {
            return Err(SealError::DuplicateResource(id.to_string()));
        }
        self.resources.push(resource);
        Ok(())
    }
}

fn is_list(value: &Value) -> bool {
    value.get("kind").and_then(Value::as_str) == Some("List")
        && value.get("items").map_or(false, Value::is_array)
}

impl ResourceCollection for ResMap {
    fn select(&self, matcher: &SelectorMatcher) -> Vec<ResId> {
        self.resources
            .iter()
            .filter(|r| matcher.matches(r))
            .map(Resource::id)
            .collect()
    }

    fn remove(&mut self, id: &ResId) -> Option<Resource> {
        let idx = self.resources.iter().position(|r| &r.id() == id)?;
        Some(self.resources.remove(idx))
    }

    fn append(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    fn len(&self) -> usize {
        self.resources.len()
    }
}
