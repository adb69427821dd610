//! Secret extraction from the host collection.

use super::SECRET_KIND;
use crate::errors::{Result, SealError};
use crate::resources::{Resource, ResourceCollection, SelectorMatcher};
use tracing::debug;

/// Remove every selected `Secret` from `collection` and return them in
/// selection order.
///
/// Resources that match the selector but are not `Secret`s stay in place.
/// Each match is removed as soon as it is selected. If a selected resource
/// has vanished, or its identity removes a resource the selector excludes,
/// everything removed so far is put back and [`SealError::ResourceRemoval`]
/// is returned.
pub fn extract_and_remove<C>(collection: &mut C, matcher: &SelectorMatcher) -> Result<Vec<Resource>>
where
    C: ResourceCollection + ?Sized,
{
    let ids = collection.select(matcher);
    let mut extracted = Vec::with_capacity(ids.len());

    for id in ids.into_iter().filter(|id| id.kind == SECRET_KIND) {
        match collection.remove(&id) {
            Some(resource) if matcher.matches(&resource) => {
                debug!("Extracted {}", id);
                extracted.push(resource);
            }
            Some(resource) => {
                extracted.push(resource);
                restore(collection, extracted);
                return Err(SealError::ResourceRemoval(format!(
                    "{id}: identity is shared with a resource outside the target"
                )));
            }
            None => {
                restore(collection, extracted);
                return Err(SealError::ResourceRemoval(format!(
                    "{id}: not present in the collection"
                )));
            }
        }
    }

    Ok(extracted)
}

/// Append previously extracted resources back, preserving their order.
pub fn restore<C>(collection: &mut C, resources: Vec<Resource>)
where
    C: ResourceCollection + ?Sized,
{
    for resource in resources {
        collection.append(resource);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ResId, ResMap, Selector};

    const STREAM: &str = r#"
apiVersion: v1
kind: Secret
metadata:
  name: a
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: cfg
---
apiVersion: v1
kind: Secret
metadata:
  name: b
  namespace: prod
"#;

    #[test]
    fn extracts_secrets_in_order() {
        let mut map = ResMap::from_yaml(STREAM).unwrap();
        let matcher = Selector::secrets().compile().unwrap();

        let secrets = extract_and_remove(&mut map, &matcher).unwrap();
        let names: Vec<&str> = secrets.iter().map(Resource::name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.resources()[0].kind(), "ConfigMap");
    }

    #[test]
    fn non_secret_matches_are_left_alone() {
        let mut map = ResMap::from_yaml(STREAM).unwrap();
        // No kind: the selector matches everything named "cfg" or "a".
        let selector = Selector {
            name: "cfg|a".into(),
            ..Selector::default()
        };
        let secrets = extract_and_remove(&mut map, &selector.compile().unwrap()).unwrap();
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].name(), "a");
        assert_eq!(map.len(), 2);
    }

    /// A collection whose `remove` fails for one identity.
    struct Flaky {
        inner: ResMap,
        vanish: String,
    }

    impl ResourceCollection for Flaky {
        fn select(&self, matcher: &SelectorMatcher) -> Vec<ResId> {
            self.inner.select(matcher)
        }
        fn remove(&mut self, id: &ResId) -> Option<Resource> {
            if id.name == self.vanish {
                None
            } else {
                self.inner.remove(id)
            }
        }
        fn append(&mut self, resource: Resource) {
            self.inner.append(resource)
        }
        fn len(&self) -> usize {
            self.inner.len()
        }
    }

    #[test]
    fn vanished_resource_aborts_and_restores() {
        let mut flaky = Flaky {
            inner: ResMap::from_yaml(STREAM).unwrap(),
            vanish: "b".into(),
        };
        let matcher = Selector::secrets().compile().unwrap();

        let err = extract_and_remove(&mut flaky, &matcher).unwrap_err();
        assert!(matches!(err, SealError::ResourceRemoval(_)));
        assert_eq!(
            err.to_string(),
            "cannot remove resource v1/Secret prod/b: not present in the collection"
        );
        assert_eq!(flaky.len(), 3);
        assert_eq!(flaky.inner.of_kind("Secret").count(), 2);
    }

    #[test]
    fn shared_identity_never_removes_excluded_secret() {
        // Appending bypasses the duplicate check done when parsing.
        let mut map = ResMap::new();
        for doc in [
            "apiVersion: v1\nkind: Secret\nmetadata:\n  name: db\n  labels:\n    tier: cache\ndata:\n  a: YQ==\n",
            "apiVersion: v1\nkind: Secret\nmetadata:\n  name: db\ndata:\n  b: Yg==\n",
        ] {
            map.append(Resource::from_yaml(doc).unwrap());
        }
        let selector = Selector {
            kind: "Secret".into(),
            label_selector: "tier!=cache".into(),
            ..Selector::default()
        };

        let err = extract_and_remove(&mut map, &selector.compile().unwrap()).unwrap_err();
        assert!(matches!(err, SealError::ResourceRemoval(_)));
        assert!(err.to_string().contains("outside the target"));
        // Both secrets are still present, untouched.
        assert_eq!(map.len(), 2);
        let mut data_keys: Vec<String> = map
            .iter()
            .flat_map(|r| r.body()["data"].as_object().unwrap().keys().cloned())
            .collect();
        data_keys.sort();
        assert_eq!(data_keys, vec!["a", "b"]);
    }
}
