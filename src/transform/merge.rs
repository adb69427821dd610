//! Label and annotation merging between a secret and its sealed form.

use crate::resources::Resource;
use std::collections::BTreeMap;

/// Marker the sealing controller sets on resources it owns. Never copied.
pub const RESERVED_MARKER: (&str, &str) = ("sealedsecrets.bitnami.com/managed", "true");

/// Union of `sealed` and `original`, visiting `sealed` first.
///
/// Later entries overwrite earlier ones, so the original's value wins when
/// both maps carry a key. The reserved marker pair is dropped.
pub fn union_without_marker(
    sealed: BTreeMap<String, String>,
    original: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let (marker_key, marker_value) = RESERVED_MARKER;
    let mut merged = BTreeMap::new();
    for (key, value) in sealed.into_iter().chain(original) {
        if key == marker_key && value == marker_value {
            continue;
        }
        merged.insert(key, value);
    }
    merged
}

/// Copy the original secret's labels and annotations onto `sealed`.
pub fn merge_metadata(sealed: &mut Resource, original: &Resource) {
    let labels = union_without_marker(sealed.labels(), original.labels());
    sealed.set_labels(labels);

    let annotations = union_without_marker(sealed.annotations(), original.annotations());
    sealed.set_annotations(annotations);
}
