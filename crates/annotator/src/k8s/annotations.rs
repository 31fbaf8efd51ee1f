use std::collections::BTreeMap;

use serde_json::json;
use serde_json::Value;

/// Merge a freshly-fetched annotation snapshot with a new set. New values win
/// on key collision, every other existing key is preserved. Idempotent:
/// reapplying the same new set leaves the result unchanged.
pub fn merge(
    existing: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = existing.clone();
    merged.extend(new.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Merge-patch body touching only the annotations field, so unrelated fields
/// (replicas, selector, image) are never clobbered by stale local state.
pub fn annotation_patch(merged: &BTreeMap<String, String>) -> Value {
    json!({
        "metadata": {
            "annotations": merged,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn merge_new_values_win_on_collision() {
        let existing = map(&[("a", "1"), ("b", "2")]);
        let new = map(&[("b", "20"), ("c", "30")]);

        let merged = merge(&existing, &new);

        assert_eq!(merged, map(&[("a", "1"), ("b", "20"), ("c", "30")]));
    }

    #[test]
    fn merge_preserves_unrelated_existing_keys() {
        let existing = map(&[("team", "infra")]);
        let new = map(&[("deployment.kubernetes.io/str", "nginx")]);

        let merged = merge(&existing, &new);

        assert_eq!(merged.get("team").map(String::as_str), Some("infra"));
    }

    #[test]
    fn merge_is_idempotent() {
        let existing = map(&[("a", "1"), ("b", "2")]);
        let new = map(&[("b", "20"), ("c", "30")]);

        let once = merge(&existing, &new);
        let twice = merge(&once, &new);

        assert_eq!(once, twice);
    }

    #[test]
    fn merge_with_empty_existing() {
        let new = map(&[("a", "1")]);
        assert_eq!(merge(&BTreeMap::new(), &new), new);
    }

    #[test]
    fn patch_body_contains_only_annotations() {
        let merged = map(&[("deployment.kubernetes.io/int", "5")]);
        let patch = annotation_patch(&merged);

        let object = patch.as_object().expect("patch object");
        assert_eq!(object.len(), 1);
        let metadata = object["metadata"].as_object().expect("metadata object");
        assert_eq!(metadata.len(), 1);
        assert_eq!(
            metadata["annotations"]["deployment.kubernetes.io/int"],
            "5"
        );
    }
}
