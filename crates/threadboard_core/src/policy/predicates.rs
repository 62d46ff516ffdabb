//! crates/threadboard_core/src/policy/predicates.rs
//!
//! Small named predicates the access rules are composed from.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::domain::{Caller, Fields};

pub fn is_verified(caller: Option<&Caller>) -> bool {
    caller.map_or(false, |c| c.email_verified)
}

/// True iff the document's key set is exactly `allowed`.
pub fn fields_exactly(doc: &Fields, allowed: &[&str]) -> bool {
    doc.len() == allowed.len() && allowed.iter().all(|key| doc.contains_key(*key))
}

/// Keys that were added, removed, or changed value between two versions.
pub fn changed_keys(existing: &Fields, proposed: &Fields) -> BTreeSet<String> {
    let mut changed: BTreeSet<String> = existing
        .iter()
        .filter(|(key, value)| proposed.get(*key) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect();
    changed.extend(
        proposed
            .keys()
            .filter(|key| !existing.contains_key(*key))
            .cloned(),
    );
    changed
}

/// True iff every key that differs between the versions is in `allowed`.
pub fn only_changed(existing: &Fields, proposed: &Fields, allowed: &[&str]) -> bool {
    changed_keys(existing, proposed)
        .iter()
        .all(|key| allowed.contains(&key.as_str()))
}

pub fn unchanged(existing: &Fields, proposed: &Fields, key: &str) -> bool {
    existing.get(key) == proposed.get(key)
}

pub fn string_field<'a>(doc: &'a Fields, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(Value::as_str)
}

pub fn is_string(doc: &Fields, key: &str) -> bool {
    string_field(doc, key).is_some()
}

/// Strict: a string of exactly `min` characters fails.
pub fn string_longer_than(doc: &Fields, key: &str, min: usize) -> bool {
    string_field(doc, key).map_or(false, |s| s.chars().count() > min)
}

pub fn non_empty_string(doc: &Fields, key: &str) -> bool {
    string_longer_than(doc, key, 0)
}

pub fn field_equals(doc: &Fields, key: &str, expected: &str) -> bool {
    string_field(doc, key) == Some(expected)
}

/// Category ids are already-normalised lowercase alphanumerics of length ≥ 3.
pub fn valid_category_id(id: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9]+$").ok());
    id.len() > 2 && pattern.as_ref().map_or(false, |p| p.is_match(id))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn body(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn fields_exactly_rejects_extra_and_missing_keys() {
        let doc = body(json!({"uid": "u1", "categoryId": "abc"}));
        assert!(fields_exactly(&doc, &["uid", "categoryId"]));
        assert!(!fields_exactly(&doc, &["uid"]));
        assert!(!fields_exactly(&doc, &["uid", "categoryId", "extra"]));
        let extra = body(json!({"uid": "u1", "categoryId": "abc", "note": null}));
        assert!(!fields_exactly(&extra, &["uid", "categoryId"]));
    }

    #[test]
    fn changed_keys_sees_additions_removals_and_edits() {
        let before = body(json!({"a": 1, "b": 2, "c": 3}));
        let after = body(json!({"a": 1, "b": 20, "d": 4}));
        let changed: Vec<_> = changed_keys(&before, &after).into_iter().collect();
        assert_eq!(changed, vec!["b", "c", "d"]);
        assert!(only_changed(&before, &before, &[]));
    }

    #[test]
    fn string_checks_reject_other_types() {
        let doc = body(json!({"n": 5, "b": true, "o": {"x": "y"}, "s": "abcd"}));
        assert!(!is_string(&doc, "n"));
        assert!(!is_string(&doc, "b"));
        assert!(!is_string(&doc, "o"));
        assert!(!is_string(&doc, "missing"));
        assert!(string_longer_than(&doc, "s", 3));
        assert!(!string_longer_than(&doc, "s", 4));
    }

    #[test]
    fn category_id_boundaries() {
        assert!(valid_category_id("abc"));
        assert!(valid_category_id("meditation42"));
        assert!(!valid_category_id("ab"));
        assert!(!valid_category_id("Meditation"));
        assert!(!valid_category_id("med-itation"));
    }

    #[test]
    fn unverified_or_anonymous_callers_are_not_verified() {
        assert!(!is_verified(None));
        assert!(!is_verified(Some(&Caller::new("u1", false))));
        assert!(is_verified(Some(&Caller::new("u1", true))));
    }
}
