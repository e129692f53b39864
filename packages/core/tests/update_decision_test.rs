//! Integration tests for update decisions
//!
//! Tests cover:
//! - Excluded fields, exhaustive and non-exhaustive
//! - Insensitivity to changes inside linked records
//! - Fields present on only one side

use graphkb_core::{should_update, Record};
use serde_json::{json, Value};

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

const NO_EXCLUSIONS: &[&str] = &[];

// =========================================================================
// Excluded Fields
// =========================================================================

#[test]
fn test_excluding_one_of_two_changed_fields_still_updates() {
    let original = record(json!({"sourceId": "1", "name": "kras", "displayName": "KRAS"}));
    let proposed = record(json!({"sourceId": "1", "name": "KRAS", "displayName": "Kras"}));

    assert!(should_update("Feature", &original, &proposed, &["name"], true));
    assert!(!should_update(
        "Feature",
        &original,
        &proposed,
        &["name", "displayName"],
        true
    ));
}

#[test]
fn test_non_exhaustive_matches_exhaustive() {
    let original = record(json!({"sourceId": "1", "name": "kras", "displayName": "KRAS"}));
    let proposed = record(json!({"sourceId": "1", "name": "KRAS", "displayName": "Kras"}));

    for excluded in [
        &["name"][..],
        &["name", "displayName"][..],
        &[][..],
        &["sourceId"][..],
    ] {
        assert_eq!(
            should_update("Feature", &original, &proposed, excluded, true),
            should_update("Feature", &original, &proposed, excluded, false),
            "modes disagree for {:?}",
            excluded
        );
    }
}

// =========================================================================
// Linked Records
// =========================================================================

#[test]
fn test_linked_record_sibling_change_is_ignored() {
    let original = record(json!({
        "name": "kras",
        "source": {"@rid": "#1:0", "name": "civic"}
    }));
    let proposed = record(json!({
        "name": "kras",
        "source": {"@rid": "#1:0", "name": "CIViC"}
    }));
    assert!(!should_update("Feature", &original, &proposed, NO_EXCLUSIONS, true));
}

#[test]
fn test_link_object_equals_bare_identifier() {
    let original = record(json!({"name": "kras", "source": "#1:0"}));
    let proposed = record(json!({"name": "kras", "source": {"@rid": "#1:0", "name": "civic"}}));
    assert!(!should_update("Feature", &original, &proposed, NO_EXCLUSIONS, true));
}

#[test]
fn test_relinking_updates() {
    let original = record(json!({"name": "kras", "source": {"@rid": "#1:0"}}));
    let proposed = record(json!({"name": "kras", "source": {"@rid": "#1:1"}}));
    assert!(should_update("Feature", &original, &proposed, NO_EXCLUSIONS, true));
}

#[test]
fn test_link_lists_compare_by_identifier() {
    let original = record(json!({"subsets": [{"@rid": "#4:0", "name": "a"}, "#4:1"]}));
    let proposed = record(json!({"subsets": ["#4:0", {"@rid": "#4:1", "name": "b"}]}));
    assert!(!should_update("Feature", &original, &proposed, NO_EXCLUSIONS, true));
}

// =========================================================================
// Missing Fields
// =========================================================================

#[test]
fn test_field_only_on_one_side_updates() {
    let original = record(json!({"name": "kras"}));
    let proposed = record(json!({"name": "kras", "description": "GTPase"}));
    assert!(should_update("Feature", &original, &proposed, NO_EXCLUSIONS, true));
    assert!(should_update("Feature", &proposed, &original, NO_EXCLUSIONS, true));
    assert!(!should_update(
        "Feature",
        &original,
        &proposed,
        &["description"],
        true
    ));
}

#[test]
fn test_explicit_null_differs_from_missing() {
    let original = record(json!({"name": "kras"}));
    let proposed = record(json!({"name": "kras", "description": null}));
    assert!(should_update("Feature", &original, &proposed, NO_EXCLUSIONS, true));
}

#[test]
fn test_identical_records_do_not_update() {
    let original = record(json!({"name": "kras", "position": 12, "tags": ["a", "b"]}));
    assert!(!should_update(
        "Feature",
        &original,
        &original.clone(),
        NO_EXCLUSIONS,
        true
    ));
}
