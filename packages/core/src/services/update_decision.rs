//! Update Decision
//!
//! Decides whether proposed content is a real change to an existing record.
//! Linked records are compared by identifier only (see
//! [`simplify_records_links`]), so renaming a `Source` never forces an update of
//! the records that merely point at it.

use crate::models::Record;
use crate::services::link_simplifier::simplify_records_links;
use serde_json::Value;
use std::collections::HashSet;

/// Decide whether `proposed` differs from `original` on any non-excluded field
///
/// The union of both key sets is compared. A key missing on one side and
/// present on the other counts as a difference.
///
/// `is_exhaustive` records whether the caller listed every field it expects to
/// differ or only some of them. Both modes skip exactly `excluded_fields`.
///
/// # Examples
///
/// ```rust
/// use graphkb_core::services::should_update;
/// use serde_json::json;
///
/// let original = json!({"name": "kras", "displayName": "KRAS"});
/// let proposed = json!({"name": "KRAS", "displayName": "Kras"});
/// let (original, proposed) = (original.as_object().unwrap(), proposed.as_object().unwrap());
///
/// assert!(should_update("Feature", original, proposed, &["name"], true));
/// assert!(!should_update("Feature", original, proposed, &["name", "displayName"], true));
/// ```
pub fn should_update<S: AsRef<str>>(
    model_name: &str,
    original: &Record,
    proposed: &Record,
    excluded_fields: &[S],
    is_exhaustive: bool,
) -> bool {
    let excluded: HashSet<&str> = excluded_fields.iter().map(AsRef::as_ref).collect();

    let changed = original
        .keys()
        .chain(proposed.keys().filter(|key| !original.contains_key(*key)))
        .filter(|key| !excluded.contains(key.as_str()))
        .find(|key| {
            field_differs(original.get(key.as_str()), proposed.get(key.as_str()))
        });

    match changed {
        Some(key) => {
            tracing::debug!(
                model = model_name,
                field = %key,
                exhaustive = is_exhaustive,
                "record changed, update required"
            );
            true
        }
        None => {
            tracing::debug!(
                model = model_name,
                exhaustive = is_exhaustive,
                "record unchanged"
            );
            false
        }
    }
}

fn field_differs(original: Option<&Value>, proposed: Option<&Value>) -> bool {
    match (original, proposed) {
        (None, None) => false,
        (Some(_), None) | (None, Some(_)) => true,
        (Some(a), Some(b)) => simplify_records_links(a) != simplify_records_links(b),
    }
}
