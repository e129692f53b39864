//! Link Simplifier
//!
//! Collapses nested record references to their identifier strings so that two
//! values can be compared by reference rather than by the linked record's
//! content.
//!
//! ```rust
//! use graphkb_core::services::simplify_records_links;
//! use serde_json::json;
//!
//! let value = json!({"a": [{"@rid": 123, "aa": 1}, {"ab": 2}]});
//! assert_eq!(simplify_records_links(&value), json!({"a": ["123", {"ab": 2}]}));
//! ```

use crate::models::{id_string, record_id};
use serde_json::{Map, Value};

/// Replace every nested record reference with its identifier string
///
/// - Scalars pass through unchanged
/// - Arrays are simplified element-wise
/// - Objects with a `@rid` collapse to the identifier, dropping sibling fields
/// - Other objects keep their keys (in order) with each value simplified
pub fn simplify_records_links(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(simplify_records_links).collect()),
        Value::Object(map) => match record_id(map) {
            Some(rid) => Value::String(id_string(rid)),
            None => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), simplify_records_links(value)))
                    .collect::<Map<String, Value>>(),
            ),
        },
        scalar => scalar.clone(),
    }
}
