//! Record Data Structures
//!
//! GraphKB records travel through this crate as plain JSON objects. The storage
//! layer owns their shape; everything here only needs to know how to recognise a
//! linked record and which fields the server manages on its own.
//!
//! # Record References
//!
//! Any object carrying a `@rid` field is a reference to another graph record.
//! Comparisons treat such objects purely by their identifier.
//!
//! ```rust
//! use graphkb_core::models::{record_id, record_id_string};
//! use serde_json::json;
//!
//! let source = json!({"@rid": "#12:3", "name": "civic"});
//! assert_eq!(record_id(source.as_object().unwrap()), Some(&json!("#12:3")));
//! assert_eq!(record_id_string(&source), Some("#12:3".to_string()));
//! ```

use serde_json::{Map, Value};

/// A generic graph record: an insertion-ordered JSON object
pub type Record = Map<String, Value>;

/// Unique record identifier field
pub const RID_FIELD: &str = "@rid";

/// Record class (model name) field
pub const CLASS_FIELD: &str = "@class";

/// Link from a live record to its previous version
pub const HISTORY_FIELD: &str = "history";

/// Soft-delete timestamp; records carrying it are no longer active
pub const DELETED_AT_FIELD: &str = "deletedAt";

/// User who soft-deleted the record
pub const DELETED_BY_FIELD: &str = "deletedBy";

/// Fields maintained by the server that never count as a content change
pub const SERVER_MANAGED_FIELDS: &[&str] = &[
    RID_FIELD,
    CLASS_FIELD,
    "@version",
    "uuid",
    "createdAt",
    "createdBy",
    "updatedAt",
    "updatedBy",
    DELETED_AT_FIELD,
    DELETED_BY_FIELD,
    HISTORY_FIELD,
];

/// Unique record identifier of a key-value view, if it carries one
pub fn record_id(record: &Map<String, Value>) -> Option<&Value> {
    record.get(RID_FIELD)
}

/// String form of an identifier value
///
/// Strings are used as-is; any other JSON value uses its JSON text (so the
/// number `123` becomes `"123"`).
pub fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extract the identifier of a record reference
///
/// Accepts either a bare identifier string or an object with a `@rid` field.
pub fn record_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => record_id(map).map(id_string),
        _ => None,
    }
}

/// Whether a record has been soft-deleted
pub fn is_deleted(record: &Record) -> bool {
    record
        .get(DELETED_AT_FIELD)
        .map(|value| !value.is_null())
        .unwrap_or(false)
}
