//! Query String Nesting
//!
//! Builds the nested parameter map the query parser expects from flat
//! URL-decoded pairs:
//!
//! - `name=kras` becomes `{"name": "kras"}`
//! - `source[name]=civic` becomes `{"source": {"name": "civic"}}`
//! - repeating a key (`name=kras&name=braf`) or using `name[]=` collects an array
//!
//! Key order follows first appearance in the query string.

use crate::services::QueryError;
use serde_json::{Map, Value};

/// Nest flat `(key, value)` pairs into a parameter map
pub fn nest_query_pairs<I>(pairs: I) -> Result<Map<String, Value>, QueryError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut root = Map::new();
    for (key, value) in pairs {
        let path = parse_key_path(&key)?;
        insert_path(&mut root, &key, &path, Value::String(value))?;
    }
    Ok(root)
}

/// Split `a[b][c]` into `["a", "b", "c"]`; `a[]` yields a trailing empty segment
fn parse_key_path(key: &str) -> Result<Vec<&str>, QueryError> {
    let malformed =
        || QueryError::input_validation(format!("Malformed query parameter name '{}'", key));

    let (head, mut rest) = match key.find('[') {
        Some(index) => key.split_at(index),
        None => (key, ""),
    };
    if head.is_empty() || head.contains(']') {
        return Err(malformed());
    }

    let mut path = vec![head];
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[').ok_or_else(malformed)?;
        let close = inner.find(']').ok_or_else(malformed)?;
        let segment = &inner[..close];
        if segment.contains('[') {
            return Err(malformed());
        }
        path.push(segment);
        rest = &inner[close + 1..];
    }

    // only the last segment may be the empty append marker
    if path[..path.len() - 1].iter().any(|segment| segment.is_empty()) {
        return Err(malformed());
    }
    Ok(path)
}

fn insert_path(
    target: &mut Map<String, Value>,
    key: &str,
    path: &[&str],
    value: Value,
) -> Result<(), QueryError> {
    let conflict = || {
        QueryError::input_validation(format!(
            "Conflicting values for query parameter '{}'",
            key
        ))
    };

    let (first, rest) = match path {
        [first, rest @ ..] => (*first, rest),
        [] => return Err(conflict()),
    };

    match rest {
        [] => append_value(target, first, value).ok_or_else(conflict),
        [""] => {
            let slot = target
                .entry(first.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if slot.is_string() {
                let existing = slot.take();
                *slot = Value::Array(vec![existing]);
            }
            match slot {
                Value::Array(items) => {
                    items.push(value);
                    Ok(())
                }
                _ => Err(conflict()),
            }
        }
        _ => match target
            .entry(first.to_string())
            .or_insert_with(|| Value::Object(Map::new()))
        {
            Value::Object(nested) => insert_path(nested, key, rest, value),
            _ => Err(conflict()),
        },
    }
}

/// Set `name`, turning a repeated key into an array of its values
///
/// Returns `None` when `name` already holds nested parameters.
fn append_value(target: &mut Map<String, Value>, name: &str, value: Value) -> Option<()> {
    match target.get_mut(name) {
        None => {
            target.insert(name.to_string(), value);
        }
        Some(Value::Object(_)) => return None,
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
    Some(())
}
