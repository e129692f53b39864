//! Filter Evaluation
//!
//! Evaluates a [`FilterClause`] against a record held in memory. Traversals are
//! resolved through a [`RecordResolver`], so the evaluator works over any
//! backing collection that can look records up by identifier.
//!
//! # Semantics
//!
//! - `=` compares simplified values; `null` matches a missing field, and
//!   numbers/booleans match their string form (query strings carry no types)
//! - `CONTAINS` tests array membership, or substring for strings
//! - `CONTAINSTEXT` is a case-insensitive substring test
//! - a traversal matches when any reached record matches
//! - negation applies after all of the above

use crate::models::{
    record_id_string, AttributeRef, Combinator, Comparison, FilterClause, Operator, Record,
    TraversalDirection, TraversalKind, RID_FIELD,
};
use crate::services::simplify_records_links;
use serde_json::Value;
use std::collections::BTreeSet;

/// Record lookup used to follow links and edges
pub trait RecordResolver {
    /// Record with this identifier, if any
    fn resolve(&self, rid: &str) -> Option<&Record>;

    /// Active edge records whose class is one of `classes`
    fn edges(&self, classes: &BTreeSet<String>) -> Vec<&Record>;
}

/// Whether `record` satisfies `filter`
pub fn matches_filter<R: RecordResolver + ?Sized>(
    record: &Record,
    filter: &FilterClause,
    resolver: &R,
) -> bool {
    match filter {
        FilterClause::Comparison(comparison) => matches_comparison(record, comparison, resolver),
        FilterClause::Clause(clause) => match clause.combinator {
            Combinator::And => clause
                .children
                .iter()
                .all(|child| matches_filter(record, child, resolver)),
            Combinator::Or => clause
                .children
                .iter()
                .any(|child| matches_filter(record, child, resolver)),
        },
    }
}

fn matches_comparison<R: RecordResolver + ?Sized>(
    record: &Record,
    comparison: &Comparison,
    resolver: &R,
) -> bool {
    let candidates = resolve_attribute(record, &comparison.attribute, resolver);
    let matched = candidates
        .iter()
        .any(|candidate| compare(candidate.as_ref(), comparison.operator, &comparison.value));
    matched != comparison.negate
}

/// Values addressed by `attribute`; `None` marks a missing field
fn resolve_attribute<R: RecordResolver + ?Sized>(
    record: &Record,
    attribute: &AttributeRef,
    resolver: &R,
) -> Vec<Option<Value>> {
    match attribute {
        AttributeRef::Field { name } => vec![record.get(name).cloned()],
        AttributeRef::Traversal {
            kind: TraversalKind::Link,
            edge_names,
            child,
            ..
        } => edge_names
            .iter()
            .filter_map(|name| record.get(name))
            .flat_map(linked_ids)
            .filter_map(|rid| resolver.resolve(&rid))
            .flat_map(|target| resolve_attribute(target, child, resolver))
            .collect(),
        AttributeRef::Traversal {
            kind: TraversalKind::Edge,
            edge_names,
            direction,
            child,
        } => {
            let Some(origin) = record.get(RID_FIELD).and_then(record_id_string) else {
                return Vec::new();
            };
            resolver
                .edges(edge_names)
                .into_iter()
                .filter(|edge| edge_touches(edge, &origin, *direction))
                .flat_map(|edge| resolve_attribute(edge, child, resolver))
                .collect()
        }
    }
}

/// Identifiers held by a link property (single link or list of links)
fn linked_ids(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(record_id_string).collect(),
        other => record_id_string(other).into_iter().collect(),
    }
}

fn edge_touches(edge: &Record, origin: &str, direction: TraversalDirection) -> bool {
    let endpoint = |side: &str| {
        edge.get(side)
            .and_then(record_id_string)
            .map(|rid| rid == origin)
            .unwrap_or(false)
    };
    match direction {
        TraversalDirection::Out => endpoint("out"),
        TraversalDirection::In => endpoint("in"),
        TraversalDirection::Both => endpoint("out") || endpoint("in"),
    }
}

fn compare(candidate: Option<&Value>, operator: Operator, expected: &Value) -> bool {
    match operator {
        Operator::Equals => match (candidate, expected) {
            (None, Value::Null) => true,
            (None, _) => false,
            (Some(actual), expected) => loose_eq(&simplify_records_links(actual), expected),
        },
        Operator::Contains => match candidate.map(simplify_records_links) {
            Some(Value::Array(items)) => items.iter().any(|item| loose_eq(item, expected)),
            Some(Value::String(text)) => expected
                .as_str()
                .map(|needle| text.contains(needle))
                .unwrap_or(false),
            Some(other) => loose_eq(&other, expected),
            None => expected.is_null(),
        },
        Operator::ContainsText => {
            let Some(needle) = expected.as_str().map(str::to_lowercase) else {
                return false;
            };
            match candidate {
                Some(Value::String(text)) => text.to_lowercase().contains(&needle),
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|text| text.to_lowercase().contains(&needle)),
                _ => false,
            }
        }
    }
}

/// Equality that lets query-string text match numbers and booleans
fn loose_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::Number(_) | Value::Bool(_), Value::String(text))
        | (Value::String(text), Value::Number(_) | Value::Bool(_)) => {
            let other = if actual.is_string() { expected } else { actual };
            other.to_string() == *text
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    struct Fixture {
        records: HashMap<String, Record>,
    }

    impl Fixture {
        fn new(records: Vec<Value>) -> Self {
            let records = records
                .into_iter()
                .map(|value| {
                    let record = value.as_object().cloned().unwrap();
                    let rid = record_id_string(&record[RID_FIELD]).unwrap();
                    (rid, record)
                })
                .collect();
            Self { records }
        }

        fn record(&self, rid: &str) -> &Record {
            &self.records[rid]
        }
    }

    impl RecordResolver for Fixture {
        fn resolve(&self, rid: &str) -> Option<&Record> {
            self.records.get(rid)
        }

        fn edges(&self, classes: &BTreeSet<String>) -> Vec<&Record> {
            self.records
                .values()
                .filter(|record| {
                    record
                        .get("@class")
                        .and_then(Value::as_str)
                        .map(|class| classes.contains(class))
                        .unwrap_or(false)
                })
                .collect()
        }
    }

    fn fixture() -> Fixture {
        Fixture::new(vec![
            json!({"@rid": "#1:0", "@class": "Source", "name": "civic"}),
            json!({"@rid": "#2:0", "@class": "Feature", "name": "KRAS", "position": 12,
                   "source": "#1:0", "subsets": ["oncogene", "ras"]}),
            json!({"@rid": "#2:1", "@class": "Feature", "name": "Kinase Domain Protein"}),
            json!({"@rid": "#3:0", "@class": "ImpliedBy", "out": "#2:0", "in": "#2:1"}),
        ])
    }

    fn eq(attribute: AttributeRef, value: Value) -> FilterClause {
        Comparison::new(attribute, Operator::Equals, value).into()
    }

    #[test]
    fn test_field_equality_and_negation() {
        let fx = fixture();
        let kras = fx.record("#2:0");
        assert!(matches_filter(kras, &eq(AttributeRef::field("name"), json!("KRAS")), &fx));

        let negated: FilterClause =
            Comparison::new(AttributeRef::field("name"), Operator::Equals, json!("KRAS"))
                .negated(true)
                .into();
        assert!(!matches_filter(kras, &negated, &fx));
    }

    #[test]
    fn test_null_matches_missing_field() {
        let fx = fixture();
        let kras = fx.record("#2:0");
        assert!(matches_filter(kras, &eq(AttributeRef::field("deletedAt"), Value::Null), &fx));
    }

    #[test]
    fn test_string_matches_number() {
        let fx = fixture();
        assert!(matches_filter(
            fx.record("#2:0"),
            &eq(AttributeRef::field("position"), json!("12")),
            &fx
        ));
    }

    #[test]
    fn test_contains_on_array() {
        let fx = fixture();
        let filter: FilterClause =
            Comparison::new(AttributeRef::field("subsets"), Operator::Contains, json!("ras")).into();
        assert!(matches_filter(fx.record("#2:0"), &filter, &fx));
    }

    #[test]
    fn test_contains_text_case_insensitive() {
        let fx = fixture();
        let filter: FilterClause = Comparison::new(
            AttributeRef::field("name"),
            Operator::ContainsText,
            json!("kinase"),
        )
        .into();
        assert!(matches_filter(fx.record("#2:1"), &filter, &fx));
        assert!(!matches_filter(fx.record("#2:0"), &filter, &fx));
    }

    #[test]
    fn test_link_traversal() {
        let fx = fixture();
        let filter = eq(
            AttributeRef::link("source", AttributeRef::field("name")),
            json!("civic"),
        );
        assert!(matches_filter(fx.record("#2:0"), &filter, &fx));
        assert!(!matches_filter(fx.record("#2:1"), &filter, &fx));
    }

    #[test]
    fn test_edge_traversal_to_far_vertex() {
        let fx = fixture();
        let filter: FilterClause = Comparison::new(
            AttributeRef::edge(
                ["ImpliedBy"],
                TraversalDirection::Out,
                AttributeRef::link("in", AttributeRef::field("name")),
            ),
            Operator::ContainsText,
            json!("domain"),
        )
        .into();
        assert!(matches_filter(fx.record("#2:0"), &filter, &fx));
        // #2:1 is only the incoming end of the edge
        assert!(!matches_filter(fx.record("#2:1"), &filter, &fx));
    }

    #[test]
    fn test_negated_traversal_without_targets() {
        let fx = fixture();
        let filter: FilterClause = Comparison::new(
            AttributeRef::link("source", AttributeRef::field("name")),
            Operator::Equals,
            json!("civic"),
        )
        .negated(true)
        .into();
        assert!(matches_filter(fx.record("#2:1"), &filter, &fx));
    }

    #[test]
    fn test_or_clause() {
        let fx = fixture();
        let filter = FilterClause::or(vec![
            eq(AttributeRef::field("name"), json!("BRAF")),
            eq(AttributeRef::field("name"), json!("KRAS")),
        ]);
        assert!(matches_filter(fx.record("#2:0"), &filter, &fx));
    }
}
