//! Query Compiler
//!
//! Turns a [`ParsedQuery`] into a [`SelectQuery`]: one filter tree over the
//! target model plus the control options (paging, projection, traversal depth).
//!
//! # Sub-queries
//!
//! - `source[name]=civic` - link traversal: `source.name = 'civic'`
//! - `out_ImpliedBy[v][name]=kras` - edge traversal to the vertex across the
//!   edge: `out('ImpliedBy').in.name CONTAINS 'kras'`
//!
//! # Combination
//!
//! Top-level filters are AND-combined, except the names listed in the `or`
//! parameter, which form a single OR group.

use crate::models::{
    AttributeRef, Comparison, FilterClause, Operator, TraversalDirection, TraversalKind,
    RID_FIELD,
};
use crate::services::error::QueryError;
use crate::services::query_parser::{is_special_arg, ParsedQuery, QueryArg};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::OnceLock;

// Edge traversal keys, e.g. out_ImpliedBy
const EDGE_KEY_PATTERN: &str = r"^(out|in|both)_([A-Za-z][A-Za-z0-9]*)$";

/// Key naming the vertex across an edge inside an edge sub-query
const VERTEX_KEY: &str = "v";

/// Control options for a select
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub neighbors: Option<i64>,
    pub fuzzy_match: Option<i64>,
    pub size: Option<i64>,
    /// Exclude soft-deleted records (default true)
    pub active_only: bool,
    pub return_properties: Option<Vec<String>>,
    pub descendants: Option<Vec<String>>,
    pub ancestors: Option<Vec<String>>,
    pub direction: Option<TraversalDirection>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: None,
            skip: None,
            neighbors: None,
            fuzzy_match: None,
            size: None,
            active_only: true,
            return_properties: None,
            descendants: None,
            ancestors: None,
            direction: None,
        }
    }
}

/// Compiled select: filter tree plus options
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelectQuery {
    pub filter: Option<FilterClause>,
    pub options: QueryOptions,
}

impl SelectQuery {
    pub fn new(filter: Option<FilterClause>) -> Self {
        Self {
            filter,
            options: QueryOptions::default(),
        }
    }

    /// Select records equal on every given field
    pub fn matching<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let comparisons: Vec<FilterClause> = fields
            .into_iter()
            .map(|(name, value)| {
                Comparison::new(AttributeRef::field(name), Operator::Equals, value.clone()).into()
            })
            .collect();
        if comparisons.is_empty() {
            Self::new(None)
        } else {
            Self::new(Some(FilterClause::and(comparisons)))
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.options.active_only = false;
        self
    }
}

/// Compile parsed query parameters into a select
pub fn compile_query(parsed: &ParsedQuery) -> Result<SelectQuery, QueryError> {
    let mut options = QueryOptions::default();
    let mut or_names: Vec<String> = Vec::new();
    let mut filters: Vec<(&str, FilterClause)> = Vec::new();

    for (name, arg) in parsed.iter() {
        match (name, arg) {
            ("limit", QueryArg::Integer(value)) => options.limit = Some(*value),
            ("skip", QueryArg::Integer(value)) => options.skip = Some(*value),
            ("neighbors", QueryArg::Integer(value)) => options.neighbors = Some(*value),
            ("fuzzyMatch", QueryArg::Integer(value)) => options.fuzzy_match = Some(*value),
            ("size", QueryArg::Integer(value)) => options.size = Some(*value),
            ("activeOnly", QueryArg::Flag(flag)) => options.active_only = *flag,
            ("returnProperties", QueryArg::List(values)) => {
                options.return_properties = Some(values.clone())
            }
            ("descendants", QueryArg::List(values)) => options.descendants = Some(values.clone()),
            ("ancestors", QueryArg::List(values)) => options.ancestors = Some(values.clone()),
            ("direction", QueryArg::Direction(direction)) => options.direction = Some(*direction),
            ("or", QueryArg::List(values)) => or_names = values.clone(),
            (name, _) if is_special_arg(name) => {
                return Err(QueryError::input_validation(format!(
                    "Unexpected value for parameter {}",
                    name
                )))
            }
            (name, arg) => filters.push((name, compile_entry(name, arg, None)?)),
        }
    }

    for or_name in &or_names {
        if !filters.iter().any(|(name, _)| name == or_name) {
            return Err(QueryError::input_validation(format!(
                "The or parameter names {}, which has no filter",
                or_name
            )));
        }
    }

    let mut children = Vec::with_capacity(filters.len());
    let mut or_group = Vec::new();
    for (name, filter) in filters {
        if or_names.iter().any(|or_name| or_name == name) {
            or_group.push(filter);
        } else {
            children.push(filter);
        }
    }
    if !or_group.is_empty() {
        children.push(FilterClause::or(or_group));
    }

    let filter = if children.is_empty() {
        None
    } else {
        Some(FilterClause::and(children))
    };

    Ok(SelectQuery { filter, options })
}

/// Compile one filter entry; `edge` is set while inside an edge sub-query
fn compile_entry(
    name: &str,
    arg: &QueryArg,
    edge: Option<TraversalDirection>,
) -> Result<FilterClause, QueryError> {
    match (arg, edge) {
        (QueryArg::Filter(filter), Some(direction)) if name == VERTEX_KEY => Ok(filter
            .clone()
            .map_attributes(&|_| far_vertex(direction, AttributeRef::field(RID_FIELD)))),
        (QueryArg::Filter(filter), _) => Ok(filter.clone()),
        (QueryArg::SubQuery(sub), Some(direction)) if name == VERTEX_KEY => {
            let inner = compile_sub_query_body(name, sub, None)?;
            Ok(inner.map_attributes(&|attr| far_vertex(direction, attr)))
        }
        (QueryArg::SubQuery(sub), _) => compile_sub_query(name, sub),
        _ => Err(QueryError::input_validation(format!(
            "Unexpected value for parameter {}",
            name
        ))),
    }
}

fn compile_sub_query(name: &str, sub: &ParsedQuery) -> Result<FilterClause, QueryError> {
    match parse_edge_key(name) {
        Some((direction, edge_class)) => {
            let inner = compile_sub_query_body(name, sub, Some(direction))?;
            Ok(inner.map_attributes(&|attr| AttributeRef::edge([edge_class], direction, attr)))
        }
        None => {
            let inner = compile_sub_query_body(name, sub, None)?;
            Ok(inner.map_attributes(&|attr| AttributeRef::link(name, attr)))
        }
    }
}

fn compile_sub_query_body(
    name: &str,
    sub: &ParsedQuery,
    edge: Option<TraversalDirection>,
) -> Result<FilterClause, QueryError> {
    if let Some(control) = sub.keys().find(|key| is_special_arg(key)) {
        return Err(QueryError::input_validation(format!(
            "Control parameter {} is not allowed inside the {} sub-query",
            control, name
        )));
    }
    if sub.is_empty() {
        return Err(QueryError::input_validation(format!(
            "Empty sub-query for {}",
            name
        )));
    }

    let children = sub
        .iter()
        .map(|(key, arg)| compile_entry(key, arg, edge))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FilterClause::and(children))
}

/// Link from an edge record to the vertex on its far side
fn far_vertex(direction: TraversalDirection, child: AttributeRef) -> AttributeRef {
    let sides: BTreeSet<String> = match direction {
        TraversalDirection::Out => BTreeSet::from(["in".to_string()]),
        TraversalDirection::In => BTreeSet::from(["out".to_string()]),
        TraversalDirection::Both => BTreeSet::from(["in".to_string(), "out".to_string()]),
    };
    AttributeRef::Traversal {
        kind: TraversalKind::Link,
        edge_names: sides,
        direction: TraversalDirection::Out,
        child: Box::new(child),
    }
}

/// Split `out_ImpliedBy` into its direction and edge class
fn parse_edge_key(name: &str) -> Option<(TraversalDirection, &str)> {
    static EDGE_KEY_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EDGE_KEY_REGEX.get_or_init(|| Regex::new(EDGE_KEY_PATTERN).unwrap());

    let captures = regex.captures(name)?;
    let direction = match captures.get(1)?.as_str() {
        "out" => TraversalDirection::Out,
        "in" => TraversalDirection::In,
        _ => TraversalDirection::Both,
    };
    Some((direction, captures.get(2)?.as_str()))
}
