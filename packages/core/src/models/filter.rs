//! Filter Tree Structures
//!
//! Typed boolean filter trees produced by the query parser and executed by the
//! storage layer.
//!
//! # Shape
//!
//! - **Comparison**: a single attribute/operator/value test, optionally negated
//! - **Clause**: an AND/OR combination of comparisons and nested clauses
//! - **AttributeRef**: a plain field, or a traversal through a link property or
//!   named edges ending in another attribute
//!
//! A clause never wraps a single child; [`FilterClause::combine`] collapses it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Comparison operator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    #[serde(rename = "=")]
    Equals,
    Contains,
    #[serde(rename = "CONTAINSTEXT")]
    ContainsText,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Equals => write!(f, "="),
            Operator::Contains => write!(f, "CONTAINS"),
            Operator::ContainsText => write!(f, "CONTAINSTEXT"),
        }
    }
}

/// Boolean combinator for clauses
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    And,
    Or,
}

/// Kind of relationship followed by a traversal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraversalKind {
    /// Follow named edge classes
    Edge,
    /// Follow a link property holding record ids
    Link,
}

/// Direction of a traversal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TraversalDirection {
    Out,
    In,
    Both,
}

impl fmt::Display for TraversalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraversalDirection::Out => write!(f, "out"),
            TraversalDirection::In => write!(f, "in"),
            TraversalDirection::Both => write!(f, "both"),
        }
    }
}

/// Attribute addressed by a comparison
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AttributeRef {
    /// Plain property of the record itself
    Field { name: String },
    /// Property of a record reached through a relationship
    #[serde(rename_all = "camelCase")]
    Traversal {
        kind: TraversalKind,
        edge_names: BTreeSet<String>,
        direction: TraversalDirection,
        child: Box<AttributeRef>,
    },
}

impl AttributeRef {
    /// Plain field reference
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field { name: name.into() }
    }

    /// Traversal through a single link property
    pub fn link(name: impl Into<String>, child: AttributeRef) -> Self {
        Self::Traversal {
            kind: TraversalKind::Link,
            edge_names: BTreeSet::from([name.into()]),
            direction: TraversalDirection::Out,
            child: Box::new(child),
        }
    }

    /// Traversal through named edge classes
    pub fn edge<I, S>(edge_names: I, direction: TraversalDirection, child: AttributeRef) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Traversal {
            kind: TraversalKind::Edge,
            edge_names: edge_names.into_iter().map(Into::into).collect(),
            direction,
            child: Box::new(child),
        }
    }

    /// Name of the innermost field
    pub fn leaf_name(&self) -> &str {
        match self {
            AttributeRef::Field { name } => name,
            AttributeRef::Traversal { child, .. } => child.leaf_name(),
        }
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeRef::Field { name } => write!(f, "{}", name),
            AttributeRef::Traversal {
                kind,
                edge_names,
                direction,
                child,
            } => {
                let names: Vec<&str> = edge_names.iter().map(String::as_str).collect();
                match kind {
                    TraversalKind::Link => write!(f, "{}.{}", names.join("|"), child),
                    TraversalKind::Edge => {
                        write!(f, "{}('{}').{}", direction, names.join("','"), child)
                    }
                }
            }
        }
    }
}

/// Single attribute test
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comparison {
    pub attribute: AttributeRef,
    pub operator: Operator,
    /// Compared value; `Value::Null` stands for the null value
    pub value: Value,
    #[serde(default)]
    pub negate: bool,
}

impl Comparison {
    pub fn new(attribute: AttributeRef, operator: Operator, value: Value) -> Self {
        Self {
            attribute,
            operator,
            value,
            negate: false,
        }
    }

    pub fn negated(mut self, negate: bool) -> Self {
        self.negate = negate;
        self
    }
}

/// Boolean combination of filters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clause {
    pub combinator: Combinator,
    pub children: Vec<FilterClause>,
}

/// Node of a filter tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FilterClause {
    Comparison(Comparison),
    Clause(Clause),
}

impl FilterClause {
    /// Combine filters, collapsing a single child to itself
    pub fn combine(combinator: Combinator, mut children: Vec<FilterClause>) -> FilterClause {
        if children.len() == 1 {
            return children.remove(0);
        }
        FilterClause::Clause(Clause {
            combinator,
            children,
        })
    }

    pub fn and(children: Vec<FilterClause>) -> FilterClause {
        Self::combine(Combinator::And, children)
    }

    pub fn or(children: Vec<FilterClause>) -> FilterClause {
        Self::combine(Combinator::Or, children)
    }

    pub fn as_comparison(&self) -> Option<&Comparison> {
        match self {
            FilterClause::Comparison(comparison) => Some(comparison),
            FilterClause::Clause(_) => None,
        }
    }

    pub fn as_clause(&self) -> Option<&Clause> {
        match self {
            FilterClause::Clause(clause) => Some(clause),
            FilterClause::Comparison(_) => None,
        }
    }

    /// Rewrite every attribute in the tree
    pub fn map_attributes<F>(self, f: &F) -> FilterClause
    where
        F: Fn(AttributeRef) -> AttributeRef,
    {
        match self {
            FilterClause::Comparison(mut comparison) => {
                comparison.attribute = f(comparison.attribute);
                FilterClause::Comparison(comparison)
            }
            FilterClause::Clause(clause) => FilterClause::Clause(Clause {
                combinator: clause.combinator,
                children: clause
                    .children
                    .into_iter()
                    .map(|child| child.map_attributes(f))
                    .collect(),
            }),
        }
    }
}

impl From<Comparison> for FilterClause {
    fn from(comparison: Comparison) -> Self {
        FilterClause::Comparison(comparison)
    }
}
