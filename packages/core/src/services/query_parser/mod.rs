//! Query Parser - HTTP Query Parameters to Filter Trees
//!
//! Turns a (possibly nested) map of query parameters into typed arguments:
//! filter trees for record attributes, and validated values for the control
//! parameters (`limit`, `neighbors`, `returnProperties`, ...).
//!
//! # Value Syntax
//!
//! - `a|b` - OR of alternatives
//! - `!a` - negated comparison
//! - `~word` - full-text contains (`CONTAINSTEXT`); separators split the text
//!   into an AND of per-word searches
//! - `null` - the null value
//! - repeated parameters (`?name=a&name=b`) - AND of each value
//! - nested maps (`?source[name]=civic`) - sub-query on a linked record
//!
//! # Examples
//!
//! ```rust
//! use graphkb_core::models::Operator;
//! use graphkb_core::services::query_parser::{parse_query_language, QueryArg};
//! use serde_json::json;
//!
//! let params = json!({"name": "~kinase", "limit": "10"});
//! let parsed = parse_query_language(params.as_object().unwrap(), Operator::Equals)?;
//!
//! assert_eq!(parsed.get("limit"), Some(&QueryArg::Integer(10)));
//! # Ok::<(), graphkb_core::services::QueryError>(())
//! ```

use crate::config::QueryConfig;
use crate::models::{AttributeRef, Comparison, FilterClause, Operator, TraversalDirection};
use crate::services::error::QueryError;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

pub use crate::config::{MAX_JUMPS, MAX_QUERY_LIMIT, MIN_WORD_SIZE};

/// Parameters parsed as integers
pub const NUMERIC_ARGS: &[&str] = &["fuzzyMatch", "limit", "skip", "neighbors", "size"];

/// Parameters parsed from a single comma-separated string
pub const LIST_ARGS: &[&str] = &["descendants", "ancestors", "returnProperties", "or"];

/// Control parameters; array values under these names are not AND-combined
pub const SPECIAL_ARGS: &[&str] = &[
    "fuzzyMatch",
    "limit",
    "skip",
    "neighbors",
    "size",
    "descendants",
    "ancestors",
    "returnProperties",
    "or",
    "activeOnly",
    "direction",
];

/// Whether a parameter name is a control parameter rather than a filter
pub fn is_special_arg(name: &str) -> bool {
    SPECIAL_ARGS.contains(&name)
}

/// Parsed value of a single query parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum QueryArg {
    /// Filter on the attribute named by the parameter
    Filter(FilterClause),
    /// Nested query on a linked record or edge
    SubQuery(ParsedQuery),
    Integer(i64),
    List(Vec<String>),
    Flag(bool),
    Direction(TraversalDirection),
}

impl QueryArg {
    pub fn as_filter(&self) -> Option<&FilterClause> {
        match self {
            QueryArg::Filter(filter) => Some(filter),
            _ => None,
        }
    }
}

/// Insertion-ordered mapping of parameter name to parsed argument
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    entries: Vec<(String, QueryArg)>,
}

impl ParsedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an argument, replacing any existing entry of the same name in place
    pub fn insert(&mut self, name: impl Into<String>, arg: QueryArg) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = arg,
            None => self.entries.push((name, arg)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&QueryArg> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, arg)| arg)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryArg)> {
        self.entries.iter().map(|(name, arg)| (name.as_str(), arg))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for ParsedQuery {
    type Item = (String, QueryArg);
    type IntoIter = std::vec::IntoIter<(String, QueryArg)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for ParsedQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, arg) in &self.entries {
            map.serialize_entry(name, arg)?;
        }
        map.end()
    }
}

/// Parse query parameters with the default configuration
pub fn parse_query_language(
    input: &Map<String, Value>,
    default_operator: Operator,
) -> Result<ParsedQuery, QueryError> {
    QueryParser::default().parse_query_language(input, default_operator)
}

/// Parse a single query parameter with the default configuration
pub fn parse_query_comparison(
    name: &str,
    value: &Value,
    default_operator: Operator,
) -> Result<QueryArg, QueryError> {
    QueryParser::default().parse_query_comparison(name, value, default_operator)
}

/// Query parameter parser
///
/// Stateless apart from its configuration; safe to share across request
/// handlers.
#[derive(Debug, Clone, Default)]
pub struct QueryParser {
    config: QueryConfig,
}

impl QueryParser {
    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Parse every parameter of a query map
    ///
    /// Key order of `input` is preserved in the result. A single invalid
    /// parameter aborts the whole parse.
    pub fn parse_query_language(
        &self,
        input: &Map<String, Value>,
        default_operator: Operator,
    ) -> Result<ParsedQuery, QueryError> {
        let mut parsed = ParsedQuery::new();

        for (name, value) in input {
            let arg = match value {
                Value::Array(items) if !is_special_arg(name) => {
                    QueryArg::Filter(self.parse_repeated(name, items, default_operator)?)
                }
                _ => self.parse_query_comparison(name, value, default_operator)?,
            };
            parsed.insert(name.clone(), arg);
        }

        Ok(parsed)
    }

    /// Parse a single parameter value
    pub fn parse_query_comparison(
        &self,
        name: &str,
        value: &Value,
        default_operator: Operator,
    ) -> Result<QueryArg, QueryError> {
        if NUMERIC_ARGS.contains(&name) {
            return self.parse_numeric_arg(name, value).map(QueryArg::Integer);
        }
        if LIST_ARGS.contains(&name) {
            return parse_list_arg(name, value).map(QueryArg::List);
        }
        match name {
            "activeOnly" => return parse_flag(name, value).map(QueryArg::Flag),
            "direction" => return parse_direction(value).map(QueryArg::Direction),
            _ => {}
        }

        match value {
            Value::Object(nested) => {
                let nested_operator = if name == "v" {
                    Operator::Contains
                } else {
                    Operator::Equals
                };
                self.parse_query_language(nested, nested_operator)
                    .map(QueryArg::SubQuery)
            }
            Value::Array(_) => Err(QueryError::input_validation(format!(
                "Nested lists are not supported (parameter {})",
                name
            ))),
            Value::String(raw) => self
                .parse_alternatives(name, raw, default_operator)
                .map(QueryArg::Filter),
            scalar => Ok(QueryArg::Filter(
                Comparison::new(AttributeRef::field(name), default_operator, scalar.clone()).into(),
            )),
        }
    }

    /// AND together each value of a repeated parameter
    fn parse_repeated(
        &self,
        name: &str,
        items: &[Value],
        default_operator: Operator,
    ) -> Result<FilterClause, QueryError> {
        if items.is_empty() {
            return Err(QueryError::input_validation(format!(
                "No values given for parameter {}",
                name
            )));
        }

        let mut filters = Vec::with_capacity(items.len());
        for item in items {
            match self.parse_query_comparison(name, item, default_operator)? {
                QueryArg::Filter(filter) => filters.push(filter),
                _ => {
                    return Err(QueryError::input_validation(format!(
                        "Repeated values for {} must be plain values, not nested queries",
                        name
                    )))
                }
            }
        }
        Ok(FilterClause::and(filters))
    }

    /// Split a string value on `|` into an OR of alternatives
    fn parse_alternatives(
        &self,
        name: &str,
        raw: &str,
        default_operator: Operator,
    ) -> Result<FilterClause, QueryError> {
        let alternatives = raw
            .split('|')
            .map(|alternative| self.parse_alternative(name, alternative, default_operator))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FilterClause::or(alternatives))
    }

    fn parse_alternative(
        &self,
        name: &str,
        alternative: &str,
        default_operator: Operator,
    ) -> Result<FilterClause, QueryError> {
        let (negate, rest) = match alternative.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, alternative),
        };

        let Some(text) = rest.strip_prefix('~') else {
            let comparison =
                Comparison::new(AttributeRef::field(name), default_operator, literal(rest));
            return Ok(comparison.negated(negate).into());
        };

        if text.chars().any(|c| self.is_separator(c)) {
            let words: Vec<&str> = text
                .split(|c: char| self.is_separator(c))
                .filter(|word| !word.is_empty())
                .collect();
            if words.is_empty() {
                return Err(self.word_too_short(name, text));
            }
            let mut comparisons: Vec<FilterClause> = Vec::with_capacity(words.len());
            for word in words {
                if word.chars().count() < self.config.min_word_size {
                    return Err(self.word_too_short(name, word));
                }
                comparisons.push(
                    Comparison::new(
                        AttributeRef::field(name),
                        Operator::ContainsText,
                        Value::String(word.to_string()),
                    )
                    .negated(negate)
                    .into(),
                );
            }
            // NOT (a AND b) == NOT a OR NOT b
            return Ok(if negate {
                FilterClause::or(comparisons)
            } else {
                FilterClause::and(comparisons)
            });
        }

        if text.chars().count() < self.config.min_word_size {
            return Err(self.word_too_short(name, text));
        }
        let comparison =
            Comparison::new(AttributeRef::field(name), Operator::ContainsText, literal(text));
        Ok(comparison.negated(negate).into())
    }

    fn is_separator(&self, c: char) -> bool {
        c.is_whitespace() || self.config.separators.contains(c)
    }

    fn word_too_short(&self, name: &str, word: &str) -> QueryError {
        QueryError::input_validation(format!(
            "Word \"{}\" in text search on {} is too short. Text search words must be at least {} characters (MIN_WORD_SIZE)",
            word, name, self.config.min_word_size
        ))
    }

    fn parse_numeric_arg(&self, name: &str, value: &Value) -> Result<i64, QueryError> {
        let number = match value {
            Value::Number(number) => number.as_i64(),
            Value::String(raw) => raw.trim().parse::<i64>().ok(),
            Value::Array(_) => {
                return Err(QueryError::input_validation(format!(
                    "{} expects a single value, not a list",
                    name
                )))
            }
            _ => None,
        }
        .ok_or_else(|| {
            QueryError::input_validation(format!(
                "{} must be an integer, got {}",
                name,
                display_value(value)
            ))
        })?;

        match name {
            "fuzzyMatch" | "neighbors" => {
                if !(0..=self.config.max_jumps).contains(&number) {
                    return Err(QueryError::input_validation(format!(
                        "{} must be an integer between 0 and {} (MAX_JUMPS), got {}",
                        name, self.config.max_jumps, number
                    )));
                }
            }
            "skip" => {
                if number < 1 {
                    return Err(QueryError::input_validation(format!(
                        "skip must be a positive integer (>= 1), got {}",
                        number
                    )));
                }
            }
            "limit" => {
                if number < 1 || number > self.config.max_page_size {
                    return Err(QueryError::input_validation(format!(
                        "limit must be an integer between 1 and {} (MAX_QUERY_LIMIT), got {}",
                        self.config.max_page_size, number
                    )));
                }
            }
            "size" => {
                if number < 0 {
                    return Err(QueryError::input_validation(format!(
                        "size must be a non-negative integer, got {}",
                        number
                    )));
                }
            }
            _ => {}
        }

        Ok(number)
    }
}

fn literal(text: &str) -> Value {
    if text == "null" {
        Value::Null
    } else {
        Value::String(text.to_string())
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        other => other.to_string(),
    }
}

fn parse_list_arg(name: &str, value: &Value) -> Result<Vec<String>, QueryError> {
    let Value::String(raw) = value else {
        return Err(QueryError::input_validation(format!(
            "{} must be given as a single comma-separated string",
            name
        )));
    };
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .collect())
}

/// Loose boolean: `0`, `false` and `f` (any case, trimmed) are false
fn parse_flag(name: &str, value: &Value) -> Result<bool, QueryError> {
    let text = match value {
        Value::Bool(flag) => return Ok(*flag),
        Value::String(raw) => raw.clone(),
        Value::Array(_) | Value::Object(_) => {
            return Err(QueryError::input_validation(format!(
                "{} expects a single value",
                name
            )))
        }
        other => other.to_string(),
    };
    let normalized = text.trim().to_lowercase();
    Ok(!matches!(normalized.as_str(), "0" | "false" | "f"))
}

fn parse_direction(value: &Value) -> Result<TraversalDirection, QueryError> {
    let normalized = match value {
        Value::String(raw) => raw.trim().to_lowercase(),
        other => other.to_string(),
    };
    match normalized.as_str() {
        "out" => Ok(TraversalDirection::Out),
        "in" => Ok(TraversalDirection::In),
        _ => Err(QueryError::input_validation(format!(
            "direction must be one of 'out' or 'in', got {}",
            display_value(value)
        ))),
    }
}
