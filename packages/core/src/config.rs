//! Configuration
//!
//! Runtime settings for the API server and the query parser. Every value has a
//! default; `from_env` overrides them from `GRAPHKB_*` environment variables.

use serde::{Deserialize, Serialize};

/// Maximum number of relationship jumps for `neighbors` and `fuzzyMatch`
pub const MAX_JUMPS: i64 = 4;

/// Minimum length of each word in a text search
pub const MIN_WORD_SIZE: usize = 4;

/// Maximum page size accepted for `limit`
pub const MAX_QUERY_LIMIT: i64 = 1000;

/// Characters (besides whitespace) that split a text search into words
pub const DEFAULT_SEARCH_SEPARATORS: &str = ":;,./\\_";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

/// Query parser settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfig {
    /// Upper bound for `neighbors` and `fuzzyMatch`
    pub max_jumps: i64,
    /// Minimum characters per text-search word
    pub min_word_size: usize,
    /// Upper bound for `limit`
    pub max_page_size: i64,
    /// Word separators for text search (whitespace always separates)
    pub separators: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_jumps: MAX_JUMPS,
            min_word_size: MIN_WORD_SIZE,
            max_page_size: MAX_QUERY_LIMIT,
            separators: DEFAULT_SEARCH_SEPARATORS.to_string(),
        }
    }
}

/// Top-level settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GraphKbConfig {
    /// HTTP port for the API server
    pub port: u16,
    /// User recorded on writes when a request names none
    pub default_user: String,
    pub query: QueryConfig,
}

impl Default for GraphKbConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            default_user: "anonymous".to_string(),
            query: QueryConfig::default(),
        }
    }
}

impl GraphKbConfig {
    /// Build configuration from the process environment
    ///
    /// Reads `GRAPHKB_PORT`, `GRAPHKB_DEFAULT_USER` and `GRAPHKB_MAX_PAGE_SIZE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Unparseable values are ignored with a warning and the default is kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = parse_var(&lookup, "GRAPHKB_PORT") {
            config.port = port;
        }
        if let Some(user) = lookup("GRAPHKB_DEFAULT_USER") {
            let user = user.trim();
            if !user.is_empty() {
                config.default_user = user.to_string();
            }
        }
        if let Some(page_size) = parse_var::<i64, _>(&lookup, "GRAPHKB_MAX_PAGE_SIZE") {
            if page_size >= 1 {
                config.query.max_page_size = page_size;
            } else {
                tracing::warn!(
                    "Ignoring GRAPHKB_MAX_PAGE_SIZE={}: must be at least 1",
                    page_size
                );
            }
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GraphKbConfig::from_lookup(lookup(&[]));
        assert_eq!(config, GraphKbConfig::default());
        assert_eq!(config.query.max_jumps, 4);
        assert_eq!(config.query.min_word_size, 4);
    }

    #[test]
    fn test_env_overrides() {
        let config = GraphKbConfig::from_lookup(lookup(&[
            ("GRAPHKB_PORT", "9000"),
            ("GRAPHKB_DEFAULT_USER", " etl "),
            ("GRAPHKB_MAX_PAGE_SIZE", "250"),
        ]));
        assert_eq!(config.port, 9000);
        assert_eq!(config.default_user, "etl");
        assert_eq!(config.query.max_page_size, 250);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = GraphKbConfig::from_lookup(lookup(&[
            ("GRAPHKB_PORT", "not-a-port"),
            ("GRAPHKB_MAX_PAGE_SIZE", "0"),
        ]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.query.max_page_size, MAX_QUERY_LIMIT);
    }
}
