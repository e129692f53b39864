//! Business Services
//!
//! This module contains the reconciliation and query-translation logic:
//!
//! - `link_simplifier` - collapse nested record references to identifiers
//! - `update_decision` - decide whether proposed content changes a record
//! - `query_parser` - HTTP query parameters to typed filter trees
//! - `query_compiler` - parsed parameters to a select (filter + options)
//! - `UpsertService` - idempotent create-or-update over a `RecordStore`
//! - `RecordCache` - explicit per-run record cache for the upsert path
//!
//! The first four are pure functions over in-memory values and may be called
//! concurrently from any number of request handlers.

pub mod error;
pub mod link_simplifier;
pub mod query_compiler;
pub mod query_parser;
pub mod record_cache;
pub mod update_decision;
pub mod upsert_service;

pub use error::{QueryError, UpsertError};
pub use link_simplifier::simplify_records_links;
pub use query_compiler::{compile_query, QueryOptions, SelectQuery};
pub use query_parser::{
    parse_query_comparison, parse_query_language, ParsedQuery, QueryArg, QueryParser,
};
pub use record_cache::{CacheStats, RecordCache};
pub use update_decision::should_update;
pub use upsert_service::{UpsertOptions, UpsertOutcome, UpsertService};
