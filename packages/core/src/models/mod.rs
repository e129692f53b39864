//! Data Models
//!
//! This module contains the in-memory structures shared by the services and the
//! storage layer:
//!
//! - `Record` - Generic JSON record plus helpers for record references
//! - `FilterClause` - Typed filter tree produced by the query parser
//!
//! None of these are persisted by this crate directly; the storage layer owns
//! persistence.

mod filter;
mod record;

pub use filter::{
    AttributeRef, Clause, Combinator, Comparison, FilterClause, Operator, TraversalDirection,
    TraversalKind,
};
pub use record::{
    id_string, is_deleted, record_id, record_id_string, Record, CLASS_FIELD,
    DELETED_AT_FIELD, DELETED_BY_FIELD, HISTORY_FIELD, RID_FIELD, SERVER_MANAGED_FIELDS,
};
