//! GraphKB Core
//!
//! Record reconciliation and query translation for the GraphKB knowledgebase.
//!
//! # Architecture
//!
//! - **Link simplification**: nested record references collapse to `#cluster:position`
//!   identifiers before records are compared or stored
//! - **Update decisions**: an upsert only writes when a non-excluded field really
//!   changed, so repeated loads of the same source data are idempotent
//! - **Query language**: HTTP query parameters become a typed filter tree
//!   (operators, negation, text search, link and edge traversals)
//!
//! # Modules
//!
//! - [`models`] - Records and filter-tree types
//! - [`services`] - Simplifier, update decision, query parser/compiler, upserts
//! - [`db`] - `RecordStore` trait, in-memory store and filter evaluation
//! - [`api`] - axum HTTP surface
//! - [`config`] - Runtime settings and query constants

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::{GraphKbConfig, QueryConfig};
pub use db::{MemoryStore, RecordStore, StoreError};
pub use models::*;
pub use services::*;
