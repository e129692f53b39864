//! Database Layer
//!
//! This module defines the storage collaborator and its in-process
//! implementation:
//!
//! - `RecordStore` - async CRUD trait (create/update/remove/select)
//! - `MemoryStore` - in-memory store with soft-delete history chains
//! - `filter_eval` - evaluation of filter trees against stored records
//!
//! The graph database itself sits behind `RecordStore`; nothing else in the
//! crate depends on a particular backend.

mod error;
pub mod filter_eval;
mod memory_store;
mod record_store;

pub use error::StoreError;
pub use filter_eval::{matches_filter, RecordResolver};
pub use memory_store::MemoryStore;
pub use record_store::RecordStore;
