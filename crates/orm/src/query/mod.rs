//! Query Builder - Relation-aware fluent SQL construction
//!
//! The builder accepts expressions containing `@`-prefixed relation paths
//! rooted at the selected model, validates them against the descriptors it
//! knows, and renders backend-legal SQL in four modes (SELECT, COUNT,
//! UPDATE, DELETE). Bound parameters accumulate in clause buckets so their
//! final order matches the placeholders of the rendered statement.

pub mod builder;
pub mod execution;
pub mod paths;
pub mod sql_generation;
pub mod types;

pub use builder::Query;
pub use types::{FoundRowsKey, QueryMode, ResultShape, MASTER_ALIAS, MAX_ROWCOUNT};
