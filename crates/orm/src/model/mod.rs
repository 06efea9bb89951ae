//! Model System - Static metadata and runtime records
//!
//! - `core_trait`: the `Model` trait a domain type implements to declare its
//!   fields, keys, relations, scopes, fetchers and plugins
//! - `descriptor`: the immutable, assembled description of one entity type
//! - `record`: the map-backed runtime record and its shared handle

pub mod core_trait;
pub mod descriptor;
pub mod record;

pub use core_trait::Model;
pub use descriptor::{
    Cardinality, EventHookFn, FetcherDef, ModelDescriptor, Relation, ScopeDef, ScopeFn, StaticDef,
};
pub use record::{Record, RelationValue, SharedRecord};
