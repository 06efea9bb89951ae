//! # quarry-orm: Relation-aware query building and hydration
//!
//! A fluent query builder with relation-path composition, result hydration
//! and plugin-driven model behaviors, layered over an opaque SQL
//! connection. Queries are described in terms of models and their declared
//! relations; results materialize either as nested associative maps or as
//! records linked by their relationships.
//!
//! Queries, records and managers share state through `Rc` and are
//! thread-hostile by design: use one manager per connection and keep each
//! on its own thread.
//!
//! ```no_run
//! # use std::rc::Rc;
//! # use quarry_orm::{Manager, Model, Relation};
//! # use serde_json::json;
//! # struct Post;
//! # impl Model for Post {
//! #     fn model_name() -> &'static str { "Post" }
//! #     fn fields() -> Vec<&'static str> { vec!["id", "title"] }
//! #     fn primary_key() -> Vec<&'static str> { vec!["id"] }
//! #     fn relations() -> Vec<(String, Relation)> {
//! #         vec![("comments".into(), Relation::one_to_many("Comment", &[("id", "post_id")]))]
//! #     }
//! # }
//! # fn run(manager: &Rc<Manager>) -> quarry_orm::OrmResult<()> {
//! let posts = manager
//!     .select("Post")?
//!     .with("@comments")?
//!     .and_where("@title LIKE ?", &[json!("%rust%")])
//!     .order("@comments.id", "ASC")?
//!     .all(&[])?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod error;
pub mod hydration;
pub mod manager;
pub mod model;
pub mod plugins;
pub mod query;
pub mod static_model;
pub mod table;

#[cfg(test)]
mod tests;

// Re-export core traits and types
pub use backends::{Connection, ConnectionError, SqlRow, Statement, SUCCESS_CODE};
pub use error::{ModelError, ModelResult, OrmError, OrmResult, QueryError};
pub use manager::{Manager, ModelInfo};
pub use model::{
    Cardinality, EventHookFn, FetcherDef, Model, ModelDescriptor, Record, Relation, RelationValue,
    ScopeDef, ScopeFn, SharedRecord, StaticDef,
};
pub use plugins::{ModelEvent, ModelPlugin, NestedSet, NestedSetNode, Sequence, Timestamps};
pub use query::{FoundRowsKey, Query, QueryMode, ResultShape, MASTER_ALIAS, MAX_ROWCOUNT};
pub use static_model::{Dispatched, Fetched, StaticModel};
pub use table::Table;
