//! Core Model Trait - Static declaration of one entity type
//!
//! A domain type implements `Model` to declare what the original schema
//! knows about it: fields, primary key, relations, named scopes and
//! fetchers, and attached plugins. The trait is metadata-only; runtime state
//! lives in [`crate::model::Record`].

use std::rc::Rc;

use crate::model::descriptor::{EventHookFn, FetcherDef, Relation, ScopeDef, StaticDef};
use crate::plugins::ModelPlugin;

/// Static metadata provider for an entity type.
///
/// Only `model_name`, `fields` and `primary_key` are mandatory; everything
/// else defaults to empty. Plugin contributions are merged in at descriptor
/// assembly, not here.
pub trait Model {
    /// Short name the model is registered and queried under.
    fn model_name() -> &'static str;

    /// Column names of the model's own fields (without plugin fields).
    fn fields() -> Vec<&'static str>;

    /// Primary key field names; must be a non-empty subset of the fields.
    fn primary_key() -> Vec<&'static str>;

    /// The single auto-increment field, if the table has one.
    fn auto_increment_field() -> Option<&'static str> {
        None
    }

    /// Declared relations as `(name, relation)` pairs.
    fn relations() -> Vec<(String, Relation)> {
        Vec::new()
    }

    /// Named scopes beyond the built-in `byId` / `orderById`.
    fn scopes() -> Vec<ScopeDef> {
        Vec::new()
    }

    /// Named fetchers beyond the built-in `first` / `all` / `getById`.
    fn fetchers() -> Vec<FetcherDef> {
        Vec::new()
    }

    /// Plain statics resolvable by dynamic dispatch.
    fn statics() -> Vec<StaticDef> {
        Vec::new()
    }

    /// Plugins attached to the model, in order.
    fn plugins() -> Vec<Rc<dyn ModelPlugin>> {
        Vec::new()
    }

    /// Lifecycle hook on the model itself, fired after all plugin hooks.
    fn event_hook() -> Option<EventHookFn> {
        None
    }
}
