//! Model Plugins - Composable per-model behaviors
//!
//! A plugin bundles extra fields, named scopes and fetchers, lifecycle
//! hooks, and instance methods, and attaches to a model through
//! [`crate::model::Model::plugins`]. Contributions are merged into the
//! model's descriptor at assembly time; instance methods dispatch through a
//! table built there, first declaration wins. Lifecycle events fire on every
//! plugin that handles them, in declaration order, then on the model's own
//! hook.

pub mod nested_set;
pub mod sequence;
pub mod timestamps;

pub use nested_set::{NestedSet, NestedSetNode};
pub use sequence::Sequence;
pub use timestamps::Timestamps;

use serde_json::Value;

use crate::error::{ModelError, OrmResult};
use crate::model::descriptor::{FetcherDef, ScopeDef};
use crate::model::record::SharedRecord;

/// Lifecycle events fired around record construction and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    AfterConstruct,
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
}

/// A bundle of behaviors attachable to a model.
///
/// Plugin values are constructed once per model declaration and shared; any
/// configuration (such as group fields) lives on the plugin value itself,
/// per-record state belongs on the record.
pub trait ModelPlugin {
    /// Name used in diagnostics.
    fn plugin_name(&self) -> &'static str;

    /// Extra fields merged into the model's field list.
    fn fields(&self) -> Vec<String> {
        Vec::new()
    }

    /// Named scopes contributed to the model.
    fn scopes(&self) -> Vec<ScopeDef> {
        Vec::new()
    }

    /// Named fetchers contributed to the model.
    fn fetchers(&self) -> Vec<FetcherDef> {
        Vec::new()
    }

    /// Instance method names this plugin answers to.
    fn methods(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Invoke a contributed instance method on a record.
    fn call(&self, _record: &SharedRecord, method: &str, _args: &[Value]) -> OrmResult<Value> {
        Err(ModelError::UnknownMethod(format!(
            "{} does not implement '{}'",
            self.plugin_name(),
            method
        )))
    }

    /// Handle a lifecycle event for a record.
    fn handle(&self, _event: ModelEvent, _record: &SharedRecord) -> OrmResult<()> {
        Ok(())
    }
}
