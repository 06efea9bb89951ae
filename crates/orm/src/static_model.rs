//! StaticModel - Per-request scope accumulator with dynamic dispatch
//!
//! A `StaticModel` is a chainable facade bound to one model and manager. It
//! collects pending scopes; `query()` builds a fresh query and applies them
//! in order. Unknown method names dispatch dynamically: a scope appends and
//! chains, a fetcher runs and returns its shaped result, and anything else
//! falls through to the model's plain statics.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::error::{ModelError, OrmResult};
use crate::manager::Manager;
use crate::model::descriptor::ScopeFn;
use crate::model::record::SharedRecord;
use crate::query::Query;

/// Result of a fetcher: the shape depends on what was asked for.
pub enum Fetched {
    /// All matching records.
    Records(Vec<SharedRecord>),
    /// The first matching record, if any.
    Record(Option<SharedRecord>),
    /// All matching rows as associative maps.
    Rows(Vec<Value>),
    /// The first matching row as an associative map, if any.
    Row(Option<Value>),
    /// A scalar result, such as an aggregate.
    Value(Value),
}

impl Fetched {
    pub fn into_records(self) -> Vec<SharedRecord> {
        match self {
            Fetched::Records(records) => records,
            Fetched::Record(Some(record)) => vec![record],
            _ => Vec::new(),
        }
    }

    pub fn into_record(self) -> Option<SharedRecord> {
        match self {
            Fetched::Record(record) => record,
            Fetched::Records(mut records) if !records.is_empty() => Some(records.remove(0)),
            _ => None,
        }
    }

    pub fn into_rows(self) -> Vec<Value> {
        match self {
            Fetched::Rows(rows) => rows,
            Fetched::Row(Some(row)) => vec![row],
            _ => Vec::new(),
        }
    }

    pub fn into_row(self) -> Option<Value> {
        match self {
            Fetched::Row(row) => row,
            Fetched::Rows(mut rows) if !rows.is_empty() => Some(rows.remove(0)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Fetched::Value(value) => value,
            _ => Value::Null,
        }
    }
}

impl fmt::Debug for Fetched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fetched::Records(records) => write!(f, "Records({})", records.len()),
            Fetched::Record(record) => write!(f, "Record({})", record.is_some()),
            Fetched::Rows(rows) => write!(f, "Rows({})", rows.len()),
            Fetched::Row(row) => write!(f, "Row({})", row.is_some()),
            Fetched::Value(value) => write!(f, "Value({})", value),
        }
    }
}

/// Outcome of a dynamic dispatch.
#[derive(Debug)]
pub enum Dispatched {
    /// A scope was appended; keep chaining.
    Chained,
    /// A fetcher ran.
    Fetched(Fetched),
    /// A plain static ran.
    Value(Value),
}

/// Chainable scope accumulator for one model.
pub struct StaticModel {
    model_name: String,
    manager: Rc<Manager>,
    scopes: Vec<ScopeFn>,
}

impl StaticModel {
    pub fn new(model_name: &str, manager: Rc<Manager>) -> Self {
        Self {
            model_name: model_name.to_string(),
            manager,
            scopes: Vec::new(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn manager(&self) -> &Rc<Manager> {
        &self.manager
    }

    /// Append a scope to apply when the query is built.
    pub fn scope(&mut self, scope: ScopeFn) -> &mut Self {
        self.scopes.push(scope);
        self
    }

    /// Build the query for the model with all pending scopes applied.
    pub fn query(&self) -> OrmResult<Query> {
        let mut query = self.manager.select(&self.model_name)?;
        for scope in &self.scopes {
            scope(&mut query)?;
        }
        Ok(query)
    }

    /// Dynamic dispatch by name: scopes chain, fetchers and statics run.
    pub fn call(&mut self, name: &str, args: &[Value]) -> OrmResult<Dispatched> {
        let descriptor = self.manager.descriptor(&self.model_name)?;

        if let Some(scope_def) = descriptor.scope(name) {
            let scope = scope_def.build(args)?;
            self.scopes.push(scope);
            return Ok(Dispatched::Chained);
        }

        if let Some(fetcher) = descriptor.fetcher(name) {
            return Ok(Dispatched::Fetched(fetcher.call(self, args)?));
        }

        if let Some(static_def) = descriptor.static_method(name) {
            return Ok(Dispatched::Value(static_def.call(&self.manager, args)?));
        }

        Err(ModelError::UnknownMethod(format!(
            "{}::{}",
            self.model_name, name
        )))
    }
}
