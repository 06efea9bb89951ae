//! Manager - Model registry and operation entry point
//!
//! The manager owns one connection and one [`Table`] per associated model.
//! It maps short model names and canonical type keys to their descriptors,
//! hands out queries and static models, and routes single-record operations
//! to the right table.
//!
//! Managers, tables and records are thread-hostile by construction: they
//! share state through `Rc` and never cross threads. Use one manager per
//! connection and serialize access externally if you must.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::backends::Connection;
use crate::error::{ModelError, OrmResult};
use crate::model::core_trait::Model;
use crate::model::descriptor::ModelDescriptor;
use crate::model::record::SharedRecord;
use crate::plugins::ModelEvent;
use crate::query::{Query, ResultShape};
use crate::static_model::StaticModel;
use crate::table::Table;

/// Registered metadata of one associated model.
pub struct ModelInfo {
    pub model_name: String,
    pub table_identifier: String,
    pub descriptor: Rc<ModelDescriptor>,
    pub table: Table,
}

/// Registry mapping model names to tables; factory for queries, records and
/// static models.
pub struct Manager {
    connection: Rc<dyn Connection>,
    registry: RefCell<HashMap<String, Rc<ModelInfo>>>,
    registered_names: RefCell<Vec<String>>,
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self
            .registry
            .borrow()
            .values()
            .map(|info| info.model_name.clone())
            .collect();
        names.sort();
        names.dedup();
        f.debug_struct("Manager").field("models", &names).finish()
    }
}

impl Manager {
    pub fn new(connection: Rc<dyn Connection>) -> Rc<Self> {
        Rc::new(Self {
            connection,
            registry: RefCell::new(HashMap::new()),
            registered_names: RefCell::new(Vec::new()),
        })
    }

    /// Note model names that another resource is expected to associate
    /// later.
    pub fn register_model_names(&self, names: &[&str]) {
        self.registered_names
            .borrow_mut()
            .extend(names.iter().map(|n| n.to_string()));
    }

    /// The model names registered for later association.
    pub fn registered_model_names(&self) -> Vec<String> {
        self.registered_names.borrow().clone()
    }

    /// Associate a model type with a table identifier. The descriptor is
    /// assembled once here and registered under both the short model name
    /// and the canonical type key.
    pub fn associate<M: Model>(&self, table_identifier: &str) -> OrmResult<()> {
        let descriptor = Rc::new(ModelDescriptor::of::<M>()?);
        let info = Rc::new(ModelInfo {
            model_name: descriptor.name.clone(),
            table_identifier: table_identifier.to_string(),
            descriptor: descriptor.clone(),
            table: Table::new(
                self.connection.clone(),
                table_identifier,
                descriptor.clone(),
            ),
        });
        debug!(model = %info.model_name, table = %table_identifier, "associated model");
        let mut registry = self.registry.borrow_mut();
        registry.insert(std::any::type_name::<M>().to_string(), info.clone());
        registry.insert(descriptor.name.clone(), info);
        Ok(())
    }

    fn info(&self, name: &str) -> OrmResult<Rc<ModelInfo>> {
        self.registry
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnassociatedModel(name.to_string()))
    }

    pub(crate) fn connection(&self) -> Rc<dyn Connection> {
        self.connection.clone()
    }

    /// The assembled descriptor of an associated model.
    pub fn descriptor(&self, name: &str) -> OrmResult<Rc<ModelDescriptor>> {
        Ok(self.info(name)?.descriptor.clone())
    }

    /// The table identifier of an associated model.
    pub fn table_identifier(&self, name: &str) -> OrmResult<String> {
        Ok(self.info(name)?.table_identifier.clone())
    }

    /// Start a record-shaped query on a model.
    pub fn select(self: &Rc<Self>, name: &str) -> OrmResult<Query> {
        let mut query = Query::new(self.connection.clone(), self.clone(), ResultShape::Record);
        query.select(name)?;
        Ok(query)
    }

    /// Start an associative-map-shaped query on a model.
    pub fn select_assoc(self: &Rc<Self>, name: &str) -> OrmResult<Query> {
        let mut query = Query::new(self.connection.clone(), self.clone(), ResultShape::Assoc);
        query.select(name)?;
        Ok(query)
    }

    /// Create a new, manager-bound record of a model.
    pub fn create(self: &Rc<Self>, name: &str) -> OrmResult<SharedRecord> {
        let info = self.info(name)?;
        SharedRecord::new(info.descriptor.clone(), Some(self.clone()))
    }

    /// Load a record by its primary (and secondary) key values. A scalar
    /// key stands for the sole primary key field. `lazy` skips the load and
    /// returns a record holding only the key fields.
    pub fn get(
        self: &Rc<Self>,
        name: &str,
        key_values: &Value,
        lazy: bool,
    ) -> OrmResult<Option<SharedRecord>> {
        self.info(name)?.table.get(self, key_values, lazy)
    }

    /// Insert a record, routed by its model.
    pub fn insert(self: &Rc<Self>, record: &SharedRecord) -> OrmResult<bool> {
        self.info(&record.model_name())?.table.insert(self, record)
    }

    /// Update a record, routed by its model.
    pub fn update(self: &Rc<Self>, record: &SharedRecord) -> OrmResult<bool> {
        self.info(&record.model_name())?.table.update(self, record)
    }

    /// Delete a record, routed by its model.
    pub fn delete(self: &Rc<Self>, record: &SharedRecord) -> OrmResult<bool> {
        self.info(&record.model_name())?.table.delete(record)
    }

    /// Bind the record to this manager and save it.
    pub fn save(self: &Rc<Self>, record: &SharedRecord) -> OrmResult<bool> {
        record.set_manager(Some(self.clone()));
        record.save()
    }

    /// Insert several records of one model with a single statement. Fires
    /// `BeforeInsert` on each record; auto-increment fields are not
    /// refreshed afterwards, so no `AfterInsert` fires.
    pub fn multi_insert(self: &Rc<Self>, records: &[SharedRecord]) -> OrmResult<bool> {
        let first = match records.first() {
            Some(first) => first,
            None => return Ok(true),
        };
        for record in records {
            record.fire_event(ModelEvent::BeforeInsert)?;
        }
        self.info(&first.model_name())?.table.multi_insert(records)
    }

    /// A fresh [`StaticModel`] for fluent scoping on a model.
    pub fn static_model(self: &Rc<Self>, name: &str) -> OrmResult<StaticModel> {
        let info = self.info(name)?;
        Ok(StaticModel::new(&info.model_name, self.clone()))
    }

    /// Shorthand for [`Manager::static_model`].
    pub fn model(self: &Rc<Self>, name: &str) -> OrmResult<StaticModel> {
        self.static_model(name)
    }
}
