//! Runtime Records - Map-backed entity instances
//!
//! A [`Record`] is the runtime shape of one table row: a map of declared
//! field values plus the hidden bookkeeping the write path needs (captured
//! primary/secondary key values, the old-value snapshot, the new/loaded
//! flag). [`SharedRecord`] is the cheap `Rc` handle everything else passes
//! around; entity identity in hydration is pointer identity of that handle.
//!
//! Records are open maps: `set` accepts non-declared keys so plugins can
//! stash per-record flags, but `to_array` and the write path only ever see
//! declared fields.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{ModelError, OrmResult};
use crate::manager::Manager;
use crate::model::descriptor::ModelDescriptor;
use crate::plugins::ModelEvent;
use crate::query::Query;
use crate::static_model::StaticModel;

/// A hydrated relation attribute on a record.
#[derive(Clone)]
pub enum RelationValue {
    /// One-to-one / many-to-one: the single related record, if any.
    One(Option<SharedRecord>),
    /// One-to-many: the related records, deduplicated by identity.
    Many(Vec<SharedRecord>),
}

impl fmt::Debug for RelationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationValue::One(Some(_)) => write!(f, "One(<record>)"),
            RelationValue::One(None) => write!(f, "One(None)"),
            RelationValue::Many(records) => write!(f, "Many({} records)", records.len()),
        }
    }
}

/// Map-backed record state. Use [`SharedRecord`] for all access.
pub struct Record {
    descriptor: Rc<ModelDescriptor>,
    manager: Option<Rc<Manager>>,
    values: BTreeMap<String, Value>,
    relations: Vec<(String, RelationValue)>,
    pk_capture: BTreeMap<String, Value>,
    sk_capture: BTreeMap<String, Value>,
    old_values: BTreeMap<String, Value>,
    is_new: bool,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.descriptor.name)
            .field("values", &self.values)
            .field("is_new", &self.is_new)
            .finish()
    }
}

/// Shared handle to a [`Record`].
///
/// `Clone` is cheap and aliases the same record; comparing handles with
/// [`SharedRecord::same_record`] compares identity, not field values.
#[derive(Clone)]
pub struct SharedRecord {
    inner: Rc<RefCell<Record>>,
}

impl fmt::Debug for SharedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner.borrow(), f)
    }
}

impl SharedRecord {
    /// Create a fresh, new record and fire the `AfterConstruct` event.
    pub fn new(
        descriptor: Rc<ModelDescriptor>,
        manager: Option<Rc<Manager>>,
    ) -> OrmResult<Self> {
        let record = Self {
            inner: Rc::new(RefCell::new(Record {
                descriptor,
                manager,
                values: BTreeMap::new(),
                relations: Vec::new(),
                pk_capture: BTreeMap::new(),
                sk_capture: BTreeMap::new(),
                old_values: BTreeMap::new(),
                is_new: true,
            })),
        };
        record.fire_event(ModelEvent::AfterConstruct)?;
        Ok(record)
    }

    /// Build a lazy instance holding only key values.
    ///
    /// A scalar key stands for the sole primary key field. Key fields that
    /// are part of the primary key are captured as such; any other given
    /// field becomes a secondary key that the write path will match on.
    /// Returns `None` when a primary key field is missing.
    pub fn lazy_instance(
        descriptor: Rc<ModelDescriptor>,
        manager: Option<Rc<Manager>>,
        key_values: &Value,
    ) -> OrmResult<Option<Self>> {
        let record = Self::new(descriptor.clone(), manager)?;

        let key_values: BTreeMap<String, Value> = match key_values {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            scalar => {
                let mut map = BTreeMap::new();
                map.insert(descriptor.primary_key[0].clone(), scalar.clone());
                map
            }
        };

        for pk_field in &descriptor.primary_key {
            if !key_values.contains_key(pk_field) {
                return Ok(None);
            }
        }

        {
            let mut inner = record.inner.borrow_mut();
            // field values from construction hooks are unknown for a lazy
            // instance, drop them
            inner.values.clear();
            for (field, value) in key_values {
                if descriptor.primary_key.contains(&field) {
                    inner.pk_capture.insert(field.clone(), value.clone());
                } else {
                    inner.sk_capture.insert(field.clone(), value.clone());
                }
                inner.values.insert(field, value);
            }
            inner.is_new = false;
        }

        Ok(Some(record))
    }

    /// Identity comparison: do both handles alias the same record?
    pub fn same_record(&self, other: &SharedRecord) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn as_ptr(&self) -> *const RefCell<Record> {
        Rc::as_ptr(&self.inner)
    }

    pub fn descriptor(&self) -> Rc<ModelDescriptor> {
        self.inner.borrow().descriptor.clone()
    }

    pub fn model_name(&self) -> String {
        self.inner.borrow().descriptor.name.clone()
    }

    pub fn manager(&self) -> Option<Rc<Manager>> {
        self.inner.borrow().manager.clone()
    }

    pub fn set_manager(&self, manager: Option<Rc<Manager>>) {
        self.inner.borrow_mut().manager = manager;
    }

    /// Get a field or dynamic attribute value.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.inner.borrow().values.get(field).cloned()
    }

    /// Get a field as an integer, accepting numeric strings from drivers
    /// that return untyped text.
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        match self.get(field)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Set a field or dynamic attribute value.
    pub fn set(&self, field: &str, value: Value) {
        self.inner
            .borrow_mut()
            .values
            .insert(field.to_string(), value);
    }

    /// Remove a field value, making it explicitly absent.
    pub fn unset(&self, field: &str) {
        self.inner.borrow_mut().values.remove(field);
    }

    pub fn has(&self, field: &str) -> bool {
        self.inner.borrow().values.contains_key(field)
    }

    /// Set declared fields from a map; non-declared keys are ignored.
    pub fn from_array<'a, I>(&self, values: I)
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut inner = self.inner.borrow_mut();
        let declared = inner.descriptor.fields.clone();
        for (field, value) in values {
            if declared.iter().any(|f| f == field) {
                inner.values.insert(field.to_string(), value.clone());
            }
        }
    }

    /// Declared fields currently set, as a map.
    pub fn to_array(&self) -> BTreeMap<String, Value> {
        self.field_values().into_iter().collect()
    }

    /// Declared fields currently set, in descriptor field order.
    pub fn field_values(&self) -> Vec<(String, Value)> {
        let inner = self.inner.borrow();
        inner
            .descriptor
            .fields
            .iter()
            .filter_map(|f| inner.values.get(f).map(|v| (f.clone(), v.clone())))
            .collect()
    }

    /// Mark the record as loaded/saved: refresh the key captures and the
    /// old-value snapshot. The primary key capture always reflects the
    /// values as of this call, so later mutation of a key field does not
    /// retarget updates or deletes.
    pub fn mark_as_saved(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.is_new = false;

        let pk_fields = inner.descriptor.primary_key.clone();
        for field in pk_fields {
            let value = inner.values.get(&field).cloned().unwrap_or(Value::Null);
            inner.pk_capture.insert(field, value);
        }

        let sk_fields: Vec<String> = inner.sk_capture.keys().cloned().collect();
        for field in sk_fields {
            let value = inner.values.get(&field).cloned().unwrap_or(Value::Null);
            inner.sk_capture.insert(field, value);
        }

        let declared = inner.descriptor.fields.clone();
        inner.old_values = declared
            .iter()
            .filter_map(|f| inner.values.get(f).map(|v| (f.clone(), v.clone())))
            .collect();
    }

    pub fn is_new(&self) -> bool {
        self.inner.borrow().is_new
    }

    /// Snapshot of the field values at the last `mark_as_saved`.
    pub fn old_values(&self) -> BTreeMap<String, Value> {
        self.inner.borrow().old_values.clone()
    }

    pub fn old_value(&self, field: &str) -> Option<Value> {
        self.inner.borrow().old_values.get(field).cloned()
    }

    /// Whether a field differs from its last-saved value.
    pub fn field_changed(&self, field: &str) -> bool {
        let inner = self.inner.borrow();
        let current = inner.values.get(field).cloned().unwrap_or(Value::Null);
        let old = inner.old_values.get(field).cloned().unwrap_or(Value::Null);
        current != old
    }

    /// Primary and secondary key values captured at load time, merged.
    /// This is the WHERE basis for updates and deletes.
    pub fn key_values(&self) -> BTreeMap<String, Value> {
        let inner = self.inner.borrow();
        let mut keys = inner.pk_capture.clone();
        keys.extend(inner.sk_capture.iter().map(|(k, v)| (k.clone(), v.clone())));
        keys
    }

    /// Stable identifier for the row this record represents: a digest over
    /// the model name and the primary key values.
    pub fn unique_identifier(&self) -> String {
        let inner = self.inner.borrow();
        let mut hasher = Sha256::new();
        hasher.update(inner.descriptor.name.as_bytes());
        for field in &inner.descriptor.primary_key {
            hasher.update([0x1f]);
            let value = inner.values.get(field).cloned().unwrap_or(Value::Null);
            hasher.update(value.to_string().as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// The hydrated relation attribute, if this record was fetched with the
    /// relation joined in.
    pub fn relation(&self, name: &str) -> Option<RelationValue> {
        self.inner
            .borrow()
            .relations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    pub(crate) fn set_relation(&self, name: &str, value: RelationValue) {
        let mut inner = self.inner.borrow_mut();
        if let Some(slot) = inner.relations.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            inner.relations.push((name.to_string(), value));
        }
    }

    /// Initialize a relation slot without clobbering an existing value.
    pub(crate) fn init_relation(&self, name: &str, value: RelationValue) {
        let mut inner = self.inner.borrow_mut();
        if !inner.relations.iter().any(|(n, _)| n == name) {
            inner.relations.push((name.to_string(), value));
        }
    }

    /// Append to a one-to-many relation unless the same record (by
    /// identity) is already present.
    pub(crate) fn push_relation(&self, name: &str, child: SharedRecord) {
        let mut inner = self.inner.borrow_mut();
        match inner.relations.iter_mut().find(|(n, _)| n == name) {
            Some((_, RelationValue::Many(records))) => {
                if !records.iter().any(|r| r.same_record(&child)) {
                    records.push(child);
                }
            }
            Some((_, slot @ RelationValue::One(_))) => {
                *slot = RelationValue::Many(vec![child]);
            }
            None => {
                inner
                    .relations
                    .push((name.to_string(), RelationValue::Many(vec![child])));
            }
        }
    }

    /// Fire a lifecycle event: every plugin defining the hook in declaration
    /// order, then the model's own hook if present.
    pub fn fire_event(&self, event: ModelEvent) -> OrmResult<()> {
        let descriptor = self.descriptor();
        for plugin in &descriptor.plugins {
            plugin.handle(event, self)?;
        }
        if let Some(hook) = descriptor.event_hook {
            hook(event, self)?;
        }
        Ok(())
    }

    /// Dynamic instance-method dispatch through the plugin table.
    pub fn call(&self, method: &str, args: &[Value]) -> OrmResult<Value> {
        let descriptor = self.descriptor();
        match descriptor.methods.get(method) {
            Some(&index) => descriptor.plugins[index].call(self, method, args),
            None => Err(ModelError::UnknownMethod(method.to_string())),
        }
    }

    /// Save the record: insert when new, update otherwise. Fires the
    /// before/after lifecycle events around the write.
    pub fn save(&self) -> OrmResult<bool> {
        let manager = self.manager().ok_or(ModelError::NoManager)?;
        if self.is_new() {
            self.fire_event(ModelEvent::BeforeInsert)?;
            let ok = manager.insert(self)?;
            if ok {
                self.fire_event(ModelEvent::AfterInsert)?;
            }
            Ok(ok)
        } else {
            self.fire_event(ModelEvent::BeforeUpdate)?;
            let ok = manager.update(self)?;
            if ok {
                self.fire_event(ModelEvent::AfterUpdate)?;
            }
            Ok(ok)
        }
    }

    /// Delete the record, firing the before/after lifecycle events.
    pub fn delete(&self) -> OrmResult<bool> {
        let manager = self.manager().ok_or(ModelError::NoManager)?;
        self.fire_event(ModelEvent::BeforeDelete)?;
        let ok = manager.delete(self)?;
        if ok {
            self.fire_event(ModelEvent::AfterDelete)?;
        }
        Ok(ok)
    }

    /// Start a record-shaped query on this record's model.
    pub fn select(&self) -> OrmResult<Query> {
        let manager = self.manager().ok_or(ModelError::NoManager)?;
        manager.select(&self.model_name())
    }

    /// A fresh [`StaticModel`] bound to this record's model and manager.
    pub fn static_model(&self) -> OrmResult<StaticModel> {
        let manager = self.manager().ok_or(ModelError::NoManager)?;
        Ok(StaticModel::new(&self.model_name(), manager))
    }
}
