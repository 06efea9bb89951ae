//! Table - Single-table CRUD for one model
//!
//! Issues literal SQL for one table, quoting values through the connection.
//! Never joins; relation-aware work belongs to the query builder. Backend
//! errors on writes fold into the returned `bool`; callers inspect the
//! connection for detail.
//!
//! NULL handling: equality against NULL in a WHERE clause uses `IS NULL`,
//! assignments and value lists emit the `NULL` literal.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::backends::{Connection, SUCCESS_CODE};
use crate::error::{ModelError, OrmResult};
use crate::manager::Manager;
use crate::model::descriptor::ModelDescriptor;
use crate::model::record::SharedRecord;

/// CRUD interface for one table and one descriptor.
pub struct Table {
    connection: Rc<dyn Connection>,
    table_identifier: String,
    descriptor: Rc<ModelDescriptor>,
}

impl Table {
    pub fn new(
        connection: Rc<dyn Connection>,
        table_identifier: &str,
        descriptor: Rc<ModelDescriptor>,
    ) -> Self {
        Self {
            connection,
            table_identifier: table_identifier.to_string(),
            descriptor,
        }
    }

    pub fn table_identifier(&self) -> &str {
        &self.table_identifier
    }

    /// Join field/value pairs with `glue`, quoting values and using
    /// `null_equalizer` as the operator for NULL values.
    fn implode_field_values(
        &self,
        pairs: &BTreeMap<String, Value>,
        glue: &str,
        null_equalizer: &str,
    ) -> String {
        pairs
            .iter()
            .map(|(field, value)| {
                if value.is_null() {
                    format!("`{}` {} NULL", field, null_equalizer)
                } else {
                    format!("`{}` = {}", field, self.connection.quote(value))
                }
            })
            .collect::<Vec<_>>()
            .join(glue)
    }

    fn implode_column_list(columns: &[String]) -> String {
        format!("`{}`", columns.join("`, `"))
    }

    fn implode_value_list(&self, values: &[Value]) -> String {
        values
            .iter()
            .map(|value| {
                if value.is_null() {
                    "NULL".to_string()
                } else {
                    self.connection.quote(value)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Load the record with the given key values. A scalar stands for the
    /// sole primary key field; missing any primary key field yields `None`.
    /// With `lazy` the returned record holds only the key fields and no
    /// statement is issued.
    pub fn get(
        &self,
        manager: &Rc<Manager>,
        key_values: &Value,
        lazy: bool,
    ) -> OrmResult<Option<SharedRecord>> {
        let record = match SharedRecord::lazy_instance(
            self.descriptor.clone(),
            Some(manager.clone()),
            key_values,
        )? {
            Some(record) => record,
            None => return Ok(None),
        };

        if lazy {
            return Ok(Some(record));
        }

        match self.load(&record) {
            Ok(()) => Ok(Some(record)),
            // no matching row is an absent record, not a failure
            Err(ModelError::DataUnavailable(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Load the row matching the record's captured keys into the record.
    pub fn load(&self, record: &SharedRecord) -> OrmResult<()> {
        let keys = record.key_values();
        let sql = format!(
            "SELECT * FROM {} WHERE {} LIMIT 0, 1",
            self.table_identifier,
            self.implode_field_values(&keys, " AND ", "IS")
        );
        debug!(sql = %sql, "loading record");

        let mut statement = self.connection.query(&sql)?;
        let row = statement.fetch()?;
        statement.close_cursor();

        let row = row.ok_or_else(|| ModelError::DataUnavailable(self.table_identifier.clone()))?;
        record.from_array(row.iter());
        record.mark_as_saved();
        Ok(())
    }

    /// Insert the record. On success the auto-increment field, if declared,
    /// is refreshed from the connection and the record is marked as saved.
    pub fn insert(&self, manager: &Rc<Manager>, record: &SharedRecord) -> OrmResult<bool> {
        let values = record.field_values();
        let columns: Vec<String> = values.iter().map(|(f, _)| f.clone()).collect();
        let row: Vec<Value> = values.into_iter().map(|(_, v)| v).collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table_identifier,
            Self::implode_column_list(&columns),
            self.implode_value_list(&row)
        );
        debug!(sql = %sql, "inserting record");

        if self.connection.exec(&sql).is_err() {
            return Ok(false);
        }
        if self.connection.error_code() != SUCCESS_CODE {
            return Ok(false);
        }

        if let Some(ai_field) = &self.descriptor.auto_increment_field {
            record.set(ai_field, Value::from(self.connection.last_insert_id()));
        }

        record.set_manager(Some(manager.clone()));
        record.mark_as_saved();
        Ok(true)
    }

    /// Insert several records with one statement, using the column order of
    /// the first record. Auto-increment fields are not refreshed and the
    /// records are not marked as saved.
    pub fn multi_insert(&self, records: &[SharedRecord]) -> OrmResult<bool> {
        let first = match records.first() {
            Some(first) => first,
            None => return Ok(true),
        };
        let columns: Vec<String> = first
            .field_values()
            .into_iter()
            .map(|(f, _)| f)
            .collect();

        let tuples: Vec<String> = records
            .iter()
            .map(|record| {
                let row: Vec<Value> = columns
                    .iter()
                    .map(|column| record.get(column).unwrap_or(Value::Null))
                    .collect();
                format!("({})", self.implode_value_list(&row))
            })
            .collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table_identifier,
            Self::implode_column_list(&columns),
            tuples.join(", ")
        );
        debug!(sql = %sql, rows = records.len(), "multi-inserting records");

        if self.connection.exec(&sql).is_err() {
            return Ok(false);
        }
        Ok(self.connection.error_code() == SUCCESS_CODE)
    }

    /// Update the row matching the record's captured keys. Zero changed
    /// rows still count as success when the driver reports no error.
    pub fn update(&self, manager: &Rc<Manager>, record: &SharedRecord) -> OrmResult<bool> {
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.table_identifier,
            self.implode_field_values(&record.to_array(), ", ", "="),
            self.implode_field_values(&record.key_values(), " AND ", "IS")
        );
        debug!(sql = %sql, "updating record");

        if self.connection.exec(&sql).is_err() {
            return Ok(false);
        }
        if self.connection.error_code() != SUCCESS_CODE {
            return Ok(false);
        }

        record.set_manager(Some(manager.clone()));
        record.mark_as_saved();
        Ok(true)
    }

    /// Delete the row matching the record's captured keys. Succeeds only
    /// when at least one row went away and the driver reports no error.
    pub fn delete(&self, record: &SharedRecord) -> OrmResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            self.table_identifier,
            self.implode_field_values(&record.key_values(), " AND ", "IS")
        );
        debug!(sql = %sql, "deleting record");

        let rows = match self.connection.exec(&sql) {
            Ok(rows) => rows,
            Err(_) => return Ok(false),
        };
        Ok(rows > 0 && self.connection.error_code() == SUCCESS_CODE)
    }
}
