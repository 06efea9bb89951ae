//! Timestamps Plugin - Creation and update stamps
//!
//! Adds `creation_date` and `update_date` fields, stamped on insert and
//! update. Stamps only apply to writes going through the record lifecycle;
//! bulk updates issued through the query builder do not touch them.

use chrono::Utc;
use serde_json::Value;

use crate::error::{ModelError, OrmResult};
use crate::model::record::SharedRecord;
use crate::plugins::{ModelEvent, ModelPlugin};

/// Dynamic record attribute suppressing the stamps for one record.
const DISABLE_FLAG: &str = "_timestamps_disabled";

/// Timestamp behavior for a model.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timestamps;

impl Timestamps {
    pub fn new() -> Self {
        Self
    }

    fn now() -> Value {
        Value::String(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
    }

    fn is_disabled(record: &SharedRecord) -> bool {
        record.has(DISABLE_FLAG)
    }

    /// Suppress stamping for this record until re-enabled.
    pub fn disable(record: &SharedRecord) {
        record.set(DISABLE_FLAG, Value::Bool(true));
    }

    /// Resume stamping for this record.
    pub fn enable(record: &SharedRecord) {
        record.unset(DISABLE_FLAG);
    }
}

impl ModelPlugin for Timestamps {
    fn plugin_name(&self) -> &'static str {
        "Timestamps"
    }

    fn fields(&self) -> Vec<String> {
        vec!["creation_date".to_string(), "update_date".to_string()]
    }

    fn methods(&self) -> Vec<&'static str> {
        vec!["disableTimestamps", "enableTimestamps"]
    }

    fn call(&self, record: &SharedRecord, method: &str, _args: &[Value]) -> OrmResult<Value> {
        match method {
            "disableTimestamps" => Self::disable(record),
            "enableTimestamps" => Self::enable(record),
            _ => {
                return Err(ModelError::UnknownMethod(format!(
                    "Timestamps does not implement '{}'",
                    method
                )))
            }
        }
        Ok(Value::Null)
    }

    fn handle(&self, event: ModelEvent, record: &SharedRecord) -> OrmResult<()> {
        if Self::is_disabled(record) {
            return Ok(());
        }
        match event {
            ModelEvent::BeforeInsert => {
                let now = Self::now();
                record.set("creation_date", now.clone());
                record.set("update_date", now);
            }
            ModelEvent::BeforeUpdate => {
                record.set("update_date", Self::now());
            }
            _ => {}
        }
        Ok(())
    }
}
