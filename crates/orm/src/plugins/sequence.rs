//! Sequence Plugin - Gapless ordered records
//!
//! Adds an `index` field holding a 0-based position. Optional group fields
//! partition the index domain: each distinct tuple of group values has its
//! own 0..N-1 sequence. New records append at the end of their group; moves
//! shift the intervening records by one; deletes compact the gap.
//!
//! Moves and compactions issue several statements without a transaction;
//! wrap the connection externally when atomicity matters.

use std::rc::Rc;

use serde_json::{json, Value};

use crate::error::{ModelError, OrmResult};
use crate::model::descriptor::{FetcherDef, ScopeDef, ScopeFn};
use crate::model::record::SharedRecord;
use crate::plugins::{ModelEvent, ModelPlugin};
use crate::query::Query;
use crate::static_model::Fetched;

/// Ordered-sequence behavior for a model.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    group_fields: Vec<String>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition the index domain by the given fields.
    pub fn grouped_by(fields: &[&str]) -> Self {
        Self {
            group_fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Scope restricting a query to the record's group. `old` uses the
    /// group values as of the last save instead of the current ones.
    fn group_scope(&self, record: &SharedRecord, old: bool) -> ScopeFn {
        let conditions: Vec<(String, Value)> = self
            .group_fields
            .iter()
            .map(|field| {
                let value = if old {
                    record.old_value(field)
                } else {
                    record.get(field)
                };
                (field.clone(), value.unwrap_or(Value::Null))
            })
            .collect();
        Rc::new(move |q: &mut Query| {
            for (field, value) in &conditions {
                q.and_where(&format!("@{} = ?", field), &[value.clone()]);
            }
            Ok(())
        })
    }

    fn index_of(&self, record: &SharedRecord) -> OrmResult<i64> {
        record
            .get_i64("index")
            .ok_or_else(|| ModelError::Plugin("record has no index value".to_string()))
    }

    /// Highest index within the record's group, -1 when the group is empty.
    pub fn max_index(&self, record: &SharedRecord) -> OrmResult<i64> {
        let scope = self.group_scope(record, false);
        let mut query = record.select()?;
        query.alias("MAX(@index)", "@max_index")?.scope(|q| scope(q))?;
        let row = query.first_assoc(&[])?;
        Ok(row
            .as_ref()
            .and_then(|r| r.get("max_index"))
            .and_then(value_as_i64)
            .unwrap_or(-1))
    }

    /// Move the record `count` positions: positive is down, negative up.
    pub fn move_by(&self, record: &SharedRecord, count: i64) -> OrmResult<()> {
        if count > 0 {
            self.move_down(record, count)
        } else if count < 0 {
            self.move_up(record, -count)
        } else {
            Ok(())
        }
    }

    /// Move the record up, shifting the records in between down by one.
    /// No-op at the top of the group; moving a new record is an error.
    pub fn move_up(&self, record: &SharedRecord, count: i64) -> OrmResult<()> {
        if record.is_new() {
            return Err(ModelError::Plugin(
                "impossible to move a new record".to_string(),
            ));
        }
        let index = self.index_of(record)?;
        if index <= 0 || count <= 0 {
            return Ok(());
        }

        let new_index = (index - count).max(0);
        let scope = self.group_scope(record, false);
        record
            .select()?
            .and_where("@index >= ?", &[json!(new_index)])
            .and_where("@index < ?", &[json!(index)])
            .set("@index = @index + 1", &[])
            .scope(|q| scope(q))?
            .update(&[])?;

        record.set("index", json!(new_index));
        record.save()?;
        Ok(())
    }

    /// Move the record down, shifting the records in between up by one.
    /// No-op at the end of the group; moving a new record is an error.
    pub fn move_down(&self, record: &SharedRecord, count: i64) -> OrmResult<()> {
        if record.is_new() {
            return Err(ModelError::Plugin(
                "impossible to move a new record".to_string(),
            ));
        }
        let index = self.index_of(record)?;
        let max_index = self.max_index(record)?;
        if index >= max_index || count <= 0 {
            return Ok(());
        }

        let new_index = (index + count).min(max_index);
        if new_index == index {
            return Ok(());
        }

        let scope = self.group_scope(record, false);
        record
            .select()?
            .and_where("@index > ?", &[json!(index)])
            .and_where("@index <= ?", &[json!(new_index)])
            .set("@index = @index - 1", &[])
            .scope(|q| scope(q))?
            .update(&[])?;

        record.set("index", json!(new_index));
        record.save()?;
        Ok(())
    }

    fn group_field_changed(&self, record: &SharedRecord) -> bool {
        self.group_fields
            .iter()
            .any(|field| record.field_changed(field))
    }
}

impl ModelPlugin for Sequence {
    fn plugin_name(&self) -> &'static str {
        "Sequence"
    }

    fn fields(&self) -> Vec<String> {
        vec!["index".to_string()]
    }

    fn scopes(&self) -> Vec<ScopeDef> {
        vec![
            ScopeDef::new("atIndex", |args| {
                let index = args.first().cloned().unwrap_or(Value::Null);
                Ok(Rc::new(move |q: &mut Query| {
                    q.and_where("@index = ?", &[index.clone()]);
                    Ok(())
                }))
            }),
            ScopeDef::new("orderByIndex", |args| {
                let dir = args
                    .first()
                    .and_then(Value::as_str)
                    .unwrap_or("ASC")
                    .to_string();
                Ok(Rc::new(move |q: &mut Query| {
                    q.order("@index", &dir)?;
                    Ok(())
                }))
            }),
        ]
    }

    fn fetchers(&self) -> Vec<FetcherDef> {
        vec![
            FetcherDef::new("getMaxIndex", |s, _args| {
                let mut query = s.query()?;
                query.alias("MAX(@index)", "@max_index")?;
                let row = query.first_assoc(&[])?;
                let max = row
                    .as_ref()
                    .and_then(|r| r.get("max_index"))
                    .and_then(value_as_i64)
                    .unwrap_or(-1);
                Ok(Fetched::Value(json!(max)))
            }),
            FetcherDef::new("getFirst", |s, args| {
                let assoc = args.first().and_then(Value::as_bool).unwrap_or(false);
                let mut query = s.query()?;
                query.and_where("@index = ?", &[json!(0)]);
                if assoc {
                    Ok(Fetched::Row(query.first_assoc(&[])?))
                } else {
                    Ok(Fetched::Record(query.first(&[])?))
                }
            }),
            FetcherDef::new("getLast", |s, args| {
                let assoc = args.first().and_then(Value::as_bool).unwrap_or(false);
                let mut query = s.query()?;
                query.order("@index", "DESC")?;
                if assoc {
                    Ok(Fetched::Row(query.first_assoc(&[])?))
                } else {
                    Ok(Fetched::Record(query.first(&[])?))
                }
            }),
        ]
    }

    fn methods(&self) -> Vec<&'static str> {
        vec!["move", "moveUp", "moveDown"]
    }

    fn call(&self, record: &SharedRecord, method: &str, args: &[Value]) -> OrmResult<Value> {
        let count = args.first().and_then(value_as_i64);
        match method {
            "move" => self.move_by(record, count.unwrap_or(0))?,
            "moveUp" => self.move_up(record, count.unwrap_or(1))?,
            "moveDown" => self.move_down(record, count.unwrap_or(1))?,
            _ => {
                return Err(ModelError::UnknownMethod(format!(
                    "Sequence does not implement '{}'",
                    method
                )))
            }
        }
        Ok(Value::Null)
    }

    fn handle(&self, event: ModelEvent, record: &SharedRecord) -> OrmResult<()> {
        match event {
            // new records are appended at the end of their group
            ModelEvent::BeforeInsert => {
                let next = self.max_index(record)? + 1;
                record.set("index", json!(next));
                Ok(())
            }
            ModelEvent::AfterDelete => {
                let index = self.index_of(record)?;
                let scope = self.group_scope(record, false);
                record
                    .select()?
                    .and_where("@index > ?", &[json!(index)])
                    .set("@index = @index - 1", &[])
                    .scope(|q| scope(q))?
                    .update(&[])?;
                Ok(())
            }
            ModelEvent::BeforeUpdate => {
                if !self.group_field_changed(record) {
                    return Ok(());
                }
                // compact the group the record is leaving, then append it
                // to the end of the new group
                let index = self.index_of(record)?;
                let old_scope = self.group_scope(record, true);
                record
                    .select()?
                    .and_where("@index > ?", &[json!(index)])
                    .set("@index = @index - 1", &[])
                    .scope(|q| old_scope(q))?
                    .update(&[])?;

                let next = self.max_index(record)? + 1;
                record.set("index", json!(next));
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Accept numbers and the numeric strings untyped drivers return.
fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
