//! Query Builder executors
//!
//! Executors render the query, bind the accumulated parameters in clause
//! order (with, set, where, having, then per-call parameters), run the
//! statement and shape the result. Per-call parameters are merged last so
//! callers can append overrides at execution time.

use serde_json::Value;
use tracing::debug;

use crate::backends::SqlRow;
use crate::error::OrmResult;
use crate::hydration::Hydrator;
use crate::model::record::SharedRecord;
use crate::query::builder::Query;
use crate::query::types::{FoundRowsKey, QueryMode, ResultShape};
use crate::static_model::Fetched;

impl Query {
    /// All bound parameters in placeholder order.
    pub(crate) fn build_params(&self, call_params: &[Value]) -> Vec<Value> {
        let mut params = Vec::with_capacity(
            self.params.with.len()
                + self.params.set.len()
                + self.params.where_.len()
                + self.params.having.len()
                + call_params.len(),
        );
        params.extend(self.params.with.iter().cloned());
        params.extend(self.params.set.iter().cloned());
        params.extend(self.params.where_.iter().cloned());
        params.extend(self.params.having.iter().cloned());
        params.extend(call_params.iter().cloned());
        params
    }

    fn fetch_rows(&self, call_params: &[Value]) -> OrmResult<Vec<SqlRow>> {
        let sql = self.to_sql(QueryMode::Select)?;
        debug!(sql = %sql, "executing select");
        let mut statement = self.connection.prepare(&sql)?;
        statement.execute(&self.build_params(call_params))?;
        let rows = statement.fetch_all()?;
        statement.close_cursor();
        Ok(rows)
    }

    fn hydrator(&self) -> Hydrator<'_> {
        let manager = match self.shape {
            ResultShape::Record => Some(self.manager.clone()),
            ResultShape::Assoc => None,
        };
        Hydrator::new(&self.structures, manager)
    }

    /// Run the found-rows side query when a keyed calculation is active.
    fn capture_found_rows(&self) -> OrmResult<()> {
        if matches!(self.calc_found_rows, Some(FoundRowsKey::Keyed(_))) {
            let total = self.select_found_rows()?;
            self.found_rows.set(Some(total));
        }
        Ok(())
    }

    /// Execute and return all results as manager-bound records.
    pub fn all(&mut self, params: &[Value]) -> OrmResult<Vec<SharedRecord>> {
        let rows = self.fetch_rows(params)?;
        let result = self.hydrator().hydrate_records(&rows)?;
        self.capture_found_rows()?;
        Ok(result)
    }

    /// Execute and return all results as nested associative maps.
    pub fn all_assoc(&mut self, params: &[Value]) -> OrmResult<Vec<Value>> {
        let rows = self.fetch_rows(params)?;
        let result = self.hydrator().hydrate_assoc(&rows)?;
        self.capture_found_rows()?;
        Ok(result)
    }

    /// Execute and return the first result as a record.
    ///
    /// Without any `with` join this short-circuits to `LIMIT 0, 1`; with
    /// joins the full result must be fetched, as one-to-many hydration
    /// would otherwise be truncated.
    pub fn first(&mut self, params: &[Value]) -> OrmResult<Option<SharedRecord>> {
        if self.withs.is_empty() {
            self.limit(0, 1);
        }
        let rows = self.fetch_rows(params)?;
        let mut result = self.hydrator().hydrate_records(&rows)?;
        if result.is_empty() {
            return Ok(None);
        }
        self.capture_found_rows()?;
        Ok(Some(result.remove(0)))
    }

    /// Execute and return the first result as a nested associative map.
    /// A keyed found-rows total is attached to the returned map.
    pub fn first_assoc(&mut self, params: &[Value]) -> OrmResult<Option<Value>> {
        if self.withs.is_empty() {
            self.limit(0, 1);
        }
        let rows = self.fetch_rows(params)?;
        let mut result = self.hydrator().hydrate_assoc(&rows)?;
        if result.is_empty() {
            return Ok(None);
        }
        self.capture_found_rows()?;
        let mut row = result.remove(0);
        if let (Some(FoundRowsKey::Keyed(key)), Some(total)) =
            (&self.calc_found_rows, self.found_rows.get())
        {
            if let Value::Object(map) = &mut row {
                map.insert(key.clone(), Value::from(total));
            }
        }
        Ok(Some(row))
    }

    /// Execute in the query's default result shape.
    pub fn fetch(&mut self, params: &[Value]) -> OrmResult<Fetched> {
        match self.shape {
            ResultShape::Record => Ok(Fetched::Records(self.all(params)?)),
            ResultShape::Assoc => Ok(Fetched::Rows(self.all_assoc(params)?)),
        }
    }

    /// Execute and return the first result in the default shape.
    pub fn fetch_first(&mut self, params: &[Value]) -> OrmResult<Fetched> {
        match self.shape {
            ResultShape::Record => Ok(Fetched::Record(self.first(params)?)),
            ResultShape::Assoc => Ok(Fetched::Row(self.first_assoc(params)?)),
        }
    }

    /// Count the selected records, keeping joins, filters and grouping but
    /// dropping projections, ordering and limits.
    pub fn count(&mut self, params: &[Value]) -> OrmResult<i64> {
        let sql = self.to_sql(QueryMode::Count)?;
        debug!(sql = %sql, "executing count");
        let mut statement = self.connection.prepare(&sql)?;
        statement.execute(&self.build_params(params))?;
        let row = statement.fetch()?;
        statement.close_cursor();
        Ok(row
            .and_then(|r| r.get_index(0).and_then(scalar_i64))
            .unwrap_or(0))
    }

    /// Execute the accumulated SET assignments as an UPDATE.
    pub fn update(&mut self, params: &[Value]) -> OrmResult<bool> {
        let sql = self.to_sql(QueryMode::Update)?;
        debug!(sql = %sql, "executing update");
        let mut statement = self.connection.prepare(&sql)?;
        statement.execute(&self.build_params(params))
    }

    /// Delete the selected records. The delete target list enumerates table
    /// identifiers, never aliases; the same physical table cannot appear
    /// twice in a delete-mode query.
    pub fn delete(&mut self, params: &[Value]) -> OrmResult<bool> {
        let sql = self.to_sql(QueryMode::Delete)?;
        debug!(sql = %sql, "executing delete");
        let mut statement = self.connection.prepare(&sql)?;
        statement.execute(&self.build_params(params))
    }

    /// Read the found-rows total of the last calc-enabled query.
    pub fn select_found_rows(&self) -> OrmResult<i64> {
        let mut statement = self.connection.query("SELECT FOUND_ROWS()")?;
        let row = statement.fetch()?;
        statement.close_cursor();
        Ok(row
            .and_then(|r| r.get_index(0).and_then(scalar_i64))
            .unwrap_or(0))
    }

    /// The captured found-rows total, when a keyed calculation ran.
    pub fn found_rows(&self) -> Option<i64> {
        self.found_rows.get()
    }
}

/// Drivers may return counts as numbers or as untyped text.
fn scalar_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
