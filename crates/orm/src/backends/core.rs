//! Core Connection Traits
//!
//! Defines the boundary between the ORM core and the SQL transport. The
//! contract is deliberately small: prepared statements with positional `?`
//! placeholders, direct execution for literal SQL, NULL-aware quoting, and
//! the driver-reported error code with `"00000"` meaning success.
//!
//! The assumed grammar is MySQL-family: `LEFT JOIN` with aliases in
//! SELECT/UPDATE, multi-table DELETE without aliases, `SQL_CALC_FOUND_ROWS`
//! with `SELECT FOUND_ROWS()`, and the `18446744073709551615` row sentinel.

use serde_json::Value;

use crate::error::{ModelError, OrmResult};

/// Error code reported by a connection when the last operation succeeded.
pub const SUCCESS_CODE: &str = "00000";

/// Errors raised at the connection boundary
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Failed to prepare statement: {0}")]
    PrepareFailed(String),

    #[error("Failed to execute statement: {0}")]
    ExecuteFailed(String),

    #[error("Result cursor exhausted or closed")]
    CursorClosed,

    #[error("Connection is closed")]
    Closed,
}

impl From<ConnectionError> for ModelError {
    fn from(err: ConnectionError) -> Self {
        ModelError::Connection(err.to_string())
    }
}

/// A blocking SQL connection.
///
/// Implementations are single-threaded by assumption; the core wraps them in
/// `Rc` and never shares them across threads.
pub trait Connection {
    /// Prepare a statement with `?` placeholders for later execution.
    fn prepare(&self, sql: &str) -> OrmResult<Box<dyn Statement>>;

    /// Execute a parameterless statement and return an executed cursor.
    fn query(&self, sql: &str) -> OrmResult<Box<dyn Statement>>;

    /// Execute literal SQL and return the affected row count.
    fn exec(&self, sql: &str) -> OrmResult<u64>;

    /// Quote a value as a SQL literal. NULL-aware: `Value::Null` becomes
    /// the literal `NULL`, never a quoted string.
    fn quote(&self, value: &Value) -> String;

    /// The auto-increment id generated by the last INSERT.
    fn last_insert_id(&self) -> i64;

    /// The driver error code for the last operation, [`SUCCESS_CODE`] on
    /// success.
    fn error_code(&self) -> String;
}

/// A prepared or executed statement.
pub trait Statement {
    /// Bind positional parameters and execute. Returns whether the driver
    /// accepted the statement.
    fn execute(&mut self, params: &[Value]) -> OrmResult<bool>;

    /// Fetch all remaining rows.
    fn fetch_all(&mut self) -> OrmResult<Vec<SqlRow>>;

    /// Fetch the next row, if any.
    fn fetch(&mut self) -> OrmResult<Option<SqlRow>>;

    /// Rows affected by the last execution.
    fn row_count(&self) -> u64;

    /// Release the cursor. Statements may be dropped without calling this.
    fn close_cursor(&mut self) {}
}

/// One result row: column names plus values, addressable by name or index.
#[derive(Debug, Clone, Default)]
pub struct SqlRow {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl SqlRow {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Build a row from (column, value) pairs, keeping their order.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let (columns, values) = pairs.into_iter().unzip();
        Self { columns, values }
    }

    /// Get a column value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| &self.values[i])
    }

    /// Get a column value by position.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Iterate (column, value) pairs in result order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}
