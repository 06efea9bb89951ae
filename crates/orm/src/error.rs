//! Error types for the ORM core
//!
//! Provides typed failures for descriptor configuration, query building and
//! record lifecycle operations. Every kind exposes a stable integer code so
//! callers can branch programmatically without matching on message text.

use std::fmt;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for descriptor, manager and record operations
#[derive(Debug, Clone)]
pub enum ModelError {
    /// Descriptor not registered with the manager
    UnassociatedModel(String),
    /// Descriptor declares no fields
    NoFields(String),
    /// Descriptor declares no primary key, or the key is malformed
    NoPrimaryKey(String),
    /// Save/delete on a record not bound to a manager
    NoManager,
    /// Non-lazy get found no row; swallowed by `get` and surfaced as `None`
    DataUnavailable(String),
    /// Dynamic dispatch found no scope, fetcher, static or plugin method
    UnknownMethod(String),
    /// A plugin refused the requested operation
    Plugin(String),
    /// Backend connection or statement error
    Connection(String),
    /// Serialization/deserialization error
    Serialization(String),
    /// Query building error
    Query(QueryError),
}

impl ModelError {
    /// Stable discriminant for programmatic branching.
    pub fn code(&self) -> u32 {
        match self {
            ModelError::UnassociatedModel(_) => 1,
            ModelError::NoFields(_) => 2,
            ModelError::NoPrimaryKey(_) => 3,
            ModelError::NoManager => 4,
            ModelError::DataUnavailable(_) => 5,
            ModelError::UnknownMethod(_) => 6,
            ModelError::Plugin(_) => 7,
            ModelError::Connection(_) => 8,
            ModelError::Serialization(_) => 9,
            ModelError::Query(_) => 10,
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnassociatedModel(name) => {
                write!(f, "Model '{}' is not associated", name)
            }
            ModelError::NoFields(name) => write!(f, "Model '{}' has no fields defined", name),
            ModelError::NoPrimaryKey(msg) => write!(f, "Invalid primary key: {}", msg),
            ModelError::NoManager => write!(f, "No manager is associated with this record"),
            ModelError::DataUnavailable(table) => {
                write!(f, "Data for the record not available in '{}'", table)
            }
            ModelError::UnknownMethod(name) => {
                write!(f, "No method '{}' exists on the model or its plugins", name)
            }
            ModelError::Plugin(msg) => write!(f, "Plugin error: {}", msg),
            ModelError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ModelError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ModelError::Query(err) => write!(f, "Query error: {}", err),
        }
    }
}

impl std::error::Error for ModelError {}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

// Convert from anyhow errors
impl From<anyhow::Error> for ModelError {
    fn from(err: anyhow::Error) -> Self {
        ModelError::Connection(err.to_string())
    }
}

/// Error types for query builder operations
///
/// These surface at builder time, not at execute time: a query that cannot be
/// rendered legally fails on the mutator that introduced the problem.
#[derive(Debug, Clone)]
pub enum QueryError {
    /// Relation path references a parent path that was never introduced
    RelationUnresolvable(String),
    /// Tail segment of the path is not declared on the parent descriptor
    RelationInvalid { relation: String, path: String },
    /// Group/order references a field unknown to the path's descriptor
    FieldInvalid { field: String, path: String },
    /// `select` called twice on one query
    SelectUnavailable,
}

impl QueryError {
    /// Stable discriminant for programmatic branching.
    pub fn code(&self) -> u32 {
        match self {
            QueryError::RelationUnresolvable(_) => 1,
            QueryError::RelationInvalid { .. } => 2,
            QueryError::FieldInvalid { .. } => 3,
            QueryError::SelectUnavailable => 4,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::RelationUnresolvable(path) => {
                write!(f, "Could not resolve relation path '{}'", path)
            }
            QueryError::RelationInvalid { relation, path } => {
                write!(f, "Relation '{}' is invalid in '{}'", relation, path)
            }
            QueryError::FieldInvalid { field, path } => {
                write!(f, "Field '{}' is invalid in '{}'", field, path)
            }
            QueryError::SelectUnavailable => write!(f, "Primary model already set"),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<QueryError> for ModelError {
    fn from(err: QueryError) -> Self {
        ModelError::Query(err)
    }
}
