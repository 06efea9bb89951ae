//! Query Builder Types - Core types for query state

/// SQL alias assigned to the root model's row set.
pub const MASTER_ALIAS: &str = "_master_";

/// MySQL's "all remaining rows" sentinel for LIMIT with an offset.
pub const MAX_ROWCOUNT: &str = "18446744073709551615";

/// Render modes of one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Select,
    Count,
    Update,
    Delete,
}

/// Default result shape of `fetch` / `fetch_first`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// Nested associative maps.
    Assoc,
    /// Manager-bound records linked by their relations.
    Record,
}

/// Where the post-query found-rows total goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoundRowsKey {
    /// Calculate and surface the total under this key.
    Keyed(String),
    /// Calculate only; the caller reads the total itself.
    Uncaptured,
}

/// One `with` join along a relation path.
#[derive(Debug, Clone)]
pub struct WithJoin {
    /// Relation path, prefix stripped.
    pub path: String,
    /// Extra condition appended to the join's ON clause.
    pub where_on: String,
    /// Whether the joined columns are projected and hydrated.
    pub fetch: bool,
}

/// Bound parameters partitioned by clause, concatenated in a fixed order at
/// execution: with, set, where, having, then per-call parameters.
#[derive(Debug, Clone, Default)]
pub struct ParamBuckets {
    pub with: Vec<serde_json::Value>,
    pub set: Vec<serde_json::Value>,
    pub where_: Vec<serde_json::Value>,
    pub having: Vec<serde_json::Value>,
}
