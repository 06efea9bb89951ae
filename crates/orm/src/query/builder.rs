//! Query Builder - Fluent mutators and per-query state
//!
//! A query is a mutable, single-use builder. Mutators return the builder
//! for chaining; the ones that validate relation paths return a result and
//! fail fast at builder time, not at execute time. Reusing a query after an
//! executor ran is not supported.
//!
//! User expressions are emitted into the SQL verbatim apart from `@` path
//! substitution. Bound parameters are the only sanitized input channel:
//! never interpolate caller-provided values into expression strings.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::Value;

use crate::backends::Connection;
use crate::error::{OrmResult, QueryError};
use crate::manager::Manager;
use crate::model::descriptor::ModelDescriptor;
use crate::query::paths::{split_relation_path, strip_rel_start};
use crate::query::types::{FoundRowsKey, ParamBuckets, ResultShape, WithJoin, MAX_ROWCOUNT};

/// Relation-aware query builder over one primary model.
pub struct Query {
    pub(crate) connection: Rc<dyn Connection>,
    pub(crate) manager: Rc<Manager>,
    pub(crate) shape: ResultShape,
    pub(crate) model: Option<String>,
    /// `(alias_path, expression)` pairs, prefix stripped, insertion order.
    pub(crate) aliases: Vec<(String, String)>,
    /// Joined relation paths, in declaration order.
    pub(crate) withs: Vec<WithJoin>,
    pub(crate) where_sql: String,
    pub(crate) having_sql: String,
    /// Group-by tokens exactly as given.
    pub(crate) group_bys: Vec<String>,
    /// Order elements, token plus normalized direction.
    pub(crate) orders: Vec<String>,
    /// Assignment fragments for UPDATE mode.
    pub(crate) sets: Vec<String>,
    /// Rendered limit tail, empty for no LIMIT clause.
    pub(crate) limit: String,
    /// Descriptor per introduced path, `""` first, insertion order.
    pub(crate) structures: Vec<(String, Rc<ModelDescriptor>)>,
    pub(crate) calc_found_rows: Option<FoundRowsKey>,
    pub(crate) params: ParamBuckets,
    pub(crate) found_rows: Cell<Option<i64>>,
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("model", &self.model)
            .field("aliases", &self.aliases)
            .field("where_sql", &self.where_sql)
            .field("having_sql", &self.having_sql)
            .field("group_bys", &self.group_bys)
            .field("orders", &self.orders)
            .field("sets", &self.sets)
            .field("limit", &self.limit)
            .field("found_rows", &self.found_rows)
            .finish_non_exhaustive()
    }
}

impl Query {
    pub(crate) fn new(
        connection: Rc<dyn Connection>,
        manager: Rc<Manager>,
        shape: ResultShape,
    ) -> Self {
        Self {
            connection,
            manager,
            shape,
            model: None,
            aliases: Vec::new(),
            withs: Vec::new(),
            where_sql: String::new(),
            having_sql: String::new(),
            group_bys: Vec::new(),
            orders: Vec::new(),
            sets: Vec::new(),
            limit: String::new(),
            structures: Vec::new(),
            calc_found_rows: None,
            params: ParamBuckets::default(),
            found_rows: Cell::new(None),
        }
    }

    /// Set the primary model to select. Fails when already set.
    pub fn select(&mut self, model: &str) -> OrmResult<&mut Self> {
        if self.model.is_some() {
            return Err(QueryError::SelectUnavailable.into());
        }
        let descriptor = self.manager.descriptor(model)?;
        self.model = Some(descriptor.name.clone());
        // the empty relation path denotes the primary model itself
        self.structures.push((String::new(), descriptor));
        Ok(self)
    }

    /// Calculate the found-rows total and surface it under `key`.
    pub fn calc_found_rows(&mut self, key: &str) -> &mut Self {
        let key = strip_rel_start(key);
        self.calc_found_rows = Some(FoundRowsKey::Keyed(key.to_string()));
        self
    }

    /// Calculate the found-rows total without attaching it; read it back
    /// with [`Query::select_found_rows`].
    pub fn calc_found_rows_unkeyed(&mut self) -> &mut Self {
        self.calc_found_rows = Some(FoundRowsKey::Uncaptured);
        self
    }

    /// Register an SQL expression under a dotted alias path. The local part
    /// of the path must name an introduced path.
    pub fn alias(&mut self, expression: &str, alias_path: &str) -> OrmResult<&mut Self> {
        let stripped = strip_rel_start(alias_path);
        let (local_path, _) = split_relation_path(stripped);
        if self.structure(local_path).is_none() {
            return Err(QueryError::RelationUnresolvable(alias_path.to_string()).into());
        }

        if let Some(entry) = self.aliases.iter_mut().find(|(a, _)| a == stripped) {
            entry.1 = expression.to_string();
        } else {
            self.aliases
                .push((stripped.to_string(), expression.to_string()));
        }
        Ok(self)
    }

    /// Declare a LEFT JOIN along a relation path, projecting its columns.
    pub fn with(&mut self, relation_path: &str) -> OrmResult<&mut Self> {
        self.with_on(relation_path, "", true, &[])
    }

    /// Declare a LEFT JOIN along a relation path. `where_on` is appended to
    /// the join's ON clause; `fetch = false` joins for filtering only, the
    /// columns are neither projected nor hydrated.
    pub fn with_on(
        &mut self,
        relation_path: &str,
        where_on: &str,
        fetch: bool,
        params: &[Value],
    ) -> OrmResult<&mut Self> {
        let path = strip_rel_start(relation_path).to_string();
        let (local_path, relation_name) = split_relation_path(&path);

        let local = match self.structure(local_path) {
            Some(descriptor) => descriptor,
            None => return Err(QueryError::RelationUnresolvable(path.clone()).into()),
        };
        let relation = match local.relation(relation_name) {
            Some(relation) => relation.clone(),
            None => {
                return Err(QueryError::RelationInvalid {
                    relation: relation_name.to_string(),
                    path: path.clone(),
                }
                .into())
            }
        };

        let target = self.manager.descriptor(&relation.target)?;
        for (local_field, foreign_field) in &relation.join_pairs {
            if !local.has_field(local_field) {
                return Err(QueryError::FieldInvalid {
                    field: local_field.clone(),
                    path: local_path.to_string(),
                }
                .into());
            }
            if !target.has_field(foreign_field) {
                return Err(QueryError::FieldInvalid {
                    field: foreign_field.clone(),
                    path: path.clone(),
                }
                .into());
            }
        }

        let join = WithJoin {
            path: path.clone(),
            where_on: where_on.to_string(),
            fetch,
        };
        if let Some(existing) = self.withs.iter_mut().find(|w| w.path == path) {
            *existing = join;
        } else {
            self.withs.push(join);
        }
        if self.structure(&path).is_none() {
            self.structures.push((path, target));
        }
        self.params.with.extend(params.iter().cloned());
        Ok(self)
    }

    /// Append `AND (expr)` to the WHERE clause.
    pub fn and_where(&mut self, expr: &str, params: &[Value]) -> &mut Self {
        if self.where_sql.is_empty() {
            self.where_sql = format!("({})", expr);
        } else {
            self.where_sql.push_str(&format!(" AND ({})", expr));
        }
        self.params.where_.extend(params.iter().cloned());
        self
    }

    /// Append `AND (expr)` to the HAVING clause.
    pub fn and_having(&mut self, expr: &str, params: &[Value]) -> &mut Self {
        if self.having_sql.is_empty() {
            self.having_sql = format!("({})", expr);
        } else {
            self.having_sql.push_str(&format!(" AND ({})", expr));
        }
        self.params.having.extend(params.iter().cloned());
        self
    }

    /// Add a field path to group by. The field must exist on the path's
    /// descriptor or match a registered alias path.
    pub fn group_by(&mut self, field_path: &str) -> OrmResult<&mut Self> {
        self.validate_field_path(field_path)?;
        self.group_bys.push(field_path.to_string());
        Ok(self)
    }

    /// Add an element to the order clause. Direction normalizes
    /// case-insensitively to ASC/DESC; anything unknown becomes ASC.
    pub fn order(&mut self, field_path: &str, direction: &str) -> OrmResult<&mut Self> {
        self.validate_field_path(field_path)?;
        let direction = if direction.eq_ignore_ascii_case("desc") {
            "DESC"
        } else {
            "ASC"
        };
        self.orders.push(format!("{} {}", field_path, direction));
        Ok(self)
    }

    /// Accumulate an assignment fragment for UPDATE mode.
    pub fn set(&mut self, expr: &str, params: &[Value]) -> &mut Self {
        self.sets.push(expr.to_string());
        self.params.set.extend(params.iter().cloned());
        self
    }

    /// Set the limit clause. `count = -1` means all remaining rows;
    /// `(0, -1)` removes the clause entirely.
    pub fn limit(&mut self, offset: i64, count: i64) -> &mut Self {
        if count == -1 && offset == 0 {
            self.limit.clear();
        } else if count == -1 {
            self.limit = format!("{}, {}", offset, MAX_ROWCOUNT);
        } else {
            self.limit = format!("{}, {}", offset, count);
        }
        self
    }

    /// Apply a scope: a reusable group of mutators.
    pub fn scope<F>(&mut self, scope: F) -> OrmResult<&mut Self>
    where
        F: FnOnce(&mut Query) -> OrmResult<()>,
    {
        scope(self)?;
        Ok(self)
    }

    /// Short name of the selected primary model.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// The manager this query resolves descriptors through.
    pub fn manager(&self) -> &Rc<Manager> {
        &self.manager
    }

    pub(crate) fn structure(&self, path: &str) -> Option<Rc<ModelDescriptor>> {
        self.structures
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, d)| d.clone())
    }

    pub(crate) fn has_alias(&self, stripped_path: &str) -> bool {
        self.aliases.iter().any(|(a, _)| a == stripped_path)
    }

    fn validate_field_path(&self, field_path: &str) -> OrmResult<()> {
        let stripped = strip_rel_start(field_path);
        let (local_path, field_name) = split_relation_path(stripped);
        let local = match self.structure(local_path) {
            Some(descriptor) => descriptor,
            None => return Err(QueryError::RelationUnresolvable(field_path.to_string()).into()),
        };
        if !local.has_field(field_name) && !self.has_alias(stripped) {
            return Err(QueryError::FieldInvalid {
                field: field_name.to_string(),
                path: local_path.to_string(),
            }
            .into());
        }
        Ok(())
    }
}
