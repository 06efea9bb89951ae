//! Query Builder SQL rendering
//!
//! Renders the accumulated query state into one statement per mode. The
//! composed SQL still contains `@` path tokens at first; GROUP BY, HAVING
//! and ORDER BY fragments get the alias-eligible substitution as they are
//! appended, and a final pass qualifies everything else. DELETE mode
//! rewrites tokens to bare table identifiers instead, since the backend
//! disallows aliases in multi-table DELETE.

use crate::error::{OrmResult, QueryError};
use crate::query::builder::Query;
use crate::query::paths::{
    replace_alias_tokens, replace_delete_tokens, replace_qualified_tokens, split_relation_path,
    REL_START,
};
use crate::query::types::{QueryMode, MASTER_ALIAS};

impl Query {
    /// Render the query as SQL for the given mode.
    pub fn to_sql(&self, mode: QueryMode) -> OrmResult<String> {
        let model = self
            .model
            .clone()
            .ok_or(QueryError::RelationUnresolvable(String::new()))?;
        let root_table = self.manager.table_identifier(&model)?;

        let mut fields: Vec<String> = Vec::new();
        match mode {
            QueryMode::Select => fields.push(format!("`{}`.*", MASTER_ALIAS)),
            QueryMode::Delete => fields.push(root_table.clone()),
            QueryMode::Count | QueryMode::Update => {}
        }

        if mode == QueryMode::Select {
            for (alias_path, expression) in &self.aliases {
                fields.push(format!("{} AS `{}`", expression, alias_path));
            }
        }

        let from = if mode == QueryMode::Delete {
            root_table
        } else {
            format!("{} AS `{}`", root_table, MASTER_ALIAS)
        };

        let mut joins: Vec<String> = Vec::new();
        for with in &self.withs {
            let (local_path, relation_name) = split_relation_path(&with.path);
            let local = self
                .structure(local_path)
                .ok_or_else(|| QueryError::RelationUnresolvable(with.path.clone()))?;
            let foreign = self
                .structure(&with.path)
                .ok_or_else(|| QueryError::RelationUnresolvable(with.path.clone()))?;
            let relation = local
                .relation(relation_name)
                .ok_or_else(|| QueryError::RelationInvalid {
                    relation: relation_name.to_string(),
                    path: with.path.clone(),
                })?;
            let target_table = self.manager.table_identifier(&relation.target)?;

            if with.fetch {
                match mode {
                    QueryMode::Select => {
                        for field in &foreign.fields {
                            fields.push(format!(
                                "`{}`.`{}` AS `{}.{}`",
                                with.path, field, with.path, field
                            ));
                        }
                    }
                    QueryMode::Delete => fields.push(target_table.clone()),
                    QueryMode::Count | QueryMode::Update => {}
                }
            }

            let mut ons: Vec<String> = Vec::new();
            for (local_field, foreign_field) in &relation.join_pairs {
                if local_path.is_empty() {
                    ons.push(format!(
                        "{}{} = {}{}.{}",
                        REL_START, local_field, REL_START, with.path, foreign_field
                    ));
                } else {
                    ons.push(format!(
                        "{}{}.{} = {}{}.{}",
                        REL_START, local_path, local_field, REL_START, with.path, foreign_field
                    ));
                }
            }
            if !with.where_on.is_empty() {
                ons.push(with.where_on.clone());
            }

            if mode == QueryMode::Delete {
                joins.push(format!("LEFT JOIN {} ON {}", target_table, ons.join(" AND ")));
            } else {
                joins.push(format!(
                    "LEFT JOIN {} AS `{}` ON {}",
                    target_table,
                    with.path,
                    ons.join(" AND ")
                ));
            }
        }

        let mut sql = match mode {
            QueryMode::Select => {
                let options = if self.calc_found_rows.is_some() {
                    "SQL_CALC_FOUND_ROWS "
                } else {
                    ""
                };
                format!("SELECT {}{} FROM {}", options, fields.join(", "), from)
            }
            QueryMode::Count => format!("SELECT COUNT(*) FROM {}", from),
            QueryMode::Update => format!("UPDATE {}", from),
            QueryMode::Delete => format!("DELETE {} FROM {}", fields.join(", "), from),
        };

        if !joins.is_empty() {
            sql.push(' ');
            sql.push_str(&joins.join(" "));
        }

        if mode == QueryMode::Update {
            sql.push_str(" SET ");
            sql.push_str(&self.sets.join(","));
        }

        if !self.where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_sql);
        }

        if !self.group_bys.is_empty() && mode != QueryMode::Delete {
            sql.push_str(" GROUP BY ");
            sql.push_str(&replace_alias_tokens(&self.group_bys.join(", ")));
        }

        if !self.having_sql.is_empty() && mode != QueryMode::Delete {
            sql.push_str(" HAVING ");
            sql.push_str(&replace_alias_tokens(&self.having_sql));
        }

        // COUNT keeps grouping but drops ordering and limits; DELETE takes
        // only the WHERE tail.
        let with_order_tail = matches!(mode, QueryMode::Select | QueryMode::Update);

        if !self.orders.is_empty() && with_order_tail {
            sql.push_str(" ORDER BY ");
            sql.push_str(&replace_alias_tokens(&self.orders.join(", ")));
        }

        if !self.limit.is_empty() && with_order_tail {
            sql.push_str(" LIMIT ");
            sql.push_str(&self.limit);
        }

        // replace the remaining tokens, which cannot contain field aliases
        if mode == QueryMode::Delete {
            replace_delete_tokens(&sql, |local_path, _field| {
                let model = if local_path.is_empty() {
                    model.clone()
                } else {
                    let (parent_path, relation_name) = split_relation_path(local_path);
                    let parent = self
                        .structure(parent_path)
                        .ok_or_else(|| QueryError::RelationUnresolvable(local_path.to_string()))?;
                    parent
                        .relation(relation_name)
                        .ok_or_else(|| QueryError::RelationInvalid {
                            relation: relation_name.to_string(),
                            path: local_path.to_string(),
                        })?
                        .target
                        .clone()
                };
                self.manager.table_identifier(&model)
            })
        } else {
            Ok(replace_qualified_tokens(&sql))
        }
    }
}
