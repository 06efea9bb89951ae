//! Query builder tests: rendering, validation, parameter order

use serde_json::json;

use crate::error::{ModelError, QueryError};
use crate::query::MAX_ROWCOUNT;
use crate::tests::support::{row, setup};

#[test]
fn simple_select_renders_master_alias() {
    let (connection, manager) = setup();
    connection.push_empty();

    let mut query = manager.select("User").unwrap();
    query.and_where("@id = ?", &[json!(7)]);
    let result = query.first(&[]).unwrap();

    assert!(result.is_none());
    let executed = connection.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(
        executed[0].sql,
        "SELECT `_master_`.* FROM users AS `_master_` WHERE (`_master_`.`id` = ?) LIMIT 0, 1"
    );
    assert_eq!(executed[0].params, vec![json!(7)]);
}

#[test]
fn select_twice_is_unavailable() {
    let (_connection, manager) = setup();
    let mut query = manager.select("User").unwrap();
    let err = query.select("Post").unwrap_err();
    match err {
        ModelError::Query(QueryError::SelectUnavailable) => {}
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(QueryError::SelectUnavailable.code(), 4);
}

#[test]
fn with_unknown_parent_is_unresolvable() {
    let (_connection, manager) = setup();
    let mut query = manager.select("Post").unwrap();
    let err = query.with("@comments.author").unwrap_err();
    match err {
        ModelError::Query(QueryError::RelationUnresolvable(path)) => {
            assert_eq!(path, "comments.author");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn with_undeclared_relation_is_invalid() {
    let (_connection, manager) = setup();
    let mut query = manager.select("Post").unwrap();
    let err = query.with("@tags").unwrap_err();
    match err {
        ModelError::Query(QueryError::RelationInvalid { relation, .. }) => {
            assert_eq!(relation, "tags");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn with_resolves_nested_paths_in_order() {
    let (connection, manager) = setup();
    connection.push_empty();

    let mut query = manager.select("Post").unwrap();
    query.with("@comments").unwrap();
    query.with("@comments.author").unwrap();
    query.all(&[]).unwrap();

    let sql = &connection.executed_sql()[0];
    assert!(sql.contains(
        "LEFT JOIN comments AS `comments` ON `_master_`.`id` = `comments`.`post_id`"
    ));
    assert!(sql.contains(
        "LEFT JOIN users AS `comments.author` ON `comments`.`author_id` = `comments.author`.`id`"
    ));
    assert!(sql.contains("`comments.author`.`name` AS `comments.author.name`"));
}

#[test]
fn order_validates_fields_and_aliases() {
    let (_connection, manager) = setup();
    let mut query = manager.select("User").unwrap();

    let err = query.order("@nope", "ASC").unwrap_err();
    match err {
        ModelError::Query(QueryError::FieldInvalid { field, .. }) => assert_eq!(field, "nope"),
        other => panic!("unexpected error: {:?}", other),
    }

    // registered aliases are orderable
    query.alias("LENGTH(@name)", "@name_length").unwrap();
    query.order("@name_length", "DESC").unwrap();
}

#[test]
fn order_direction_normalizes_to_asc() {
    let (connection, manager) = setup();
    connection.push_empty();

    let mut query = manager.select("User").unwrap();
    query.order("@name", "desc").unwrap();
    query.order("@id", "sideways").unwrap();
    query.all(&[]).unwrap();

    let sql = &connection.executed_sql()[0];
    assert!(sql.contains("ORDER BY `name` DESC, `id` ASC"));
}

#[test]
fn alias_participates_in_group_and_having() {
    let (connection, manager) = setup();
    connection.push_empty();

    let mut query = manager.select("Post").unwrap();
    query.alias("COUNT(@comments.id)", "@cn").unwrap();
    query.with("@comments").unwrap();
    query.group_by("@id").unwrap();
    query.and_having("@cn > ?", &[json!(3)]);
    query.all(&[]).unwrap();

    let executed = connection.executed();
    let sql = &executed[0].sql;
    assert!(sql.contains("COUNT(`comments`.`id`) AS `cn`"));
    assert!(sql.contains("GROUP BY `id`"));
    // the having token takes the alias form, not the qualified form
    assert!(sql.contains("HAVING (`cn` > ?)"));
    assert!(!sql.contains("HAVING (`_master_`.`cn`"));
    assert_eq!(executed[0].params, vec![json!(3)]);
}

#[test]
fn multi_delete_uses_table_identifiers_without_aliases() {
    let (connection, manager) = setup();

    let mut query = manager.select("Post").unwrap();
    query.with("@comments").unwrap();
    query.and_where("@id = ?", &[json!(1)]);
    query.delete(&[]).unwrap();

    let executed = connection.executed();
    assert_eq!(
        executed[0].sql,
        "DELETE posts, comments FROM posts \
         LEFT JOIN comments ON posts.`id` = comments.`post_id` \
         WHERE (posts.`id` = ?)"
    );
    assert_eq!(executed[0].params, vec![json!(1)]);
}

#[test]
fn update_mode_renders_set_fragments() {
    let (connection, manager) = setup();

    let mut query = manager.select("Post").unwrap();
    query.set("@title = ?", &[json!("t")]);
    query.and_where("@id = ?", &[json!(5)]);
    query.update(&[]).unwrap();

    let executed = connection.executed();
    assert_eq!(
        executed[0].sql,
        "UPDATE posts AS `_master_` SET `_master_`.`title` = ? WHERE (`_master_`.`id` = ?)"
    );
    assert_eq!(executed[0].params, vec![json!("t"), json!(5)]);
}

#[test]
fn parameters_concatenate_in_clause_order() {
    let (connection, manager) = setup();

    let mut query = manager.select("Post").unwrap();
    query
        .with_on("@comments", "@comments.body = ?", true, &[json!("on")])
        .unwrap();
    query.set("@title = ?", &[json!("set")]);
    query.and_where("@id > ?", &[json!("where")]);
    query.and_having("@id < ?", &[json!("having")]);
    query.update(&[json!("call")]).unwrap();

    let executed = connection.executed();
    assert_eq!(
        executed[0].params,
        vec![
            json!("on"),
            json!("set"),
            json!("where"),
            json!("having"),
            json!("call"),
        ]
    );
}

#[test]
fn join_on_clause_appends_custom_condition() {
    let (connection, manager) = setup();
    connection.push_empty();

    let mut query = manager.select("Post").unwrap();
    query
        .with_on("@comments", "@comments.body != ?", true, &[json!("spam")])
        .unwrap();
    query.all(&[]).unwrap();

    let sql = &connection.executed_sql()[0];
    assert!(sql.contains(
        "ON `_master_`.`id` = `comments`.`post_id` AND `comments`.`body` != ?"
    ));
}

#[test]
fn fetch_false_joins_without_projecting() {
    let (connection, manager) = setup();
    connection.push_empty();

    let mut query = manager.select("Post").unwrap();
    query.with_on("@comments", "", false, &[]).unwrap();
    query.all(&[]).unwrap();

    let sql = &connection.executed_sql()[0];
    assert!(sql.starts_with("SELECT `_master_`.* FROM posts AS `_master_` LEFT JOIN comments"));
    assert!(!sql.contains("AS `comments.id`"));
}

#[test]
fn limit_renders_the_max_rowcount_sentinel() {
    let (connection, manager) = setup();
    connection.push_empty();

    let mut query = manager.select("User").unwrap();
    query.limit(3, -1);
    query.all(&[]).unwrap();
    let sql = &connection.executed_sql()[0];
    assert!(sql.ends_with(&format!("LIMIT 3, {}", MAX_ROWCOUNT)));
}

#[test]
fn limit_zero_offset_all_rows_drops_the_clause() {
    let (connection, manager) = setup();
    connection.push_empty();

    let mut query = manager.select("User").unwrap();
    query.limit(5, 10);
    query.limit(0, -1);
    query.all(&[]).unwrap();
    assert!(!connection.executed_sql()[0].contains("LIMIT"));
}

#[test]
fn first_short_circuits_limit_only_without_joins() {
    let (connection, manager) = setup();
    connection.push_empty();

    let mut query = manager.select("User").unwrap();
    query.first(&[]).unwrap();
    assert!(connection.executed_sql()[0].ends_with("LIMIT 0, 1"));

    connection.clear_log();
    connection.push_empty();

    // with a join the full result is needed for hydration
    let mut query = manager.select("Post").unwrap();
    query.with("@comments").unwrap();
    query.first(&[]).unwrap();
    assert!(!connection.executed_sql()[0].contains("LIMIT"));
}

#[test]
fn count_keeps_joins_and_filters_drops_order_and_limit() {
    let (connection, manager) = setup();
    connection.push_row(row(&[("COUNT(*)", json!(12))]));

    let mut query = manager.select("Post").unwrap();
    query.with("@comments").unwrap();
    query.and_where("@title != ?", &[json!("x")]);
    query.order("@id", "DESC").unwrap();
    query.limit(0, 5);
    let count = query.count(&[]).unwrap();

    assert_eq!(count, 12);
    let sql = &connection.executed_sql()[0];
    assert!(sql.starts_with("SELECT COUNT(*) FROM posts AS `_master_` LEFT JOIN comments"));
    assert!(!sql.contains("ORDER BY"));
    assert!(!sql.contains("LIMIT"));
}

#[test]
fn count_accepts_stringly_typed_totals() {
    let (connection, manager) = setup();
    connection.push_row(row(&[("COUNT(*)", json!("3"))]));

    let mut query = manager.select("User").unwrap();
    assert_eq!(query.count(&[]).unwrap(), 3);
}

#[test]
fn calc_found_rows_runs_the_side_query() {
    let (connection, manager) = setup();
    connection.push_empty();
    connection.push_row(row(&[("FOUND_ROWS()", json!(42))]));

    let mut query = manager.select("User").unwrap();
    query.calc_found_rows("total");
    query.limit(0, 10);
    query.all(&[]).unwrap();

    let sql = connection.executed_sql();
    assert!(sql[0].starts_with("SELECT SQL_CALC_FOUND_ROWS `_master_`.*"));
    assert_eq!(sql[1], "SELECT FOUND_ROWS()");
    assert_eq!(query.found_rows(), Some(42));
}

#[test]
fn unkeyed_calc_leaves_the_side_query_to_the_caller() {
    let (connection, manager) = setup();
    connection.push_empty();

    let mut query = manager.select("User").unwrap();
    query.calc_found_rows_unkeyed();
    query.all(&[]).unwrap();

    let sql = connection.executed_sql();
    assert_eq!(sql.len(), 1);
    assert!(sql[0].starts_with("SELECT SQL_CALC_FOUND_ROWS"));
    assert_eq!(query.found_rows(), None);

    connection.push_row(row(&[("FOUND_ROWS()", json!(9))]));
    assert_eq!(query.select_found_rows().unwrap(), 9);
}

#[test]
fn keyed_total_is_attached_to_first_assoc() {
    let (connection, manager) = setup();
    connection.push_row(row(&[("id", json!(1)), ("name", json!("a"))]));
    connection.push_row(row(&[("FOUND_ROWS()", json!(31))]));

    let mut query = manager.select_assoc("User").unwrap();
    query.calc_found_rows("total");
    let result = query.first_assoc(&[]).unwrap().unwrap();
    assert_eq!(result["total"], json!(31));
    assert_eq!(result["id"], json!(1));
}

#[test]
fn scope_applies_mutators_composably() {
    let (connection, manager) = setup();
    connection.push_empty();

    let mut query = manager.select("User").unwrap();
    query
        .scope(|q| {
            q.and_where("@name = ?", &[json!("n")]);
            q.order("@id", "DESC")?;
            Ok(())
        })
        .unwrap();
    query.all(&[]).unwrap();

    let sql = &connection.executed_sql()[0];
    assert!(sql.contains("WHERE (`_master_`.`name` = ?)"));
    assert!(sql.contains("ORDER BY `id` DESC"));
}
