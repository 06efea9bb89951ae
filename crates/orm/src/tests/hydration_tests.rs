//! Hydration tests: deduplication, relation wiring, outer-join NULLs

use serde_json::{json, Value};

use crate::model::RelationValue;
use crate::tests::support::{row, setup};

#[test]
fn join_hydrates_one_to_many_children() {
    let (connection, manager) = setup();
    connection.push_rows(vec![
        row(&[
            ("id", json!(1)),
            ("title", json!("A")),
            ("comments.id", json!(10)),
            ("comments.post_id", json!(1)),
            ("comments.body", json!("x")),
        ]),
        row(&[
            ("id", json!(1)),
            ("title", json!("A")),
            ("comments.id", json!(11)),
            ("comments.post_id", json!(1)),
            ("comments.body", json!("y")),
        ]),
        row(&[
            ("id", json!(2)),
            ("title", json!("B")),
            ("comments.id", Value::Null),
            ("comments.post_id", Value::Null),
            ("comments.body", Value::Null),
        ]),
    ]);

    let mut query = manager.select("Post").unwrap();
    query.with("@comments").unwrap();
    query.order("@id", "ASC").unwrap();
    query.order("@comments.id", "ASC").unwrap();
    let posts = query.all(&[]).unwrap();

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].get("id"), Some(json!(1)));
    assert_eq!(posts[0].get("title"), Some(json!("A")));
    assert!(!posts[0].is_new());

    match posts[0].relation("comments") {
        Some(RelationValue::Many(comments)) => {
            assert_eq!(comments.len(), 2);
            assert_eq!(comments[0].get("id"), Some(json!(10)));
            assert_eq!(comments[0].get("body"), Some(json!("x")));
            assert_eq!(comments[1].get("id"), Some(json!(11)));
        }
        other => panic!("expected many-relation, got {:?}", other),
    }

    // the absent outer-join side materializes no entity, the list stays
    match posts[1].relation("comments") {
        Some(RelationValue::Many(comments)) => assert!(comments.is_empty()),
        other => panic!("expected empty many-relation, got {:?}", other),
    }
}

#[test]
fn roots_deduplicate_by_primary_key_in_first_sighting_order() {
    let (connection, manager) = setup();
    connection.push_rows(vec![
        row(&[("id", json!(2)), ("name", json!("b"))]),
        row(&[("id", json!(1)), ("name", json!("a"))]),
        row(&[("id", json!(2)), ("name", json!("b"))]),
    ]);

    let mut query = manager.select("User").unwrap();
    let users = query.all(&[]).unwrap();

    assert_eq!(users.len(), 2);
    assert_eq!(users[0].get("id"), Some(json!(2)));
    assert_eq!(users[1].get("id"), Some(json!(1)));
}

#[test]
fn repeated_children_append_once_by_identity() {
    let (connection, manager) = setup();
    let child = [
        ("id", json!(1)),
        ("title", json!("A")),
        ("comments.id", json!(10)),
        ("comments.post_id", json!(1)),
        ("comments.body", json!("x")),
    ];
    connection.push_rows(vec![row(&child), row(&child)]);

    let mut query = manager.select("Post").unwrap();
    query.with("@comments").unwrap();
    let posts = query.all(&[]).unwrap();

    assert_eq!(posts.len(), 1);
    match posts[0].relation("comments") {
        Some(RelationValue::Many(comments)) => assert_eq!(comments.len(), 1),
        other => panic!("expected many-relation, got {:?}", other),
    }
}

#[test]
fn shared_entities_are_wired_by_identity_not_copy() {
    let (connection, manager) = setup();
    // two comments by the same author
    connection.push_rows(vec![
        row(&[
            ("id", json!(10)),
            ("post_id", json!(1)),
            ("author_id", json!(5)),
            ("body", json!("x")),
            ("author.id", json!(5)),
            ("author.name", json!("ann")),
        ]),
        row(&[
            ("id", json!(11)),
            ("post_id", json!(1)),
            ("author_id", json!(5)),
            ("body", json!("y")),
            ("author.id", json!(5)),
            ("author.name", json!("ann")),
        ]),
    ]);

    let mut query = manager.select("Comment").unwrap();
    query.with("@author").unwrap();
    let comments = query.all(&[]).unwrap();

    assert_eq!(comments.len(), 2);
    let author_a = match comments[0].relation("author") {
        Some(RelationValue::One(Some(author))) => author,
        other => panic!("expected to-one relation, got {:?}", other),
    };
    let author_b = match comments[1].relation("author") {
        Some(RelationValue::One(Some(author))) => author,
        other => panic!("expected to-one relation, got {:?}", other),
    };
    assert!(author_a.same_record(&author_b));
}

#[test]
fn null_to_one_side_stays_null() {
    let (connection, manager) = setup();
    connection.push_row(row(&[
        ("id", json!(10)),
        ("post_id", json!(1)),
        ("author_id", Value::Null),
        ("body", json!("x")),
        ("author.id", Value::Null),
        ("author.name", Value::Null),
    ]));

    let mut query = manager.select("Comment").unwrap();
    query.with("@author").unwrap();
    let comments = query.all(&[]).unwrap();

    match comments[0].relation("author") {
        Some(RelationValue::One(None)) => {}
        other => panic!("expected null to-one relation, got {:?}", other),
    }
}

#[test]
fn assoc_mode_returns_nested_maps_and_keeps_aliases() {
    let (connection, manager) = setup();
    connection.push_rows(vec![
        row(&[
            ("id", json!(1)),
            ("title", json!("A")),
            ("cn", json!(2)),
            ("comments.id", json!(10)),
            ("comments.post_id", json!(1)),
            ("comments.body", json!("x")),
        ]),
        row(&[
            ("id", json!(1)),
            ("title", json!("A")),
            ("cn", json!(2)),
            ("comments.id", json!(11)),
            ("comments.post_id", json!(1)),
            ("comments.body", json!("y")),
        ]),
    ]);

    let mut query = manager.select_assoc("Post").unwrap();
    query.alias("COUNT(@comments.id)", "@cn").unwrap();
    query.with("@comments").unwrap();
    let rows = query.all_assoc(&[]).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(1));
    // alias columns survive in associative output
    assert_eq!(rows[0]["cn"], json!(2));
    let comments = rows[0]["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["id"], json!(10));
    assert_eq!(comments[1]["body"], json!("y"));
}

#[test]
fn hydrated_records_are_loaded_and_manager_bound() {
    let (connection, manager) = setup();
    connection.push_row(row(&[("id", json!(1)), ("name", json!("a"))]));

    let mut query = manager.select("User").unwrap();
    let users = query.all(&[]).unwrap();

    assert!(!users[0].is_new());
    assert!(users[0].manager().is_some());
    // alias columns never leak into declared record fields
    assert_eq!(users[0].to_array().len(), 2);
}

#[test]
fn missing_joined_columns_do_not_fail_hydration() {
    let (connection, manager) = setup();
    // no comments.* columns at all, even though the join was declared
    connection.push_row(row(&[("id", json!(1)), ("title", json!("A"))]));

    let mut query = manager.select("Post").unwrap();
    query.with_on("@comments", "", false, &[]).unwrap();
    let posts = query.all(&[]).unwrap();

    assert_eq!(posts.len(), 1);
    assert!(posts[0].relation("comments").is_none());
}
