//! Shared test support: scripted mock connection and fixture models

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::Value;

use crate::backends::{Connection, SqlRow, Statement, SUCCESS_CODE};
use crate::error::OrmResult;
use crate::manager::Manager;
use crate::model::{Model, Relation};
use crate::plugins::{ModelPlugin, NestedSet, Sequence, Timestamps};

/// One statement as seen by the mock connection.
#[derive(Debug, Clone)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Default)]
struct MockState {
    executed: Vec<ExecutedStatement>,
    results: VecDeque<Vec<SqlRow>>,
    last_insert_id: i64,
    error_code: Option<String>,
    exec_row_count: u64,
}

/// Scripted connection: queue result sets with `push_rows`, inspect the
/// statement log with `executed_sql` / `executed`.
#[derive(Clone, Default)]
pub struct MockConnection {
    state: Rc<RefCell<MockState>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result set for the next statement that fetches.
    pub fn push_rows(&self, rows: Vec<SqlRow>) {
        self.state.borrow_mut().results.push_back(rows);
    }

    pub fn push_row(&self, row: SqlRow) {
        self.push_rows(vec![row]);
    }

    pub fn push_empty(&self) {
        self.push_rows(Vec::new());
    }

    pub fn set_last_insert_id(&self, id: i64) {
        self.state.borrow_mut().last_insert_id = id;
    }

    pub fn set_error_code(&self, code: &str) {
        self.state.borrow_mut().error_code = Some(code.to_string());
    }

    pub fn set_exec_row_count(&self, count: u64) {
        self.state.borrow_mut().exec_row_count = count;
    }

    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.state.borrow().executed.clone()
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.state
            .borrow()
            .executed
            .iter()
            .map(|s| s.sql.clone())
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.borrow_mut().executed.clear();
    }

    fn log(&self, sql: &str, params: Vec<Value>) {
        self.state.borrow_mut().executed.push(ExecutedStatement {
            sql: sql.to_string(),
            params,
        });
    }

    fn pop_results(&self) -> Vec<SqlRow> {
        self.state
            .borrow_mut()
            .results
            .pop_front()
            .unwrap_or_default()
    }
}

struct MockStatement {
    connection: MockConnection,
    sql: String,
    rows: Vec<SqlRow>,
    cursor: usize,
}

impl Statement for MockStatement {
    fn execute(&mut self, params: &[Value]) -> OrmResult<bool> {
        self.connection.log(&self.sql, params.to_vec());
        // only fetching statements consume a scripted result set
        if self.sql.trim_start().to_uppercase().starts_with("SELECT") {
            self.rows = self.connection.pop_results();
        }
        self.cursor = 0;
        Ok(true)
    }

    fn fetch_all(&mut self) -> OrmResult<Vec<SqlRow>> {
        let rows = self.rows.split_off(self.cursor);
        self.cursor = 0;
        self.rows.clear();
        Ok(rows)
    }

    fn fetch(&mut self) -> OrmResult<Option<SqlRow>> {
        if self.cursor < self.rows.len() {
            let row = self.rows[self.cursor].clone();
            self.cursor += 1;
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    fn row_count(&self) -> u64 {
        self.rows.len() as u64
    }
}

impl Connection for MockConnection {
    fn prepare(&self, sql: &str) -> OrmResult<Box<dyn Statement>> {
        Ok(Box::new(MockStatement {
            connection: self.clone(),
            sql: sql.to_string(),
            rows: Vec::new(),
            cursor: 0,
        }))
    }

    fn query(&self, sql: &str) -> OrmResult<Box<dyn Statement>> {
        self.log(sql, Vec::new());
        Ok(Box::new(MockStatement {
            connection: self.clone(),
            sql: sql.to_string(),
            rows: self.pop_results(),
            cursor: 0,
        }))
    }

    fn exec(&self, sql: &str) -> OrmResult<u64> {
        self.log(sql, Vec::new());
        Ok(self.state.borrow().exec_row_count)
    }

    fn quote(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => "0".to_string(),
            other => other.to_string(),
        }
    }

    fn last_insert_id(&self) -> i64 {
        self.state.borrow().last_insert_id
    }

    fn error_code(&self) -> String {
        self.state
            .borrow()
            .error_code
            .clone()
            .unwrap_or_else(|| SUCCESS_CODE.to_string())
    }
}

/// Build a result row from column/value pairs.
pub fn row(pairs: &[(&str, Value)]) -> SqlRow {
    SqlRow::from_pairs(pairs.iter().map(|(c, v)| (c.to_string(), v.clone())))
}

// Fixture models

pub struct User;

impl Model for User {
    fn model_name() -> &'static str {
        "User"
    }
    fn fields() -> Vec<&'static str> {
        vec!["id", "name"]
    }
    fn primary_key() -> Vec<&'static str> {
        vec!["id"]
    }
    fn auto_increment_field() -> Option<&'static str> {
        Some("id")
    }
}

pub struct Post;

impl Model for Post {
    fn model_name() -> &'static str {
        "Post"
    }
    fn fields() -> Vec<&'static str> {
        vec!["id", "title"]
    }
    fn primary_key() -> Vec<&'static str> {
        vec!["id"]
    }
    fn auto_increment_field() -> Option<&'static str> {
        Some("id")
    }
    fn relations() -> Vec<(String, Relation)> {
        vec![(
            "comments".to_string(),
            Relation::one_to_many("Comment", &[("id", "post_id")]),
        )]
    }
}

pub struct Comment;

impl Model for Comment {
    fn model_name() -> &'static str {
        "Comment"
    }
    fn fields() -> Vec<&'static str> {
        vec!["id", "post_id", "author_id", "body"]
    }
    fn primary_key() -> Vec<&'static str> {
        vec!["id"]
    }
    fn auto_increment_field() -> Option<&'static str> {
        Some("id")
    }
    fn relations() -> Vec<(String, Relation)> {
        vec![
            (
                "post".to_string(),
                Relation::many_to_one("Post", &[("post_id", "id")]),
            ),
            (
                "author".to_string(),
                Relation::many_to_one("User", &[("author_id", "id")]),
            ),
        ]
    }
}

/// Sequenced model with a grouped index domain.
pub struct Task;

impl Model for Task {
    fn model_name() -> &'static str {
        "Task"
    }
    fn fields() -> Vec<&'static str> {
        vec!["id", "name", "category"]
    }
    fn primary_key() -> Vec<&'static str> {
        vec!["id"]
    }
    fn auto_increment_field() -> Option<&'static str> {
        Some("id")
    }
    fn plugins() -> Vec<Rc<dyn ModelPlugin>> {
        vec![Rc::new(Sequence::grouped_by(&["category"]))]
    }
}

/// Sequenced model without grouping.
pub struct Item;

impl Model for Item {
    fn model_name() -> &'static str {
        "Item"
    }
    fn fields() -> Vec<&'static str> {
        vec!["id", "label"]
    }
    fn primary_key() -> Vec<&'static str> {
        vec!["id"]
    }
    fn auto_increment_field() -> Option<&'static str> {
        Some("id")
    }
    fn plugins() -> Vec<Rc<dyn ModelPlugin>> {
        vec![Rc::new(Sequence::new())]
    }
}

pub struct TreeNode;

impl Model for TreeNode {
    fn model_name() -> &'static str {
        "TreeNode"
    }
    fn fields() -> Vec<&'static str> {
        vec!["id", "name"]
    }
    fn primary_key() -> Vec<&'static str> {
        vec!["id"]
    }
    fn auto_increment_field() -> Option<&'static str> {
        Some("id")
    }
    fn plugins() -> Vec<Rc<dyn ModelPlugin>> {
        vec![Rc::new(NestedSet::new())]
    }
}

pub struct Note;

impl Model for Note {
    fn model_name() -> &'static str {
        "Note"
    }
    fn fields() -> Vec<&'static str> {
        vec!["id", "body"]
    }
    fn primary_key() -> Vec<&'static str> {
        vec!["id"]
    }
    fn auto_increment_field() -> Option<&'static str> {
        Some("id")
    }
    fn plugins() -> Vec<Rc<dyn ModelPlugin>> {
        vec![Rc::new(Timestamps::new())]
    }
}

/// A connection plus a manager with all fixture models associated.
pub fn setup() -> (MockConnection, Rc<Manager>) {
    let connection = MockConnection::new();
    let manager = Manager::new(Rc::new(connection.clone()));
    manager.associate::<User>("users").unwrap();
    manager.associate::<Post>("posts").unwrap();
    manager.associate::<Comment>("comments").unwrap();
    manager.associate::<Task>("tasks").unwrap();
    manager.associate::<Item>("items").unwrap();
    manager.associate::<TreeNode>("tree_nodes").unwrap();
    manager.associate::<Note>("notes").unwrap();
    (connection, manager)
}
