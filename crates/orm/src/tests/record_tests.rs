//! Record tests: state tracking, snapshots, plugin dispatch order

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};

use crate::error::{ModelError, OrmResult};
use crate::model::{Model, SharedRecord};
use crate::plugins::{ModelEvent, ModelPlugin};
use crate::tests::support::setup;

#[test]
fn from_array_only_sets_declared_fields() {
    let (_connection, manager) = setup();
    let user = manager.create("User").unwrap();
    let values = [
        ("id".to_string(), json!(1)),
        ("name".to_string(), json!("ann")),
        ("ghost".to_string(), json!("boo")),
    ];
    user.from_array(values.iter().map(|(f, v)| (f.as_str(), v)));

    assert_eq!(user.get("id"), Some(json!(1)));
    assert!(!user.has("ghost"));
}

#[test]
fn to_array_excludes_dynamic_attributes() {
    let (_connection, manager) = setup();
    let user = manager.create("User").unwrap();
    user.set("name", json!("ann"));
    user.set("_scratch", json!(true));

    let map = user.to_array();
    assert_eq!(map.len(), 1);
    assert!(map.contains_key("name"));
    // the dynamic attribute is readable but never persisted
    assert_eq!(user.get("_scratch"), Some(json!(true)));
}

#[test]
fn mark_as_saved_snapshots_values_and_tracks_changes() {
    let (_connection, manager) = setup();
    let user = manager.create("User").unwrap();
    user.set("id", json!(1));
    user.set("name", json!("ann"));
    user.mark_as_saved();

    assert!(!user.is_new());
    assert!(!user.field_changed("name"));

    user.set("name", json!("bea"));
    assert!(user.field_changed("name"));
    assert_eq!(user.old_value("name"), Some(json!("ann")));
    assert_eq!(user.old_values().get("name"), Some(&json!("ann")));

    user.mark_as_saved();
    assert!(!user.field_changed("name"));
}

#[test]
fn unset_fields_compare_as_null_for_change_tracking() {
    let (_connection, manager) = setup();
    let user = manager.create("User").unwrap();
    user.mark_as_saved();
    assert!(!user.field_changed("name"));
    user.set("name", Value::Null);
    assert!(!user.field_changed("name"));
    user.set("name", json!("ann"));
    assert!(user.field_changed("name"));
}

#[test]
fn unique_identifier_is_stable_per_primary_key() {
    let (_connection, manager) = setup();
    let a = manager.create("User").unwrap();
    a.set("id", json!(1));
    let b = manager.create("User").unwrap();
    b.set("id", json!(1));
    let c = manager.create("User").unwrap();
    c.set("id", json!(2));

    assert_eq!(a.unique_identifier(), b.unique_identifier());
    assert_ne!(a.unique_identifier(), c.unique_identifier());
}

#[test]
fn save_without_manager_fails() {
    let (_connection, manager) = setup();
    let user = manager.create("User").unwrap();
    user.set_manager(None);
    let err = user.save().unwrap_err();
    assert!(matches!(err, ModelError::NoManager));
    assert_eq!(ModelError::NoManager.code(), 4);
}

// Event-order fixture: one logging plugin plus a model-level hook.

thread_local! {
    static EVENT_LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn log_event(entry: &str) {
    EVENT_LOG.with(|log| log.borrow_mut().push(entry.to_string()));
}

fn take_event_log() -> Vec<String> {
    EVENT_LOG.with(|log| log.borrow_mut().drain(..).collect())
}

struct LoggingPlugin(&'static str);

impl ModelPlugin for LoggingPlugin {
    fn plugin_name(&self) -> &'static str {
        self.0
    }

    fn handle(&self, event: ModelEvent, _record: &SharedRecord) -> OrmResult<()> {
        log_event(&format!("{}:{:?}", self.0, event));
        Ok(())
    }
}

struct Audited;

impl Model for Audited {
    fn model_name() -> &'static str {
        "Audited"
    }
    fn fields() -> Vec<&'static str> {
        vec!["id", "label"]
    }
    fn primary_key() -> Vec<&'static str> {
        vec!["id"]
    }
    fn plugins() -> Vec<Rc<dyn ModelPlugin>> {
        vec![
            Rc::new(LoggingPlugin("first")),
            Rc::new(LoggingPlugin("second")),
        ]
    }
    fn event_hook() -> Option<fn(ModelEvent, &SharedRecord) -> OrmResult<()>> {
        Some(|event, _record| {
            log_event(&format!("model:{:?}", event));
            Ok(())
        })
    }
}

#[test]
fn events_fire_on_every_plugin_then_on_the_model_hook() {
    let (_connection, manager) = setup();
    manager.associate::<Audited>("audited").unwrap();
    take_event_log();

    let record = manager.create("Audited").unwrap();
    assert_eq!(
        take_event_log(),
        vec![
            "first:AfterConstruct",
            "second:AfterConstruct",
            "model:AfterConstruct",
        ]
    );

    record.set("id", json!(1));
    record.set("label", json!("x"));
    record.save().unwrap();
    assert_eq!(
        take_event_log(),
        vec![
            "first:BeforeInsert",
            "second:BeforeInsert",
            "model:BeforeInsert",
            "first:AfterInsert",
            "second:AfterInsert",
            "model:AfterInsert",
        ]
    );
}

#[test]
fn failed_writes_skip_after_events() {
    let (connection, manager) = setup();
    manager.associate::<Audited>("audited").unwrap();
    connection.set_error_code("23000");
    take_event_log();

    let record = manager.create("Audited").unwrap();
    take_event_log();
    record.set("id", json!(1));
    assert!(!record.save().unwrap());
    assert_eq!(
        take_event_log(),
        vec![
            "first:BeforeInsert",
            "second:BeforeInsert",
            "model:BeforeInsert",
        ]
    );
}
