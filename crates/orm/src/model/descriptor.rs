//! Model Descriptor - Assembled, immutable metadata for one entity type
//!
//! A descriptor is built once when a model is associated with a manager and
//! shared as `Rc<ModelDescriptor>` afterwards. It merges the model's own
//! declarations with the contributions of every attached plugin: extra
//! fields, named scopes and fetchers, and the instance-method dispatch table.

use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, OrmResult};
use crate::manager::Manager;
use crate::model::core_trait::Model;
use crate::model::record::SharedRecord;
use crate::plugins::{ModelEvent, ModelPlugin};
use crate::query::Query;
use crate::static_model::{Fetched, StaticModel};

/// How many records a relation produces on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    OneToOne,
    ManyToOne,
    OneToMany,
}

impl Cardinality {
    /// Returns true if the relation attribute holds a list of records.
    pub fn is_collection(self) -> bool {
        matches!(self, Self::OneToMany)
    }
}

/// A declared relation: target model, join field pairs, cardinality.
#[derive(Debug, Clone)]
pub struct Relation {
    /// Short name of the target model.
    pub target: String,
    /// Ordered `(local_field, foreign_field)` pairs for the join ON clause.
    pub join_pairs: Vec<(String, String)>,
    pub cardinality: Cardinality,
}

impl Relation {
    pub fn new(target: &str, join_pairs: &[(&str, &str)], cardinality: Cardinality) -> Self {
        Self {
            target: target.to_string(),
            join_pairs: join_pairs
                .iter()
                .map(|(l, f)| (l.to_string(), f.to_string()))
                .collect(),
            cardinality,
        }
    }

    pub fn one_to_one(target: &str, join_pairs: &[(&str, &str)]) -> Self {
        Self::new(target, join_pairs, Cardinality::OneToOne)
    }

    pub fn many_to_one(target: &str, join_pairs: &[(&str, &str)]) -> Self {
        Self::new(target, join_pairs, Cardinality::ManyToOne)
    }

    pub fn one_to_many(target: &str, join_pairs: &[(&str, &str)]) -> Self {
        Self::new(target, join_pairs, Cardinality::OneToMany)
    }
}

/// A scope mutates a query in place; scopes compose by sequential application.
pub type ScopeFn = Rc<dyn Fn(&mut Query) -> OrmResult<()>>;

/// Lifecycle hook defined on the model itself, dispatched after plugin hooks.
pub type EventHookFn = fn(ModelEvent, &SharedRecord) -> OrmResult<()>;

/// A named scope: builds a [`ScopeFn`] from dynamic call arguments.
#[derive(Clone)]
pub struct ScopeDef {
    pub name: &'static str,
    build: Rc<dyn Fn(&[Value]) -> OrmResult<ScopeFn>>,
}

impl ScopeDef {
    pub fn new<F>(name: &'static str, build: F) -> Self
    where
        F: Fn(&[Value]) -> OrmResult<ScopeFn> + 'static,
    {
        Self {
            name,
            build: Rc::new(build),
        }
    }

    pub fn build(&self, args: &[Value]) -> OrmResult<ScopeFn> {
        (self.build)(args)
    }
}

impl std::fmt::Debug for ScopeDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeDef").field("name", &self.name).finish()
    }
}

/// A named fetcher: runs a query off a [`StaticModel`] and shapes the result.
#[derive(Clone)]
pub struct FetcherDef {
    pub name: &'static str,
    call: Rc<dyn Fn(&StaticModel, &[Value]) -> OrmResult<Fetched>>,
}

impl FetcherDef {
    pub fn new<F>(name: &'static str, call: F) -> Self
    where
        F: Fn(&StaticModel, &[Value]) -> OrmResult<Fetched> + 'static,
    {
        Self {
            name,
            call: Rc::new(call),
        }
    }

    pub fn call(&self, static_model: &StaticModel, args: &[Value]) -> OrmResult<Fetched> {
        (self.call)(static_model, args)
    }
}

impl std::fmt::Debug for FetcherDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetcherDef")
            .field("name", &self.name)
            .finish()
    }
}

/// A plain named static, invoked with the manager as first argument.
#[derive(Clone)]
pub struct StaticDef {
    pub name: &'static str,
    call: Rc<dyn Fn(&Rc<Manager>, &[Value]) -> OrmResult<Value>>,
}

impl StaticDef {
    pub fn new<F>(name: &'static str, call: F) -> Self
    where
        F: Fn(&Rc<Manager>, &[Value]) -> OrmResult<Value> + 'static,
    {
        Self {
            name,
            call: Rc::new(call),
        }
    }

    pub fn call(&self, manager: &Rc<Manager>, args: &[Value]) -> OrmResult<Value> {
        (self.call)(manager, args)
    }
}

impl std::fmt::Debug for StaticDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticDef")
            .field("name", &self.name)
            .finish()
    }
}

/// Immutable, assembled description of one entity type.
pub struct ModelDescriptor {
    /// Short model name.
    pub name: String,
    /// Declared fields, model's own first, then each plugin's in order.
    pub fields: Vec<String>,
    /// Non-empty subset of `fields`.
    pub primary_key: Vec<String>,
    /// Optional single auto-increment field.
    pub auto_increment_field: Option<String>,
    /// Declared relations by name.
    pub relations: HashMap<String, Relation>,
    /// Named scopes; model's own, built-ins, then plugin contributions.
    pub scopes: Vec<ScopeDef>,
    /// Named fetchers; model's own, built-ins, then plugin contributions.
    pub fetchers: Vec<FetcherDef>,
    /// Plain statics resolvable through dynamic dispatch.
    pub statics: Vec<StaticDef>,
    /// Attached plugins, in declaration order.
    pub plugins: Vec<Rc<dyn ModelPlugin>>,
    /// Instance-method dispatch table: method name to plugin index,
    /// first-declaration-wins.
    pub methods: HashMap<String, usize>,
    /// Optional lifecycle hook on the model itself.
    pub event_hook: Option<EventHookFn>,
}

impl std::fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plugin_names: Vec<&'static str> =
            self.plugins.iter().map(|p| p.plugin_name()).collect();
        f.debug_struct("ModelDescriptor")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("primary_key", &self.primary_key)
            .field("auto_increment_field", &self.auto_increment_field)
            .field("relations", &self.relations)
            .field("scopes", &self.scopes)
            .field("fetchers", &self.fetchers)
            .field("statics", &self.statics)
            .field("plugins", &plugin_names)
            .field("methods", &self.methods)
            .field("event_hook", &self.event_hook)
            .finish()
    }
}

impl ModelDescriptor {
    /// Assemble the descriptor for a model type, merging plugin
    /// contributions and validating the declaration.
    pub fn of<M: Model>() -> OrmResult<Self> {
        let name = M::model_name().to_string();
        let plugins = M::plugins();

        let mut fields: Vec<String> = M::fields().iter().map(|f| f.to_string()).collect();
        if fields.is_empty() {
            return Err(ModelError::NoFields(name));
        }
        for plugin in &plugins {
            fields.extend(plugin.fields());
        }

        let primary_key: Vec<String> = M::primary_key().iter().map(|f| f.to_string()).collect();
        if primary_key.is_empty() {
            return Err(ModelError::NoPrimaryKey(format!(
                "model '{}' has no primary key defined",
                name
            )));
        }
        for key_field in &primary_key {
            if !fields.contains(key_field) {
                return Err(ModelError::NoPrimaryKey(format!(
                    "primary key field '{}' is not declared on model '{}'",
                    key_field, name
                )));
            }
        }

        let auto_increment_field = M::auto_increment_field().map(str::to_string);
        if let Some(ai) = &auto_increment_field {
            if !fields.contains(ai) {
                return Err(ModelError::NoFields(format!(
                    "auto-increment field '{}' is not declared on model '{}'",
                    ai, name
                )));
            }
        }

        let mut scopes = M::scopes();
        scopes.extend(builtin_scopes());
        let mut fetchers = M::fetchers();
        fetchers.extend(builtin_fetchers());
        for plugin in &plugins {
            scopes.extend(plugin.scopes());
            fetchers.extend(plugin.fetchers());
        }

        let mut methods = HashMap::new();
        for (index, plugin) in plugins.iter().enumerate() {
            for method in plugin.methods() {
                methods.entry(method.to_string()).or_insert(index);
            }
        }

        Ok(Self {
            name,
            fields,
            primary_key,
            auto_increment_field,
            relations: M::relations().into_iter().collect(),
            scopes,
            fetchers,
            statics: M::statics(),
            plugins,
            methods,
            event_hook: M::event_hook(),
        })
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    pub fn scope(&self, name: &str) -> Option<&ScopeDef> {
        self.scopes.iter().find(|s| s.name == name)
    }

    pub fn fetcher(&self, name: &str) -> Option<&FetcherDef> {
        self.fetchers.iter().find(|f| f.name == name)
    }

    pub fn static_method(&self, name: &str) -> Option<&StaticDef> {
        self.statics.iter().find(|s| s.name == name)
    }
}

/// Scopes every model carries: `byId`, `orderById`.
fn builtin_scopes() -> Vec<ScopeDef> {
    vec![
        ScopeDef::new("byId", |args| {
            let id = args.first().cloned().unwrap_or(Value::Null);
            Ok(Rc::new(move |q: &mut Query| {
                q.and_where("@id = ?", &[id.clone()]);
                Ok(())
            }))
        }),
        ScopeDef::new("orderById", |args| {
            let dir = args
                .first()
                .and_then(Value::as_str)
                .unwrap_or("ASC")
                .to_string();
            Ok(Rc::new(move |q: &mut Query| {
                q.order("@id", &dir)?;
                Ok(())
            }))
        }),
    ]
}

/// Fetchers every model carries: `first`, `all`, `getById`.
fn builtin_fetchers() -> Vec<FetcherDef> {
    vec![
        FetcherDef::new("first", |s, args| {
            let assoc = args.first().and_then(Value::as_bool).unwrap_or(false);
            let mut query = s.query()?;
            if assoc {
                Ok(Fetched::Row(query.first_assoc(&[])?))
            } else {
                Ok(Fetched::Record(query.first(&[])?))
            }
        }),
        FetcherDef::new("all", |s, args| {
            let assoc = args.first().and_then(Value::as_bool).unwrap_or(false);
            let mut query = s.query()?;
            if assoc {
                Ok(Fetched::Rows(query.all_assoc(&[])?))
            } else {
                Ok(Fetched::Records(query.all(&[])?))
            }
        }),
        FetcherDef::new("getById", |s, args| {
            let id = args.first().cloned().unwrap_or(Value::Null);
            let assoc = args.get(1).and_then(Value::as_bool).unwrap_or(false);
            let mut query = s.query()?;
            query.and_where("@id = ?", &[id]);
            if assoc {
                Ok(Fetched::Row(query.first_assoc(&[])?))
            } else {
                Ok(Fetched::Record(query.first(&[])?))
            }
        }),
    ]
}
