//! Flat-row to graph transformation
//!
//! Each result column belongs to a relation path: composite names like
//! `comments.id` split at the last dot, plain names belong to the root.
//! Entities are pooled by a primary-key group hash so the same row data
//! seen across several joined rows materializes exactly once; parents hold
//! the pooled entity by identity, not by copy. A NULL primary key (the
//! absent side of an outer join) contributes no entity: to-one relations
//! stay unset or explicitly null, to-many relations stay lists, possibly
//! empty.
//!
//! Complexity is O(rows x joins); memory is bounded by the number of
//! distinct entities across all paths.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::backends::SqlRow;
use crate::error::OrmResult;
use crate::manager::Manager;
use crate::model::descriptor::{Cardinality, ModelDescriptor};
use crate::model::record::{RelationValue, SharedRecord};
use crate::query::paths::split_relation_path;

/// One pooled entity under construction.
struct Node {
    descriptor: Rc<ModelDescriptor>,
    values: Vec<(String, Value)>,
    relations: Vec<(String, Slot)>,
}

/// A relation attribute on a node.
enum Slot {
    One(Option<Rc<RefCell<Node>>>),
    Many(Vec<Rc<RefCell<Node>>>),
}

impl Node {
    fn set_one(node: &Rc<RefCell<Node>>, name: &str, child: Option<Rc<RefCell<Node>>>) {
        let mut inner = node.borrow_mut();
        if let Some(slot) = inner.relations.iter_mut().find(|(n, _)| n == name) {
            slot.1 = Slot::One(child);
        } else {
            inner.relations.push((name.to_string(), Slot::One(child)));
        }
    }

    fn init_empty(node: &Rc<RefCell<Node>>, name: &str, cardinality: Cardinality) {
        let mut inner = node.borrow_mut();
        if !inner.relations.iter().any(|(n, _)| n == name) {
            let slot = if cardinality.is_collection() {
                Slot::Many(Vec::new())
            } else {
                Slot::One(None)
            };
            inner.relations.push((name.to_string(), slot));
        }
    }

    fn push_many(node: &Rc<RefCell<Node>>, name: &str, child: Rc<RefCell<Node>>) {
        let mut inner = node.borrow_mut();
        match inner.relations.iter_mut().find(|(n, _)| n == name) {
            Some((_, Slot::Many(children))) => {
                if !children.iter().any(|c| Rc::ptr_eq(c, &child)) {
                    children.push(child);
                }
            }
            Some((_, slot @ Slot::One(_))) => *slot = Slot::Many(vec![child]),
            None => inner
                .relations
                .push((name.to_string(), Slot::Many(vec![child]))),
        }
    }
}

/// Hydrates flat rows for one query's set of introduced paths.
pub struct Hydrator<'a> {
    structures: &'a [(String, Rc<ModelDescriptor>)],
    manager: Option<Rc<Manager>>,
}

impl<'a> Hydrator<'a> {
    pub(crate) fn new(
        structures: &'a [(String, Rc<ModelDescriptor>)],
        manager: Option<Rc<Manager>>,
    ) -> Self {
        Self {
            structures,
            manager,
        }
    }

    /// Hydrate into nested associative maps. Non-field columns such as
    /// select aliases stay in the map of the path they belong to.
    pub fn hydrate_assoc(&self, rows: &[SqlRow]) -> OrmResult<Vec<Value>> {
        let roots = self.build_graph(rows)?;
        Ok(roots.iter().map(node_to_value).collect())
    }

    /// Hydrate into records. Each distinct entity is instantiated once via
    /// `from_array`, marked as saved and bound to the manager; relation
    /// attributes reference the pooled records by identity.
    pub fn hydrate_records(&self, rows: &[SqlRow]) -> OrmResult<Vec<SharedRecord>> {
        let roots = self.build_graph(rows)?;
        let mut memo: HashMap<*const RefCell<Node>, SharedRecord> = HashMap::new();
        roots
            .iter()
            .map(|node| self.node_to_record(node, &mut memo))
            .collect()
    }

    fn descriptor(&self, path: &str) -> Option<&Rc<ModelDescriptor>> {
        self.structures
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, d)| d)
    }

    fn build_graph(&self, rows: &[SqlRow]) -> OrmResult<Vec<Rc<RefCell<Node>>>> {
        let mut result: Vec<Rc<RefCell<Node>>> = Vec::new();
        let mut pool: HashMap<String, Rc<RefCell<Node>>> = HashMap::new();

        for row in rows {
            // group all values of this row by relation path
            let mut buckets: Vec<Vec<(String, Value)>> =
                self.structures.iter().map(|_| Vec::new()).collect();
            for (column, value) in row.iter() {
                let (local_path, field) = split_relation_path(column);
                if let Some(index) = self.structures.iter().position(|(p, _)| p == local_path) {
                    buckets[index].push((field.to_string(), value.clone()));
                }
            }

            // entities of this row, one per path that produced values
            let mut row_entities: HashMap<&str, Option<Rc<RefCell<Node>>>> = HashMap::new();

            for (index, (path, descriptor)) in self.structures.iter().enumerate() {
                let bucket = &buckets[index];
                // join-only paths project no columns
                if bucket.is_empty() {
                    continue;
                }

                let entity = match group_hash(path, descriptor, bucket) {
                    None => None,
                    Some(hash) => Some(match pool.get(&hash) {
                        Some(node) => node.clone(),
                        None => {
                            let node = Rc::new(RefCell::new(Node {
                                descriptor: descriptor.clone(),
                                values: bucket.clone(),
                                relations: Vec::new(),
                            }));
                            pool.insert(hash, node.clone());
                            if path.is_empty() {
                                result.push(node.clone());
                            }
                            node
                        }
                    }),
                };
                row_entities.insert(path.as_str(), entity.clone());

                if path.is_empty() {
                    continue;
                }

                // wire the entity to its parent, if the parent materialized
                let (local_path, relation_name) = split_relation_path(path);
                let parent = match row_entities.get(local_path) {
                    Some(Some(parent)) => parent.clone(),
                    _ => continue,
                };
                let relation = match self
                    .descriptor(local_path)
                    .and_then(|d| d.relation(relation_name))
                {
                    Some(relation) => relation,
                    None => continue,
                };

                match (entity, relation.cardinality) {
                    (Some(child), Cardinality::OneToMany) => {
                        Node::push_many(&parent, relation_name, child);
                    }
                    (Some(child), _) => {
                        Node::set_one(&parent, relation_name, Some(child));
                    }
                    (None, cardinality) => {
                        Node::init_empty(&parent, relation_name, cardinality);
                    }
                }
            }
        }

        trace!(
            roots = result.len(),
            entities = pool.len(),
            "hydrated result graph"
        );
        Ok(result)
    }

    fn node_to_record(
        &self,
        node: &Rc<RefCell<Node>>,
        memo: &mut HashMap<*const RefCell<Node>, SharedRecord>,
    ) -> OrmResult<SharedRecord> {
        if let Some(record) = memo.get(&Rc::as_ptr(node)) {
            return Ok(record.clone());
        }

        let inner = node.borrow();
        let record = SharedRecord::new(inner.descriptor.clone(), self.manager.clone())?;
        record.from_array(inner.values.iter().map(|(f, v)| (f.as_str(), v)));
        record.mark_as_saved();
        memo.insert(Rc::as_ptr(node), record.clone());

        for (name, slot) in &inner.relations {
            let value = match slot {
                Slot::One(None) => RelationValue::One(None),
                Slot::One(Some(child)) => {
                    RelationValue::One(Some(self.node_to_record(child, memo)?))
                }
                Slot::Many(children) => RelationValue::Many(
                    children
                        .iter()
                        .map(|child| self.node_to_record(child, memo))
                        .collect::<OrmResult<Vec<_>>>()?,
                ),
            };
            record.set_relation(name, value);
        }

        Ok(record)
    }
}

/// Group hash of one bucket: the relation path joined with each primary-key
/// value. NULL or missing key values hash to nothing, so outer-join absence
/// never materializes an entity.
fn group_hash(
    path: &str,
    descriptor: &ModelDescriptor,
    bucket: &[(String, Value)],
) -> Option<String> {
    let mut hash = path.to_string();
    for key_field in &descriptor.primary_key {
        let value = bucket
            .iter()
            .find(|(f, _)| f == key_field)
            .map(|(_, v)| v)?;
        if value.is_null() {
            return None;
        }
        hash.push('@');
        match value {
            Value::String(s) => hash.push_str(s),
            other => hash.push_str(&other.to_string()),
        }
    }
    Some(hash)
}

fn node_to_value(node: &Rc<RefCell<Node>>) -> Value {
    let inner = node.borrow();
    let mut map = Map::new();
    for (field, value) in &inner.values {
        map.insert(field.clone(), value.clone());
    }
    for (name, slot) in &inner.relations {
        let value = match slot {
            Slot::One(None) => Value::Null,
            Slot::One(Some(child)) => node_to_value(child),
            Slot::Many(children) => Value::Array(children.iter().map(node_to_value).collect()),
        };
        map.insert(name.clone(), value);
    }
    Value::Object(map)
}
