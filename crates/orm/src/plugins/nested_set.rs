//! NestedSet Plugin - Tree storage with left/right encoding
//!
//! Adds `left` and `right` fields encoding a tree: every node's interval
//! strictly contains its descendants' intervals, and
//! `right = left + 2 * descendants + 1`. Optional group fields scope one
//! tree per group tuple.
//!
//! Moving an existing subtree evacuates it by a large sentinel offset,
//! closes the gap it left, opens space at the target and shifts it back in.
//! Each step is one UPDATE; there is no internal transaction. Moving a node
//! across groups is not supported.

use std::rc::Rc;

use serde_json::{json, Value};

use crate::error::{ModelError, OrmResult};
use crate::model::descriptor::{FetcherDef, ScopeFn};
use crate::model::record::SharedRecord;
use crate::plugins::{ModelEvent, ModelPlugin};
use crate::query::Query;
use crate::static_model::Fetched;

/// Offset used to park a subtree outside the live index range during a
/// move.
const MAX_INDEX: i64 = 1_000_000;

/// Nested-set tree behavior for a model.
#[derive(Debug, Clone, Default)]
pub struct NestedSet {
    group_fields: Vec<String>,
}

impl NestedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope each tree to a distinct tuple of the given fields.
    pub fn grouped_by(fields: &[&str]) -> Self {
        Self {
            group_fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    fn group_scope(&self, record: &SharedRecord) -> ScopeFn {
        let conditions: Vec<(String, Value)> = self
            .group_fields
            .iter()
            .map(|field| (field.clone(), record.get(field).unwrap_or(Value::Null)))
            .collect();
        Rc::new(move |q: &mut Query| {
            for (field, value) in &conditions {
                q.and_where(&format!("@{} = ?", field), &[value.clone()]);
            }
            Ok(())
        })
    }

    fn bounds(&self, record: &SharedRecord) -> OrmResult<(i64, i64)> {
        let left = record
            .get_i64("left")
            .ok_or_else(|| ModelError::Plugin("record has no left value".to_string()))?;
        let right = record
            .get_i64("right")
            .ok_or_else(|| ModelError::Plugin("record has no right value".to_string()))?;
        Ok((left, right))
    }

    /// Check group compatibility for an operation placing `node` relative
    /// to `anchor`. New nodes inherit the anchor's group; existing nodes
    /// must already match it.
    fn compare_group(&self, node: &SharedRecord, anchor: &SharedRecord) -> OrmResult<()> {
        if self.group_fields.is_empty() {
            return Ok(());
        }
        if node.is_new() {
            for field in &self.group_fields {
                node.set(field, anchor.get(field).unwrap_or(Value::Null));
            }
            return Ok(());
        }
        for field in &self.group_fields {
            if node.get(field) != anchor.get(field) {
                return Err(ModelError::Plugin(
                    "impossible to move a node from one group to another".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Shift the whole subtree span of the record by `amount`.
    fn increase_indexes(&self, record: &SharedRecord, amount: i64) -> OrmResult<()> {
        let (left, right) = self.bounds(record)?;
        let scope = self.group_scope(record);
        record
            .select()?
            .and_where("@left >= ? AND @right <= ?", &[json!(left), json!(right)])
            .set("@left = @left + ?", &[json!(amount)])
            .set("@right = @right + ?", &[json!(amount)])
            .scope(|q| scope(q))?
            .update(&[])?;
        Ok(())
    }

    /// Open a gap for the record's span at its current `left`.
    fn create_space(&self, record: &SharedRecord) -> OrmResult<()> {
        let (left, right) = self.bounds(record)?;
        let size = right - left + 1;

        let scope = self.group_scope(record);
        record
            .select()?
            .and_where("@left >= ?", &[json!(left)])
            .set("@left = @left + ?", &[json!(size)])
            .scope(|q| scope(q))?
            .update(&[])?;

        let scope = self.group_scope(record);
        record
            .select()?
            .and_where("@right >= ?", &[json!(left)])
            .set("@right = @right + ?", &[json!(size)])
            .scope(|q| scope(q))?
            .update(&[])?;
        Ok(())
    }

    /// Close the gap left behind by the record's span.
    fn remove_space(&self, record: &SharedRecord) -> OrmResult<()> {
        let (left, right) = self.bounds(record)?;
        let size = right - left + 1;

        let scope = self.group_scope(record);
        record
            .select()?
            .and_where("@left >= ?", &[json!(right)])
            .set("@left = @left - ?", &[json!(size)])
            .scope(|q| scope(q))?
            .update(&[])?;

        let scope = self.group_scope(record);
        record
            .select()?
            .and_where("@right >= ?", &[json!(right)])
            .set("@right = @right - ?", &[json!(size)])
            .scope(|q| scope(q))?
            .update(&[])?;
        Ok(())
    }

    /// General move/insert primitive: place the record so its `left`
    /// becomes `new_left`.
    ///
    /// New records open space at the target and save. Existing records park
    /// their subtree at the sentinel offset, close the evacuated gap, open
    /// space at the (possibly shifted) target and move the subtree back in.
    pub fn insert_at(&self, record: &SharedRecord, new_left: i64) -> OrmResult<()> {
        let (left, right) = self.bounds(record)?;
        if left <= new_left && new_left <= right {
            return Err(ModelError::Plugin(
                "impossible to move a node within itself".to_string(),
            ));
        }

        if record.is_new() {
            record.set("left", json!(new_left));
            record.set("right", json!(new_left + 1));
            self.create_space(record)?;
            record.save()?;
            return Ok(());
        }

        let mut new_left = new_left;
        let size = right - left;

        // park the subtree outside the live range and close its gap
        self.increase_indexes(record, MAX_INDEX)?;
        self.remove_space(record)?;

        // the target may have moved when the gap closed
        if new_left >= left {
            new_left -= right - left + 1;
        }
        let decrease = MAX_INDEX - (new_left - left);

        // open space at the target
        record.set("left", json!(new_left));
        record.set("right", json!(new_left + size));
        self.create_space(record)?;

        // shift the parked subtree back in
        record.set("left", json!(left + MAX_INDEX));
        record.set("right", json!(left + MAX_INDEX + size));
        self.increase_indexes(record, -decrease)?;

        record.set("left", json!(new_left));
        record.set("right", json!(new_left + size));
        Ok(())
    }

    /// Place the record directly after `node` at the same depth.
    pub fn insert_after(&self, record: &SharedRecord, node: &SharedRecord) -> OrmResult<()> {
        self.compare_group(record, node)?;
        let (_, right) = self.bounds(node)?;
        self.insert_at(record, right + 1)
    }

    /// Place the record directly before `node` at the same depth.
    pub fn insert_before(&self, record: &SharedRecord, node: &SharedRecord) -> OrmResult<()> {
        self.compare_group(record, node)?;
        let (left, _) = self.bounds(node)?;
        self.insert_at(record, left)
    }

    /// Place `node` as the first child of `parent`.
    pub fn prepend_child(&self, parent: &SharedRecord, node: &SharedRecord) -> OrmResult<()> {
        self.compare_group(node, parent)?;
        let (left, _) = self.bounds(parent)?;
        self.insert_at(node, left + 1)
    }

    /// Place `node` as the last child of `parent`.
    pub fn append_child(&self, parent: &SharedRecord, node: &SharedRecord) -> OrmResult<()> {
        self.compare_group(node, parent)?;
        let (_, right) = self.bounds(parent)?;
        self.insert_at(node, right)
    }

    /// Ancestors-and-self, outermost first.
    pub fn get_path(&self, record: &SharedRecord) -> OrmResult<Vec<SharedRecord>> {
        let (left, right) = self.bounds(record)?;
        let scope = self.group_scope(record);
        let mut query = record.select()?;
        query
            .and_where("@left <= ? AND @right >= ?", &[json!(left), json!(right)])
            .order("@left", "ASC")?
            .scope(|q| scope(q))?;
        query.all(&[])
    }

    /// The closest strict ancestor, if any.
    pub fn get_parent(&self, record: &SharedRecord) -> OrmResult<Option<SharedRecord>> {
        let (left, right) = self.bounds(record)?;
        let scope = self.group_scope(record);
        let mut query = record.select()?;
        query
            .and_where("@left < ? AND @right > ?", &[json!(left), json!(right)])
            .order("@left", "DESC")?
            .scope(|q| scope(q))?;
        query.first(&[])
    }

    /// Number of strict ancestors; the root has depth 0.
    pub fn get_depth(&self, record: &SharedRecord) -> OrmResult<i64> {
        let (left, right) = self.bounds(record)?;
        let scope = self.group_scope(record);
        let mut query = record.select()?;
        query
            .alias("COUNT(@left)", "@depth")?
            .and_where("@left < ? AND @right > ?", &[json!(left), json!(right)])
            .scope(|q| scope(q))?;
        let row = query.first_assoc(&[])?;
        Ok(row
            .as_ref()
            .and_then(|r| r.get("depth"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    /// All leaves of the record's group, left to right.
    pub fn get_leaf_nodes(&self, record: &SharedRecord) -> OrmResult<Vec<SharedRecord>> {
        let scope = self.group_scope(record);
        let mut query = record.select()?;
        query
            .and_where("@right = @left + 1", &[])
            .order("@left", "ASC")?
            .scope(|q| scope(q))?;
        query.all(&[])
    }

    /// Whether the record has no descendants.
    pub fn is_leaf(&self, record: &SharedRecord) -> OrmResult<bool> {
        let (left, right) = self.bounds(record)?;
        Ok(left + 1 == right)
    }

    /// Number of strict descendants, from the interval arithmetic alone.
    pub fn descendant_count(&self, record: &SharedRecord) -> OrmResult<i64> {
        let (left, right) = self.bounds(record)?;
        Ok((right - left - 1) / 2)
    }

    /// Fetch the record's subtree and shape it as a [`NestedSetNode`] tree.
    pub fn get_nested_set(&self, record: &SharedRecord) -> OrmResult<Option<NestedSetNode>> {
        let (left, right) = self.bounds(record)?;
        let scope = self.group_scope(record);
        let mut query = record.select()?;
        query
            .and_where("@left >= ? AND @right <= ?", &[json!(left), json!(right)])
            .order("@left", "ASC")?
            .scope(|q| scope(q))?;
        let elements = query.all(&[])?;
        Ok(NestedSetNode::from_elements(&elements))
    }
}

impl ModelPlugin for NestedSet {
    fn plugin_name(&self) -> &'static str {
        "NestedSet"
    }

    fn fields(&self) -> Vec<String> {
        vec!["left".to_string(), "right".to_string()]
    }

    fn fetchers(&self) -> Vec<FetcherDef> {
        vec![FetcherDef::new("getRoot", |s, args| {
            let assoc = args.first().and_then(Value::as_bool).unwrap_or(false);
            let mut query = s.query()?;
            query.and_where("@left = ?", &[json!(0)]);
            if assoc {
                Ok(Fetched::Row(query.first_assoc(&[])?))
            } else {
                Ok(Fetched::Record(query.first(&[])?))
            }
        })]
    }

    fn methods(&self) -> Vec<&'static str> {
        vec!["insertAt", "isLeaf", "descendantCount", "getDepth"]
    }

    fn call(&self, record: &SharedRecord, method: &str, args: &[Value]) -> OrmResult<Value> {
        match method {
            "insertAt" => {
                let new_left = args.first().and_then(Value::as_i64).ok_or_else(|| {
                    ModelError::Plugin("insertAt requires an integer position".to_string())
                })?;
                self.insert_at(record, new_left)?;
                Ok(Value::Null)
            }
            "isLeaf" => Ok(Value::Bool(self.is_leaf(record)?)),
            "descendantCount" => Ok(json!(self.descendant_count(record)?)),
            "getDepth" => Ok(json!(self.get_depth(record)?)),
            _ => Err(ModelError::UnknownMethod(format!(
                "NestedSet does not implement '{}'",
                method
            ))),
        }
    }

    fn handle(&self, event: ModelEvent, record: &SharedRecord) -> OrmResult<()> {
        match event {
            ModelEvent::AfterConstruct => {
                record.set("left", json!(-1));
                record.set("right", json!(-1));
                Ok(())
            }
            ModelEvent::AfterDelete => {
                // delete all strict descendants, then compact the gap
                let (left, right) = self.bounds(record)?;
                let scope = self.group_scope(record);
                record
                    .select()?
                    .and_where("@left > ? AND @right < ?", &[json!(left), json!(right)])
                    .scope(|q| scope(q))?
                    .delete(&[])?;
                self.remove_space(record)
            }
            _ => Ok(()),
        }
    }
}

/// One node of a materialized nested-set tree.
#[derive(Debug, Clone)]
pub struct NestedSetNode {
    pub element: SharedRecord,
    pub children: Vec<NestedSetNode>,
}

impl NestedSetNode {
    /// Build a tree from elements ordered by `left`. The first element is
    /// the root; elements outside its span are ignored.
    pub fn from_elements(elements: &[SharedRecord]) -> Option<Self> {
        if elements.is_empty() {
            return None;
        }
        let mut pos = 0;
        Some(Self::build(elements, &mut pos))
    }

    fn build(elements: &[SharedRecord], pos: &mut usize) -> Self {
        let element = elements[*pos].clone();
        *pos += 1;
        let right = element.get_i64("right").unwrap_or(0);

        let mut node = Self {
            element,
            children: Vec::new(),
        };
        while *pos < elements.len() {
            let child_right = elements[*pos].get_i64("right").unwrap_or(0);
            if child_right < right {
                node.children.push(Self::build(elements, pos));
            } else {
                break;
            }
        }
        node
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// All nodes of the subtree in depth-first order, self included.
    pub fn flatten(&self) -> Vec<&NestedSetNode> {
        let mut nodes = vec![self];
        for child in &self.children {
            nodes.extend(child.flatten());
        }
        nodes
    }

    /// All nodes exactly `depth` levels below this one.
    pub fn nodes_at_depth(&self, depth: usize) -> Vec<&NestedSetNode> {
        if depth == 0 {
            return vec![self];
        }
        self.children
            .iter()
            .flat_map(|child| child.nodes_at_depth(depth - 1))
            .collect()
    }

    pub fn has_child(&self, element: &SharedRecord) -> bool {
        let id = element.unique_identifier();
        self.children
            .iter()
            .any(|child| child.element.unique_identifier() == id)
    }

    pub fn has_descendant(&self, element: &SharedRecord) -> bool {
        self.has_child(element)
            || self
                .children
                .iter()
                .any(|child| child.has_descendant(element))
    }

    /// The subtree node holding the given element, if present.
    pub fn find(&self, element: &SharedRecord) -> Option<&NestedSetNode> {
        if self.element.unique_identifier() == element.unique_identifier() {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(element))
    }
}
