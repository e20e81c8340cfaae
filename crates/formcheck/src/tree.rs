//! Mounted validation state.
//!
//! A [`ValidationTree`] owns every node of a mounted [`Validation`] in one
//! arena and hands out [`NodeId`] handles. Parents keep their fields,
//! children, and every/some instances by id; each node keeps its parent id
//! for upward error propagation. Instances that fall out of their collection
//! are freed, and their ids go stale rather than dangling.
//!
//! Testing any node re-runs its subtree and then patches the error lists of
//! its ancestors, so a partial re-test leaves the tree in the same state a
//! full re-test with the same data would.

use crate::error::{Result, ValidationError};
use crate::path::{self, Key, Path};
use crate::rule::{Enabled, FieldError, KeyGetter, Rule};
use crate::validation::{Template, Validation};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::slice;
use tracing::{debug, trace};

/// Handle to a node of one [`ValidationTree`].
///
/// Ids of freed nodes never resolve again, even after their slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Which part of a node an error list entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Own,
    Node(NodeId),
    Some,
}

#[derive(Debug, Default)]
struct ErrorList {
    errors: Vec<FieldError>,
    origins: Vec<Origin>,
}

impl ErrorList {
    fn push(&mut self, error: FieldError, origin: Origin) {
        self.errors.push(error);
        self.origins.push(origin);
    }

    fn clear(&mut self) {
        self.errors.clear();
        self.origins.clear();
    }

    fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Replace the entries from `origin` with `errors`, keeping their place
    /// in the list. New origins go to the end.
    fn splice(&mut self, origin: Origin, errors: Vec<FieldError>) {
        let at = self
            .origins
            .iter()
            .position(|o| *o == origin)
            .unwrap_or(self.origins.len());
        let origins = &self.origins;
        let mut i = 0;
        self.errors.retain(|_| {
            let keep = origins[i] != origin;
            i += 1;
            keep
        });
        self.origins.retain(|o| *o != origin);
        let count = errors.len();
        self.errors.splice(at..at, errors);
        self.origins.splice(at..at, std::iter::repeat_n(origin, count));
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Every,
    Some,
}

impl Kind {
    fn missing(self) -> ValidationError {
        match self {
            Kind::Every => ValidationError::NoEveryRule,
            Kind::Some => ValidationError::NoSomeRule,
        }
    }
}

#[derive(Debug, Default)]
struct Instances {
    order: Vec<(Key, NodeId)>,
    by_key: HashMap<Key, NodeId>,
}

impl Instances {
    fn get(&self, key: &Key) -> Option<NodeId> {
        self.by_key.get(key).copied()
    }

    fn insert(&mut self, key: Key, id: NodeId) {
        if self.by_key.insert(key.clone(), id).is_none() {
            self.order.push((key, id));
        }
    }

    /// Remove `key`. Its `order` entry stays behind and is skipped by `ids`.
    fn take(&mut self, key: &Key) -> Option<NodeId> {
        self.by_key.remove(key)
    }

    fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order
            .iter()
            .filter(|(key, id)| self.by_key.get(key) == Some(id))
            .map(|(_, id)| *id)
    }
}

/// What one instance reported over every element sharing its key.
#[derive(Debug)]
struct Verdict {
    instance: NodeId,
    passed: bool,
    errors: Vec<FieldError>,
}

impl Verdict {
    fn absorb(&mut self, other: Verdict) {
        self.passed |= other.passed;
        self.errors.extend(other.errors);
    }
}

#[derive(Debug)]
struct Aggregate {
    template: Template,
    instances: Option<Instances>,
}

impl From<Template> for Aggregate {
    fn from(template: Template) -> Self {
        Self { template, instances: None }
    }
}

#[derive(Debug)]
struct Node {
    rules: Vec<(String, Rule)>,
    enabled: Enabled,
    fields: Vec<(String, NodeId)>,
    children: Vec<(String, NodeId)>,
    every: Option<Aggregate>,
    some: Option<Aggregate>,
    parent: Option<NodeId>,
    key: Option<Key>,
    is_valid: bool,
    is_self_valid: bool,
    is_dirty: bool,
    errors: ErrorList,
}

impl Node {
    fn aggregate(&self, kind: Kind) -> Option<&Aggregate> {
        match kind {
            Kind::Every => self.every.as_ref(),
            Kind::Some => self.some.as_ref(),
        }
    }

    fn aggregate_mut(&mut self, kind: Kind) -> Option<&mut Aggregate> {
        match kind {
            Kind::Every => self.every.as_mut(),
            Kind::Some => self.some.as_mut(),
        }
    }

    fn instances(&self, kind: Kind) -> Option<&Instances> {
        self.aggregate(kind)?.instances.as_ref()
    }

    fn clear_state(&mut self) {
        self.errors.clear();
        self.is_valid = true;
        self.is_self_valid = true;
        self.is_dirty = false;
    }

    fn descendants(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.fields.iter().map(|(_, id)| *id).collect();
        ids.extend(self.children.iter().map(|(_, id)| *id));
        for kind in [Kind::Every, Kind::Some] {
            if let Some(instances) = self.instances(kind) {
                ids.extend(instances.ids());
            }
        }
        ids
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Step of a lookup path, resolved against one node.
enum Step {
    Field(NodeId),
    Child(NodeId),
    Instance(Kind, Option<KeyGetter>),
    Missing,
}

fn find(entries: &[(String, NodeId)], name: &str) -> Option<NodeId> {
    entries.iter().find(|(n, _)| n == name).map(|(_, id)| *id)
}

/// Keyed elements of an array or object value; `None` for anything else.
fn entries<'v>(value: &'v Value, key_getter: Option<&KeyGetter>) -> Option<Vec<(Key, &'v Value)>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let key = key_getter.map_or_else(|| Key::from(i), |g| g.key_of(item));
                    (key, item)
                })
                .collect(),
        ),
        Value::Object(map) => Some(map.iter().map(|(k, item)| (Key::from(k), item)).collect()),
        _ => None,
    }
}

/// The element of `collection` an instance keyed `key` is tested against.
fn element<'v>(collection: &'v Value, key: &Key, key_getter: Option<&KeyGetter>) -> &'v Value {
    match (collection, key_getter) {
        (Value::Array(items), Some(getter)) => items
            .iter()
            .find(|item| getter.key_of(item) == *key)
            .unwrap_or(&Value::Null),
        _ => path::get_or_null(collection, slice::from_ref(key)),
    }
}

/// A mounted [`Validation`] with its validation state.
///
/// ```
/// use formcheck::{Validation, ValidationTree};
/// use serde_json::json;
///
/// let mut tree = ValidationTree::new(
///     Validation::new().add_every_by(|| Validation::new().add_field("attr", Validation::new().required()), "id"),
/// );
/// let list = json!([{ "id": 22, "attr": "asd" }, { "id": 11, "attr": null }]);
/// assert!(!tree.test_root(&list));
///
/// let root = tree.root_id();
/// let attr = tree.get(root, &list, &[11.into(), "attr".into()]).unwrap();
/// assert!(tree.node(attr).unwrap().is_invalid());
/// ```
#[derive(Debug)]
pub struct ValidationTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl From<Validation> for ValidationTree {
    fn from(root: Validation) -> Self {
        Self::new(root)
    }
}

impl ValidationTree {
    pub fn new(root: Validation) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
        };
        tree.root = tree.insert(root, None, None);
        tree
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef { tree: self, id: self.root, node: self.at(self.root) }
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.lookup(id).map(|node| NodeRef { tree: self, id, node })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.lookup(id).is_some()
    }

    /// Number of live nodes, instances included.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    /// Always false: a tree holds at least its root.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Test the root against `value`. Returns whether the whole tree passed.
    pub fn test_root(&mut self, value: &Value) -> bool {
        let root = self.root;
        self.run(root, value);
        let node = self.at(root);
        debug!(valid = node.is_valid, errors = node.errors.errors.len(), "tested form");
        node.is_valid
    }

    /// Test the node `id` against `value`, then refresh every ancestor's
    /// errors. `value` is the value at this node, not at the root.
    pub fn test(&mut self, id: NodeId, value: &Value) -> Result<bool> {
        self.check(id)?;
        self.run(id, value);
        self.revalidate_ancestors(id);
        let node = self.at(id);
        debug!(node = %id, valid = node.is_valid, errors = node.errors.errors.len(), "tested node");
        Ok(node.is_valid)
    }

    /// Return `id` and its whole subtree to the untested state.
    pub fn reset(&mut self, id: NodeId) -> Result<()> {
        self.check(id)?;
        self.clear(id);
        self.revalidate_ancestors(id);
        Ok(())
    }

    /// Resolve `keys` from `id` to the node validating that position.
    ///
    /// `value` is the data at `id`; it decides which element a keyed
    /// instance stands for. Missing every/some instances are created.
    pub fn get(&mut self, id: NodeId, value: &Value, keys: &[Key]) -> Result<NodeId> {
        self.locate(id, value, keys).map(|(node, _)| node)
    }

    /// Like [`get`](Self::get), also returning the value found at `keys`.
    pub fn locate<'v>(&mut self, id: NodeId, value: &'v Value, keys: &[Key]) -> Result<(NodeId, &'v Value)> {
        self.check(id)?;
        let mut node = id;
        let mut current = value;
        for key in keys {
            match self.step(node, key) {
                Step::Field(field) => {
                    node = field;
                    current = path::get_or_null(current, slice::from_ref(key));
                }
                Step::Child(child) => node = child,
                Step::Instance(kind, key_getter) => {
                    current = element(current, key, key_getter.as_ref());
                    node = self.instance(node, kind, key.clone())?;
                }
                Step::Missing => return Err(ValidationError::PathNotFound { key: key.clone() }),
            }
        }
        Ok((node, current))
    }

    /// The every-instance of `id` keyed `key`, created if absent.
    pub fn get_every(&mut self, id: NodeId, key: impl Into<Key>) -> Result<NodeId> {
        self.instance(id, Kind::Every, key.into())
    }

    /// The some-instance of `id` keyed `key`, created if absent.
    pub fn get_some(&mut self, id: NodeId, key: impl Into<Key>) -> Result<NodeId> {
        self.instance(id, Kind::Some, key.into())
    }

    /// Keys from the root down to `id`. Children contribute no key.
    pub fn full_path(&self, id: NodeId) -> Result<Path> {
        self.check(id)?;
        Ok(self.path_of(id))
    }

    /// Record an externally detected failure on `id`, as if one of its rules
    /// had failed, and propagate it upward.
    pub fn add_rule_error(
        &mut self,
        id: NodeId,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<()> {
        self.check(id)?;
        let node = self.at_mut(id);
        let error = FieldError {
            rule: rule.into(),
            path: Vec::new(),
            message: message.into(),
            from_key: node.key.clone(),
        };
        node.errors.push(error, Origin::Own);
        node.is_self_valid = false;
        node.is_valid = false;
        self.revalidate_ancestors(id);
        Ok(())
    }

    fn lookup(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn check(&self, id: NodeId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(ValidationError::UnknownNode(id))
        }
    }

    // Ids reachable from the tree's own links are always live.
    fn at(&self, id: NodeId) -> &Node {
        match self.lookup(id) {
            Some(node) => node,
            None => unreachable!("node {id} is not live"),
        }
    }

    fn at_mut(&mut self, id: NodeId) -> &mut Node {
        match self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
        {
            Some(node) => node,
            None => unreachable!("node {id} is not live"),
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.node = Some(node);
                return NodeId { index, generation: slot.generation };
            }
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, node: Some(node) });
        NodeId { index, generation: 0 }
    }

    fn insert(&mut self, v: Validation, parent: Option<NodeId>, key: Option<Key>) -> NodeId {
        let Validation { rules, enabled, fields, children, every, some, .. } = v;
        let id = self.alloc(Node {
            rules,
            enabled,
            fields: Vec::new(),
            children: Vec::new(),
            every: every.map(Aggregate::from),
            some: some.map(Aggregate::from),
            parent,
            key,
            is_valid: true,
            is_self_valid: true,
            is_dirty: false,
            errors: ErrorList::default(),
        });
        let fields = fields
            .into_iter()
            .map(|(name, field)| {
                let key = Key::from(&name);
                (name, self.insert(field, Some(id), Some(key)))
            })
            .collect();
        let children = children
            .into_iter()
            .map(|(name, child)| (name, self.insert(child, Some(id), None)))
            .collect();
        let node = self.at_mut(id);
        node.fields = fields;
        node.children = children;
        id
    }

    fn release(&mut self, id: NodeId) {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return;
        };
        if slot.generation != id.generation {
            return;
        }
        let Some(node) = slot.node.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        for descendant in node.descendants() {
            self.release(descendant);
        }
    }

    fn path_of(&self, id: NodeId) -> Path {
        let mut keys = Vec::new();
        let mut current = Some(id);
        while let Some(cursor) = current {
            let node = self.at(cursor);
            keys.extend(node.key.clone());
            current = node.parent;
        }
        keys.reverse();
        keys
    }

    fn step(&self, id: NodeId, key: &Key) -> Step {
        let node = self.at(id);
        let name = key.to_string();
        if let Some(field) = find(&node.fields, &name) {
            Step::Field(field)
        } else if let Some(child) = find(&node.children, &name) {
            Step::Child(child)
        } else if let Some(every) = &node.every {
            Step::Instance(Kind::Every, every.template.key_getter.clone())
        } else if let Some(some) = &node.some {
            Step::Instance(Kind::Some, some.template.key_getter.clone())
        } else {
            Step::Missing
        }
    }

    fn instance(&mut self, id: NodeId, kind: Kind, key: Key) -> Result<NodeId> {
        self.check(id)?;
        let aggregate = self.at_mut(id).aggregate_mut(kind).ok_or_else(|| kind.missing())?;
        if let Some(existing) = aggregate.instances.as_ref().and_then(|i| i.get(&key)) {
            return Ok(existing);
        }
        let factory = Rc::clone(&aggregate.template.factory);
        let instance = self.insert(factory(), Some(id), Some(key.clone()));
        if let Some(aggregate) = self.at_mut(id).aggregate_mut(kind) {
            aggregate
                .instances
                .get_or_insert_with(Instances::default)
                .insert(key, instance);
        }
        Ok(instance)
    }

    fn run(&mut self, id: NodeId, value: &Value) {
        let full_path = self.path_of(id);
        let node = self.at_mut(id);
        node.clear_state();
        node.is_dirty = true;
        if !node.enabled.check(value, &full_path) {
            trace!(node = %id, path = ?full_path, "node disabled");
            return;
        }

        let failures: Vec<FieldError> = node
            .rules
            .iter()
            .filter_map(|(name, rule)| {
                let message = rule.failure(value, &full_path)?;
                Some(FieldError {
                    rule: name.clone(),
                    path: Vec::new(),
                    message,
                    from_key: node.key.clone(),
                })
            })
            .collect();
        if !failures.is_empty() {
            node.is_self_valid = false;
        }
        for error in failures {
            trace!(node = %id, path = ?full_path, rule = %error.rule, "rule failed");
            node.errors.push(error, Origin::Own);
        }

        if let Some(verdicts) = self.sync_instances(id, Kind::Every, value) {
            let node = self.at_mut(id);
            for verdict in verdicts {
                node.errors.splice(Origin::Node(verdict.instance), verdict.errors);
            }
        }
        if let Some(verdicts) = self.sync_instances(id, Kind::Some, value) {
            self.settle_some(id, verdicts);
        }

        if !value.is_null() {
            let node = self.at(id);
            let fields = node.fields.clone();
            let children = node.children.clone();
            for (name, field) in fields {
                self.run(field, path::get_or_null(value, &[Key::from(name)]));
                self.merge(id, field, Origin::Node(field));
            }
            for (_, child) in children {
                self.run(child, value);
                self.merge(id, child, Origin::Node(child));
            }
        }
        self.settle(id);
    }

    /// Test one instance per element of `value`, reusing instances by key
    /// and freeing the ones whose key is gone. Elements sharing a key run the
    /// same instance in turn and pool their results into one verdict.
    /// Returns the verdicts in element order, or `None` when `value` is not
    /// a collection.
    fn sync_instances(&mut self, id: NodeId, kind: Kind, value: &Value) -> Option<Vec<Verdict>> {
        let aggregate = self.at_mut(id).aggregate_mut(kind)?;
        let Some(elements) = entries(value, aggregate.template.key_getter.as_ref()) else {
            let stale = aggregate.instances.take();
            for instance in stale.iter().flat_map(Instances::ids) {
                self.release(instance);
            }
            return None;
        };
        let factory = Rc::clone(&aggregate.template.factory);
        let mut previous = aggregate.instances.take().unwrap_or_default();
        let mut current = Instances::default();
        let mut verdicts: Vec<Verdict> = Vec::with_capacity(elements.len());
        let mut slots: HashMap<NodeId, usize> = HashMap::new();

        for (key, item) in elements {
            let instance = match current.get(&key) {
                Some(seen) => seen,
                None => {
                    let instance = match previous.take(&key) {
                        Some(kept) => {
                            let node = self.at_mut(kept);
                            node.key = Some(key.clone());
                            node.parent = Some(id);
                            kept
                        }
                        None => self.insert(factory(), Some(id), Some(key.clone())),
                    };
                    current.insert(key, instance);
                    instance
                }
            };
            self.run(instance, item);
            let verdict = self.verdict(instance);
            match slots.get(&instance) {
                Some(&at) => verdicts[at].absorb(verdict),
                None => {
                    slots.insert(instance, verdicts.len());
                    verdicts.push(verdict);
                }
            }
        }

        let stale: Vec<NodeId> = previous.ids().collect();
        if !stale.is_empty() {
            debug!(node = %id, pruned = stale.len(), "freed stale instances");
        }
        for instance in stale {
            self.release(instance);
        }
        if let Some(aggregate) = self.at_mut(id).aggregate_mut(kind) {
            aggregate.instances = Some(current);
        }
        Some(verdicts)
    }

    fn verdict(&self, instance: NodeId) -> Verdict {
        let node = self.at(instance);
        Verdict {
            instance,
            passed: node.is_valid,
            errors: node.errors.errors.iter().map(|e| e.through(node.key.as_ref())).collect(),
        }
    }

    /// Copy the errors of `child` into `parent` under `origin`, prefixed with
    /// the child's key.
    fn merge(&mut self, parent: NodeId, child: NodeId, origin: Origin) {
        let node = self.at(child);
        let lifted = node
            .errors
            .errors
            .iter()
            .map(|e| e.through(node.key.as_ref()))
            .collect();
        self.at_mut(parent).errors.splice(origin, lifted);
    }

    /// Settle the some-aggregate of `id`: clean when any verdict passed,
    /// otherwise carrying every failure, or a single `some` error when
    /// nothing was tested.
    fn settle_some(&mut self, id: NodeId, verdicts: Vec<Verdict>) {
        let node = self.at_mut(id);
        let errors = if verdicts.iter().any(|v| v.passed) {
            Vec::new()
        } else if verdicts.is_empty() {
            vec![FieldError {
                rule: "some".to_string(),
                path: Vec::new(),
                message: "some".to_string(),
                from_key: node.key.clone(),
            }]
        } else {
            verdicts.into_iter().flat_map(|v| v.errors).collect()
        };
        node.errors.splice(Origin::Some, errors);
    }

    /// Verdicts of the some-instances of `id` that have been tested.
    /// Instances only materialised by a lookup do not vote.
    fn tested_some_verdicts(&self, id: NodeId) -> Vec<Verdict> {
        self.at(id)
            .instances(Kind::Some)
            .into_iter()
            .flat_map(Instances::ids)
            .filter(|instance| self.at(*instance).is_dirty)
            .map(|instance| self.verdict(instance))
            .collect()
    }

    fn settle(&mut self, id: NodeId) {
        let node = self.at_mut(id);
        node.is_valid = node.errors.is_empty();
    }

    fn is_some_instance(&self, parent: NodeId, child: NodeId) -> bool {
        let Some(key) = self.at(child).key.as_ref() else {
            return false;
        };
        self.at(parent)
            .instances(Kind::Some)
            .and_then(|instances| instances.get(key))
            == Some(child)
    }

    fn revalidate_ancestors(&mut self, id: NodeId) {
        let mut child = id;
        while let Some(parent) = self.at(child).parent {
            if self.is_some_instance(parent, child) {
                let verdicts = self.tested_some_verdicts(parent);
                self.settle_some(parent, verdicts);
            } else {
                self.merge(parent, child, Origin::Node(child));
            }
            self.settle(parent);
            child = parent;
        }
    }

    fn clear(&mut self, id: NodeId) {
        let node = self.at_mut(id);
        node.clear_state();
        for descendant in node.descendants() {
            self.clear(descendant);
        }
    }
}

/// Read-only view of one node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a ValidationTree,
    id: NodeId,
    node: &'a Node,
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("key", &self.node.key)
            .field("is_valid", &self.node.is_valid)
            .field("errors", &self.node.errors.errors)
            .finish()
    }
}

impl<'a> NodeRef<'a> {
    fn at(&self, id: NodeId) -> NodeRef<'a> {
        NodeRef { tree: self.tree, id, node: self.tree.at(id) }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Field name or element key; `None` for the root and for children.
    pub fn key(&self) -> Option<&'a Key> {
        self.node.key.as_ref()
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.node.parent.map(|id| self.at(id))
    }

    pub fn full_path(&self) -> Path {
        self.tree.path_of(self.id)
    }

    pub fn is_valid(&self) -> bool {
        self.node.is_valid
    }

    pub fn is_invalid(&self) -> bool {
        !self.node.is_valid
    }

    /// Whether this node's own rules passed, regardless of descendants.
    pub fn is_self_valid(&self) -> bool {
        self.node.is_self_valid
    }

    pub fn is_self_invalid(&self) -> bool {
        !self.node.is_self_valid
    }

    /// Tested since creation or the last reset.
    pub fn is_dirty(&self) -> bool {
        self.node.is_dirty
    }

    /// Own failures plus every descendant failure, paths relative to here.
    pub fn errors(&self) -> &'a [FieldError] {
        &self.node.errors.errors
    }

    /// Errors whose `from_key` is this node's own key.
    pub fn self_errors(&self) -> impl Iterator<Item = &'a FieldError> + 'a {
        let key = self.node.key.as_ref();
        self.node
            .errors
            .errors
            .iter()
            .filter(move |e| e.from_key.as_ref() == key)
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.node.rules.iter().map(|(name, _)| name.as_str())
    }

    pub fn field(&self, name: &str) -> Option<NodeRef<'a>> {
        find(&self.node.fields, name).map(|id| self.at(id))
    }

    pub fn child(&self, name: &str) -> Option<NodeRef<'a>> {
        find(&self.node.children, name).map(|id| self.at(id))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'a str, NodeRef<'a>)> + 'a {
        let this = *self;
        self.node.fields.iter().map(move |(name, id)| (name.as_str(), this.at(*id)))
    }

    pub fn children(&self) -> impl Iterator<Item = (&'a str, NodeRef<'a>)> + 'a {
        let this = *self;
        self.node.children.iter().map(move |(name, id)| (name.as_str(), this.at(*id)))
    }

    /// The existing every-instance keyed `key`. Use
    /// [`ValidationTree::get_every`] to create one.
    pub fn every(&self, key: impl Into<Key>) -> Option<NodeRef<'a>> {
        self.node
            .instances(Kind::Every)?
            .get(&key.into())
            .map(|id| self.at(id))
    }

    pub fn some(&self, key: impl Into<Key>) -> Option<NodeRef<'a>> {
        self.node
            .instances(Kind::Some)?
            .get(&key.into())
            .map(|id| self.at(id))
    }

    /// Current every-instances in element order.
    pub fn every_instances(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let this = *self;
        self.node
            .instances(Kind::Every)
            .into_iter()
            .flat_map(Instances::ids)
            .map(move |id| this.at(id))
    }

    pub fn some_instances(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let this = *self;
        self.node
            .instances(Kind::Some)
            .into_iter()
            .flat_map(Instances::ids)
            .map(move |id| this.at(id))
    }
}
