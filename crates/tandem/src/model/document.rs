//! The element tree.
//!
//! Elements live in an arena keyed by [`ElementId`]; containers hold the ids
//! of their children and every element knows its parent. Operations address
//! elements by id, so an edit keeps working however the element moved.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::Value;
use tandem_path::{Path, PathElement};

use crate::error::ModelError;
use crate::model::applied::AppliedOperation;
use crate::model::value::{DataKind, DataValue, ElementId};
use crate::ot::index::inverse_permutation;
use crate::ot::ops::{DiscreteOperation, OpBody, Operation, ValueFamily};

#[derive(Debug, Clone)]
enum NodeValue {
    Null,
    String(String),
    Number(f64),
    Boolean(bool),
    Date(i64),
    Array(Vec<ElementId>),
    Object(IndexMap<String, ElementId>),
}

impl NodeValue {
    fn type_name(&self) -> &'static str {
        match self {
            NodeValue::Null => "null",
            NodeValue::String(_) => "string",
            NodeValue::Number(_) => "number",
            NodeValue::Boolean(_) => "boolean",
            NodeValue::Date(_) => "date",
            NodeValue::Array(_) => "array",
            NodeValue::Object(_) => "object",
        }
    }

    fn family(&self) -> Option<ValueFamily> {
        match self {
            NodeValue::Null => None,
            NodeValue::String(_) => Some(ValueFamily::String),
            NodeValue::Number(_) => Some(ValueFamily::Number),
            NodeValue::Boolean(_) => Some(ValueFamily::Boolean),
            NodeValue::Date(_) => Some(ValueFamily::Date),
            NodeValue::Array(_) => Some(ValueFamily::Array),
            NodeValue::Object(_) => Some(ValueFamily::Object),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<ElementId>,
    value: NodeValue,
}

/// An in-memory document.
#[derive(Debug, Clone)]
pub struct Document {
    root: ElementId,
    nodes: HashMap<ElementId, Node>,
}

impl Document {
    /// Build a document whose root element is `root`.
    ///
    /// # Errors
    ///
    /// [`ModelError::DuplicateId`] if an id occurs twice in `root`.
    pub fn new(root: DataValue) -> Result<Self, ModelError> {
        let mut doc = Self {
            root: root.id.clone(),
            nodes: HashMap::new(),
        };
        doc.check_fresh(&root, &HashSet::new())?;
        doc.attach(&root, None);
        Ok(doc)
    }

    pub fn root_id(&self) -> &ElementId {
        &self.root
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.nodes.contains_key(id)
    }

    /// The subtree rooted at `id`, or `None` if no such element is attached.
    pub fn value(&self, id: &ElementId) -> Option<DataValue> {
        let node = self.nodes.get(id)?;
        let kind = match &node.value {
            NodeValue::Null => DataKind::Null,
            NodeValue::String(s) => DataKind::String(s.clone()),
            NodeValue::Number(n) => DataKind::Number(*n),
            NodeValue::Boolean(b) => DataKind::Boolean(*b),
            NodeValue::Date(ms) => DataKind::Date(*ms),
            NodeValue::Array(items) => {
                DataKind::Array(items.iter().filter_map(|child| self.value(child)).collect())
            }
            NodeValue::Object(props) => DataKind::Object(
                props
                    .iter()
                    .filter_map(|(k, child)| Some((k.clone(), self.value(child)?)))
                    .collect(),
            ),
        };
        Some(DataValue::new(id.clone(), kind))
    }

    /// The whole document.
    pub fn snapshot(&self) -> DataValue {
        self.value(&self.root)
            .unwrap_or_else(|| DataValue::new(self.root.clone(), DataKind::Null))
    }

    pub fn to_json(&self) -> Value {
        self.snapshot().to_json()
    }

    /// Structural address of `id` from the root.
    pub fn path_of(&self, id: &ElementId) -> Option<Path> {
        let mut path = Vec::new();
        let mut current = id;
        loop {
            let node = self.nodes.get(current)?;
            let Some(parent) = &node.parent else {
                break;
            };
            let step = match &self.nodes.get(parent)?.value {
                NodeValue::Array(items) => {
                    PathElement::Index(items.iter().position(|child| child == current)?)
                }
                NodeValue::Object(props) => PathElement::Key(
                    props
                        .iter()
                        .find(|(_, child)| *child == current)
                        .map(|(k, _)| k.clone())?,
                ),
                _ => return None,
            };
            path.push(step);
            current = parent;
        }
        path.reverse();
        Some(path)
    }

    /// Element at `path`, if it exists.
    pub fn resolve(&self, path: &[PathElement]) -> Option<&ElementId> {
        let mut current = &self.root;
        for step in path {
            current = match (&self.nodes.get(current)?.value, step) {
                (NodeValue::Array(items), PathElement::Index(i)) => items.get(*i)?,
                (NodeValue::Object(props), PathElement::Key(k)) => props.get(k)?,
                // Pointer syntax cannot tell "0" the key from 0 the index.
                (NodeValue::Object(props), PathElement::Index(i)) => props.get(&i.to_string())?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Apply an operation.
    ///
    /// A compound operation is atomic: if one of its parts fails, the parts
    /// already applied are rolled back and the document is left unchanged.
    /// `noOp` parts and parts whose target left the tree produce no record.
    ///
    /// # Errors
    ///
    /// See [`Document::apply_discrete`].
    pub fn apply(&mut self, operation: &Operation) -> Result<Vec<AppliedOperation>, ModelError> {
        let mut applied: Vec<AppliedOperation> = Vec::new();
        for op in operation.discrete_ops() {
            match self.apply_discrete(op) {
                Ok(Some(record)) => applied.push(record),
                Ok(None) => {}
                Err(err) => {
                    self.roll_back(&applied);
                    return Err(err);
                }
            }
        }
        Ok(applied)
    }

    fn roll_back(&mut self, applied: &[AppliedOperation]) {
        for record in applied.iter().rev() {
            if let Err(err) = self.apply_discrete(&record.inverse) {
                tracing::error!(
                    operation = %record.operation.op_type(),
                    target_id = %record.operation.id(),
                    error = %err,
                    "failed to roll back partially applied operation"
                );
            }
        }
    }

    /// Apply one discrete operation.
    ///
    /// # Errors
    ///
    /// Type mismatches, out-of-bounds indices, missing or existing
    /// properties, reorders of the wrong length and values reusing attached
    /// ids. The document is unchanged on error.
    pub fn apply_discrete(
        &mut self,
        op: &DiscreteOperation,
    ) -> Result<Option<AppliedOperation>, ModelError> {
        if op.is_no_op() {
            return Ok(None);
        }
        let Some(node) = self.nodes.get(op.id()) else {
            tracing::debug!(
                target_id = %op.id(),
                operation = %op.op_type(),
                "target element is not in the tree, skipping"
            );
            return Ok(None);
        };
        if node.value.family() != Some(op.op_type().family()) {
            return Err(ModelError::TypeMismatch {
                operation: op.op_type(),
                id: op.id().clone(),
                found: node.value.type_name(),
            });
        }

        let mut detached = Vec::new();
        let inverse = match op.body() {
            OpBody::ArrayInsert { index, value } => {
                let len = self.items(op)?.len();
                if *index > len {
                    return Err(out_of_bounds(op, *index, len));
                }
                self.check_fresh(value, &HashSet::new())?;
                let child = self.attach(value, Some(op.id().clone()));
                self.items_mut(op)?.insert(*index, child);
                OpBody::ArrayRemove { index: *index }
            }
            OpBody::ArrayRemove { index } => {
                let child = self.item(op, *index)?;
                let removed = self.subtree(&child);
                self.items_mut(op)?.remove(*index);
                self.detach(&child, &mut detached);
                OpBody::ArrayInsert {
                    index: *index,
                    value: removed,
                }
            }
            OpBody::ArrayReplace { index, value } => {
                let child = self.item(op, *index)?;
                let previous = self.subtree(&child);
                self.check_fresh(value, &self.descendants(&child))?;
                self.detach(&child, &mut detached);
                let next = self.attach(value, Some(op.id().clone()));
                self.items_mut(op)?[*index] = next;
                OpBody::ArrayReplace {
                    index: *index,
                    value: previous,
                }
            }
            OpBody::ArrayMove { from, to } => {
                let len = self.items(op)?.len();
                if *from >= len || *to >= len {
                    return Err(out_of_bounds(op, (*from).max(*to), len));
                }
                let items = self.items_mut(op)?;
                let moved = items.remove(*from);
                items.insert(*to, moved);
                OpBody::ArrayMove {
                    from: *to,
                    to: *from,
                }
            }
            OpBody::ArrayReorder { order } => {
                let items = self.items_mut(op)?;
                if order.len() != items.len() {
                    return Err(ModelError::ReorderLength {
                        id: op.id().clone(),
                        order: order.len(),
                        length: items.len(),
                    });
                }
                let reordered: Vec<ElementId> = order.iter().map(|&k| items[k].clone()).collect();
                *items = reordered;
                OpBody::ArrayReorder {
                    order: inverse_permutation(order),
                }
            }
            OpBody::ArraySet { value } => {
                let previous = self.items(op)?.clone();
                let mut reusable = HashSet::new();
                for child in &previous {
                    reusable.extend(self.descendants(child));
                }
                for item in value {
                    self.check_fresh(item, &reusable)?;
                }
                check_unique(value.iter())?;
                let old_values = previous.iter().filter_map(|child| self.value(child)).collect();
                for child in &previous {
                    self.detach(child, &mut detached);
                }
                let children = value
                    .iter()
                    .map(|item| self.attach(item, Some(op.id().clone())))
                    .collect();
                *self.items_mut(op)? = children;
                OpBody::ArraySet { value: old_values }
            }

            OpBody::StringInsert { index, value } => {
                let text = self.text_mut(op)?;
                let len = text.chars().count();
                if *index > len {
                    return Err(out_of_bounds(op, *index, len));
                }
                let at = byte_offset(text, *index);
                text.insert_str(at, value);
                OpBody::StringRemove {
                    index: *index,
                    value: value.clone(),
                }
            }
            OpBody::StringRemove { index, value } => {
                let text = self.text_mut(op)?;
                let len = text.chars().count();
                let count = value.chars().count();
                if *index + count > len {
                    return Err(out_of_bounds(op, *index + count, len));
                }
                let start = byte_offset(text, *index);
                let end = byte_offset(text, *index + count);
                let removed: String = text.drain(start..end).collect();
                OpBody::StringInsert {
                    index: *index,
                    value: removed,
                }
            }
            OpBody::StringSet { value } => {
                let text = self.text_mut(op)?;
                let previous = std::mem::replace(text, value.clone());
                OpBody::StringSet { value: previous }
            }

            OpBody::ObjectAddProperty { prop, value } => {
                if self.props(op)?.contains_key(prop) {
                    return Err(ModelError::PropertyExists {
                        id: op.id().clone(),
                        prop: prop.clone(),
                    });
                }
                self.check_fresh(value, &HashSet::new())?;
                let child = self.attach(value, Some(op.id().clone()));
                self.props_mut(op)?.insert(prop.clone(), child);
                OpBody::ObjectRemoveProperty { prop: prop.clone() }
            }
            OpBody::ObjectSetProperty { prop, value } => {
                let child = self.prop(op, prop)?;
                let previous = self.subtree(&child);
                self.check_fresh(value, &self.descendants(&child))?;
                self.detach(&child, &mut detached);
                let next = self.attach(value, Some(op.id().clone()));
                self.props_mut(op)?.insert(prop.clone(), next);
                OpBody::ObjectSetProperty {
                    prop: prop.clone(),
                    value: previous,
                }
            }
            OpBody::ObjectRemoveProperty { prop } => {
                let child = self.prop(op, prop)?;
                let previous = self.subtree(&child);
                self.props_mut(op)?.shift_remove(prop);
                self.detach(&child, &mut detached);
                OpBody::ObjectAddProperty {
                    prop: prop.clone(),
                    value: previous,
                }
            }
            OpBody::ObjectSet { value } => {
                let previous = self.props(op)?.clone();
                let mut reusable = HashSet::new();
                for child in previous.values() {
                    reusable.extend(self.descendants(child));
                }
                for item in value.values() {
                    self.check_fresh(item, &reusable)?;
                }
                check_unique(value.values())?;
                let old_values = previous
                    .iter()
                    .filter_map(|(k, child)| Some((k.clone(), self.value(child)?)))
                    .collect();
                for child in previous.values() {
                    self.detach(child, &mut detached);
                }
                let props = value
                    .iter()
                    .map(|(k, item)| (k.clone(), self.attach(item, Some(op.id().clone()))))
                    .collect();
                *self.props_mut(op)? = props;
                OpBody::ObjectSet { value: old_values }
            }

            OpBody::NumberDelta { value } => match self.scalar_mut(op) {
                Some(NodeValue::Number(n)) => {
                    *n += value;
                    OpBody::NumberDelta { value: -value }
                }
                _ => return Err(self.mismatch(op)),
            },
            OpBody::NumberSet { value } => match self.scalar_mut(op) {
                Some(NodeValue::Number(n)) => OpBody::NumberSet {
                    value: std::mem::replace(n, *value),
                },
                _ => return Err(self.mismatch(op)),
            },
            OpBody::BooleanSet { value } => match self.scalar_mut(op) {
                Some(NodeValue::Boolean(b)) => OpBody::BooleanSet {
                    value: std::mem::replace(b, *value),
                },
                _ => return Err(self.mismatch(op)),
            },
            OpBody::DateSet { value } => match self.scalar_mut(op) {
                Some(NodeValue::Date(ms)) => OpBody::DateSet {
                    value: std::mem::replace(ms, *value),
                },
                _ => return Err(self.mismatch(op)),
            },
        };

        tracing::trace!(
            target_id = %op.id(),
            operation = %op.op_type(),
            detached = detached.len(),
            "applied operation"
        );
        Ok(Some(AppliedOperation::new(
            op.clone(),
            op.with_body(inverse),
            detached,
        )))
    }

    // ── Arena helpers ─────────────────────────────────────────────────────

    /// Insert `value` and its descendants; returns the id of `value`.
    fn attach(&mut self, value: &DataValue, parent: Option<ElementId>) -> ElementId {
        let id = value.id.clone();
        let node_value = match &value.kind {
            DataKind::Null => NodeValue::Null,
            DataKind::String(s) => NodeValue::String(s.clone()),
            DataKind::Number(n) => NodeValue::Number(*n),
            DataKind::Boolean(b) => NodeValue::Boolean(*b),
            DataKind::Date(ms) => NodeValue::Date(*ms),
            DataKind::Array(items) => NodeValue::Array(
                items
                    .iter()
                    .map(|item| self.attach(item, Some(id.clone())))
                    .collect(),
            ),
            DataKind::Object(props) => NodeValue::Object(
                props
                    .iter()
                    .map(|(k, item)| (k.clone(), self.attach(item, Some(id.clone()))))
                    .collect(),
            ),
        };
        self.nodes.insert(
            id.clone(),
            Node {
                parent,
                value: node_value,
            },
        );
        id
    }

    /// Remove `id` and its descendants, recording every removed id.
    fn detach(&mut self, id: &ElementId, detached: &mut Vec<ElementId>) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        detached.push(id.clone());
        match node.value {
            NodeValue::Array(items) => items.iter().for_each(|child| self.detach(child, detached)),
            NodeValue::Object(props) => props.values().for_each(|child| self.detach(child, detached)),
            _ => {}
        }
    }

    /// Ids of `id` and everything below it.
    fn descendants(&self, id: &ElementId) -> HashSet<ElementId> {
        let mut ids = HashSet::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                match &node.value {
                    NodeValue::Array(items) => stack.extend(items.iter().cloned()),
                    NodeValue::Object(props) => stack.extend(props.values().cloned()),
                    _ => {}
                }
                ids.insert(current);
            }
        }
        ids
    }

    /// Reject values whose ids repeat or are already attached (except for
    /// ids in `reusable`, which are about to be detached).
    fn check_fresh(
        &self,
        value: &DataValue,
        reusable: &HashSet<ElementId>,
    ) -> Result<(), ModelError> {
        let mut seen = HashSet::new();
        let mut duplicate = None;
        value.for_each(&mut |v| {
            if duplicate.is_some() {
                return;
            }
            let attached = self.nodes.contains_key(&v.id) && !reusable.contains(&v.id);
            if attached || !seen.insert(v.id.clone()) {
                duplicate = Some(v.id.clone());
            }
        });
        match duplicate {
            Some(id) => Err(ModelError::DuplicateId(id)),
            None => Ok(()),
        }
    }

    fn subtree(&self, id: &ElementId) -> DataValue {
        self.value(id)
            .unwrap_or_else(|| DataValue::new(id.clone(), DataKind::Null))
    }

    fn mismatch(&self, op: &DiscreteOperation) -> ModelError {
        ModelError::TypeMismatch {
            operation: op.op_type(),
            id: op.id().clone(),
            found: self
                .nodes
                .get(op.id())
                .map_or("missing", |node| node.value.type_name()),
        }
    }

    fn scalar_mut(&mut self, op: &DiscreteOperation) -> Option<&mut NodeValue> {
        self.nodes.get_mut(op.id()).map(|node| &mut node.value)
    }

    fn items(&self, op: &DiscreteOperation) -> Result<&Vec<ElementId>, ModelError> {
        match self.nodes.get(op.id()).map(|node| &node.value) {
            Some(NodeValue::Array(items)) => Ok(items),
            _ => Err(self.mismatch(op)),
        }
    }

    fn items_mut(&mut self, op: &DiscreteOperation) -> Result<&mut Vec<ElementId>, ModelError> {
        let err = self.mismatch(op);
        match self.nodes.get_mut(op.id()).map(|node| &mut node.value) {
            Some(NodeValue::Array(items)) => Ok(items),
            _ => Err(err),
        }
    }

    fn item(&self, op: &DiscreteOperation, index: usize) -> Result<ElementId, ModelError> {
        let items = self.items(op)?;
        items
            .get(index)
            .cloned()
            .ok_or_else(|| out_of_bounds(op, index, items.len()))
    }

    fn props(&self, op: &DiscreteOperation) -> Result<&IndexMap<String, ElementId>, ModelError> {
        match self.nodes.get(op.id()).map(|node| &node.value) {
            Some(NodeValue::Object(props)) => Ok(props),
            _ => Err(self.mismatch(op)),
        }
    }

    fn props_mut(
        &mut self,
        op: &DiscreteOperation,
    ) -> Result<&mut IndexMap<String, ElementId>, ModelError> {
        let err = self.mismatch(op);
        match self.nodes.get_mut(op.id()).map(|node| &mut node.value) {
            Some(NodeValue::Object(props)) => Ok(props),
            _ => Err(err),
        }
    }

    fn prop(&self, op: &DiscreteOperation, prop: &str) -> Result<ElementId, ModelError> {
        self.props(op)?
            .get(prop)
            .cloned()
            .ok_or_else(|| ModelError::PropertyNotFound {
                id: op.id().clone(),
                prop: prop.to_string(),
            })
    }

    fn text_mut(&mut self, op: &DiscreteOperation) -> Result<&mut String, ModelError> {
        let err = self.mismatch(op);
        match self.nodes.get_mut(op.id()).map(|node| &mut node.value) {
            Some(NodeValue::String(text)) => Ok(text),
            _ => Err(err),
        }
    }
}

fn out_of_bounds(op: &DiscreteOperation, index: usize, length: usize) -> ModelError {
    ModelError::IndexOutOfBounds {
        operation: op.op_type(),
        id: op.id().clone(),
        index,
        length,
    }
}

/// Byte offset of the `index`-th scalar value of `text`.
fn byte_offset(text: &str, index: usize) -> usize {
    text.char_indices()
        .nth(index)
        .map_or(text.len(), |(offset, _)| offset)
}

/// Ids must not repeat across sibling values of one set.
fn check_unique<'a>(values: impl Iterator<Item = &'a DataValue>) -> Result<(), ModelError> {
    let mut seen = HashSet::new();
    for value in values {
        let mut duplicate = None;
        value.for_each(&mut |v| {
            if duplicate.is_none() && !seen.insert(v.id.clone()) {
                duplicate = Some(v.id.clone());
            }
        });
        if let Some(id) = duplicate {
            return Err(ModelError::DuplicateId(id));
        }
    }
    Ok(())
}
