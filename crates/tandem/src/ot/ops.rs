//! Operation value types.
//!
//! A [`DiscreteOperation`] is a single edit to one element. Operations are
//! values: every transformation builds new instances with
//! [`DiscreteOperation::as_no_op`] or [`DiscreteOperation::with_body`] and the
//! originals are never touched.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::OperationError;
use crate::model::{DataValue, ElementId};

// ── Type tags ─────────────────────────────────────────────────────────────

/// The closed set of discrete operation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationType {
    ArrayInsert,
    ArrayRemove,
    ArrayReplace,
    ArrayMove,
    ArrayReorder,
    ArraySet,
    StringInsert,
    StringRemove,
    StringSet,
    ObjectAddProperty,
    ObjectSetProperty,
    ObjectRemoveProperty,
    ObjectSet,
    NumberDelta,
    NumberSet,
    BooleanSet,
    DateSet,
}

/// The kind of element an operation type applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueFamily {
    Array,
    String,
    Object,
    Number,
    Boolean,
    Date,
}

impl OperationType {
    pub const COUNT: usize = 17;

    pub const ALL: [OperationType; Self::COUNT] = [
        OperationType::ArrayInsert,
        OperationType::ArrayRemove,
        OperationType::ArrayReplace,
        OperationType::ArrayMove,
        OperationType::ArrayReorder,
        OperationType::ArraySet,
        OperationType::StringInsert,
        OperationType::StringRemove,
        OperationType::StringSet,
        OperationType::ObjectAddProperty,
        OperationType::ObjectSetProperty,
        OperationType::ObjectRemoveProperty,
        OperationType::ObjectSet,
        OperationType::NumberDelta,
        OperationType::NumberSet,
        OperationType::BooleanSet,
        OperationType::DateSet,
    ];

    /// Position of this type in [`OperationType::ALL`]; used as a table index.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn family(self) -> ValueFamily {
        use OperationType::*;
        match self {
            ArrayInsert | ArrayRemove | ArrayReplace | ArrayMove | ArrayReorder | ArraySet => {
                ValueFamily::Array
            }
            StringInsert | StringRemove | StringSet => ValueFamily::String,
            ObjectAddProperty | ObjectSetProperty | ObjectRemoveProperty | ObjectSet => {
                ValueFamily::Object
            }
            NumberDelta | NumberSet => ValueFamily::Number,
            BooleanSet => ValueFamily::Boolean,
            DateSet => ValueFamily::Date,
        }
    }

    /// True for the whole-value replacement of each family.
    pub fn is_set(self) -> bool {
        matches!(
            self,
            OperationType::ArraySet
                | OperationType::StringSet
                | OperationType::ObjectSet
                | OperationType::NumberSet
                | OperationType::BooleanSet
                | OperationType::DateSet
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::ArrayInsert => "array_insert",
            OperationType::ArrayRemove => "array_remove",
            OperationType::ArrayReplace => "array_replace",
            OperationType::ArrayMove => "array_move",
            OperationType::ArrayReorder => "array_reorder",
            OperationType::ArraySet => "array_set",
            OperationType::StringInsert => "string_insert",
            OperationType::StringRemove => "string_remove",
            OperationType::StringSet => "string_set",
            OperationType::ObjectAddProperty => "object_add_property",
            OperationType::ObjectSetProperty => "object_set_property",
            OperationType::ObjectRemoveProperty => "object_remove_property",
            OperationType::ObjectSet => "object_set",
            OperationType::NumberDelta => "number_delta",
            OperationType::NumberSet => "number_set",
            OperationType::BooleanSet => "boolean_set",
            OperationType::DateSet => "date_set",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Operation bodies ──────────────────────────────────────────────────────

/// Type-specific fields of a discrete operation.
///
/// String indices and lengths count Unicode scalar values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpBody {
    ArrayInsert { index: usize, value: DataValue },
    ArrayRemove { index: usize },
    ArrayReplace { index: usize, value: DataValue },
    /// Removes the element at `from` and reinserts it so it ends at `to`.
    ArrayMove { from: usize, to: usize },
    /// `result[k] = previous[order[k]]`.
    ArrayReorder { order: Vec<usize> },
    ArraySet { value: Vec<DataValue> },

    StringInsert { index: usize, value: String },
    /// `value` is the removed text; its length is the removal length.
    StringRemove { index: usize, value: String },
    StringSet { value: String },

    ObjectAddProperty { prop: String, value: DataValue },
    ObjectSetProperty { prop: String, value: DataValue },
    ObjectRemoveProperty { prop: String },
    ObjectSet { value: IndexMap<String, DataValue> },

    NumberDelta { value: f64 },
    NumberSet { value: f64 },

    BooleanSet { value: bool },

    /// Milliseconds since the Unix epoch.
    DateSet { value: i64 },
}

impl OpBody {
    pub fn op_type(&self) -> OperationType {
        match self {
            OpBody::ArrayInsert { .. } => OperationType::ArrayInsert,
            OpBody::ArrayRemove { .. } => OperationType::ArrayRemove,
            OpBody::ArrayReplace { .. } => OperationType::ArrayReplace,
            OpBody::ArrayMove { .. } => OperationType::ArrayMove,
            OpBody::ArrayReorder { .. } => OperationType::ArrayReorder,
            OpBody::ArraySet { .. } => OperationType::ArraySet,
            OpBody::StringInsert { .. } => OperationType::StringInsert,
            OpBody::StringRemove { .. } => OperationType::StringRemove,
            OpBody::StringSet { .. } => OperationType::StringSet,
            OpBody::ObjectAddProperty { .. } => OperationType::ObjectAddProperty,
            OpBody::ObjectSetProperty { .. } => OperationType::ObjectSetProperty,
            OpBody::ObjectRemoveProperty { .. } => OperationType::ObjectRemoveProperty,
            OpBody::ObjectSet { .. } => OperationType::ObjectSet,
            OpBody::NumberDelta { .. } => OperationType::NumberDelta,
            OpBody::NumberSet { .. } => OperationType::NumberSet,
            OpBody::BooleanSet { .. } => OperationType::BooleanSet,
            OpBody::DateSet { .. } => OperationType::DateSet,
        }
    }

    fn validate(&self) -> Result<(), OperationError> {
        let op_type = self.op_type();
        let non_finite = |value: f64| OperationError::NonFiniteNumber {
            operation: op_type,
            value,
        };
        match self {
            OpBody::NumberDelta { value } | OpBody::NumberSet { value } => {
                if !value.is_finite() {
                    return Err(non_finite(*value));
                }
            }
            OpBody::ArrayInsert { value, .. }
            | OpBody::ArrayReplace { value, .. }
            | OpBody::ObjectAddProperty { value, .. }
            | OpBody::ObjectSetProperty { value, .. } => {
                if let Some(n) = value.first_non_finite() {
                    return Err(non_finite(n));
                }
            }
            OpBody::ArraySet { value } => {
                if let Some(n) = value.iter().find_map(DataValue::first_non_finite) {
                    return Err(non_finite(n));
                }
            }
            OpBody::ObjectSet { value } => {
                if let Some(n) = value.values().find_map(DataValue::first_non_finite) {
                    return Err(non_finite(n));
                }
            }
            OpBody::ArrayReorder { order } => {
                if !is_permutation(order) {
                    return Err(OperationError::InvalidPermutation {
                        length: order.len(),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }
}

pub(crate) fn is_permutation(order: &[usize]) -> bool {
    let mut seen = vec![false; order.len()];
    for &i in order {
        match seen.get_mut(i) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}

// ── Discrete operation ────────────────────────────────────────────────────

/// A single atomic edit to one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDiscreteOperation")]
pub struct DiscreteOperation {
    id: ElementId,
    #[serde(rename = "noOp")]
    no_op: bool,
    #[serde(flatten)]
    body: OpBody,
}

#[derive(Deserialize)]
struct RawDiscreteOperation {
    id: ElementId,
    #[serde(rename = "noOp", default)]
    no_op: bool,
    #[serde(flatten)]
    body: OpBody,
}

impl TryFrom<RawDiscreteOperation> for DiscreteOperation {
    type Error = OperationError;

    fn try_from(raw: RawDiscreteOperation) -> Result<Self, Self::Error> {
        let op = DiscreteOperation::new(raw.id, raw.body)?;
        Ok(op.with_no_op(raw.no_op))
    }
}

impl DiscreteOperation {
    /// Build an operation targeting element `id`.
    ///
    /// # Errors
    ///
    /// Rejects non-finite numbers anywhere in the payload and reorders that
    /// are not permutations.
    pub fn new(id: impl Into<ElementId>, body: OpBody) -> Result<Self, OperationError> {
        body.validate()?;
        Ok(Self {
            id: id.into(),
            no_op: false,
            body,
        })
    }

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    pub fn is_no_op(&self) -> bool {
        self.no_op
    }

    pub fn body(&self) -> &OpBody {
        &self.body
    }

    pub fn op_type(&self) -> OperationType {
        self.body.op_type()
    }

    /// Copy of this operation marked as semantically inert.
    pub fn as_no_op(&self) -> Self {
        self.with_no_op(true)
    }

    pub fn with_no_op(&self, no_op: bool) -> Self {
        Self {
            id: self.id.clone(),
            no_op,
            body: self.body.clone(),
        }
    }

    /// Copy of this operation with different fields. The type may change
    /// (e.g. a replace that turns into an insert) but stays in the same
    /// family; the new body was derived from validated operands.
    pub(crate) fn with_body(&self, body: OpBody) -> Self {
        Self {
            id: self.id.clone(),
            no_op: self.no_op,
            body,
        }
    }
}

// ── Compound operation ────────────────────────────────────────────────────

/// An ordered batch of discrete operations applied and transformed as a unit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompoundOperation {
    ops: Vec<DiscreteOperation>,
}

impl CompoundOperation {
    pub fn new(ops: Vec<DiscreteOperation>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[DiscreteOperation] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<DiscreteOperation> {
        self.ops
    }
}

/// Either a discrete or a compound operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Discrete(DiscreteOperation),
    Compound(CompoundOperation),
}

impl Operation {
    /// The discrete operations in application order.
    pub fn discrete_ops(&self) -> &[DiscreteOperation] {
        match self {
            Operation::Discrete(op) => std::slice::from_ref(op),
            Operation::Compound(compound) => compound.ops(),
        }
    }
}

impl From<DiscreteOperation> for Operation {
    fn from(op: DiscreteOperation) -> Self {
        Operation::Discrete(op)
    }
}

impl From<CompoundOperation> for Operation {
    fn from(op: CompoundOperation) -> Self {
        Operation::Compound(op)
    }
}
