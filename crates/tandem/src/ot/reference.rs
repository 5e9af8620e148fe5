//! Re-anchoring of participant references (cursors, selections, tracked
//! properties and elements) under concurrent operations.

use serde::{Deserialize, Serialize};

use crate::error::TransformError;
use crate::model::ElementId;
use crate::ot::index::{handle_insert, handle_move, handle_remove, handle_reorder};
use crate::ot::ops::{DiscreteOperation, OpBody, Operation, OperationType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Index,
    Range,
    Property,
    Element,
}

/// Anchors held by a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum ReferenceValues {
    /// Positions within the owning string or array.
    Index(Vec<usize>),
    /// `(start, end)` position pairs within the owning string or array.
    Range(Vec<(usize, usize)>),
    /// Property names of the owning object.
    Property(Vec<String>),
    /// Tracked elements anywhere in the document.
    Element(Vec<ElementId>),
}

impl ReferenceValues {
    pub fn kind(&self) -> ReferenceKind {
        match self {
            ReferenceValues::Index(_) => ReferenceKind::Index,
            ReferenceValues::Range(_) => ReferenceKind::Range,
            ReferenceValues::Property(_) => ReferenceKind::Property,
            ReferenceValues::Element(_) => ReferenceKind::Element,
        }
    }
}

/// A live reference owned by one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceData {
    /// Element the anchors live in. `None` for element references, which
    /// belong to the document as a whole.
    pub owner: Option<ElementId>,
    pub session_id: String,
    /// Distinguishes several references of one participant on one element.
    pub key: String,
    pub values: ReferenceValues,
}

impl ReferenceData {
    pub fn kind(&self) -> ReferenceKind {
        self.values.kind()
    }

    fn with_values(&self, values: ReferenceValues) -> Self {
        Self {
            owner: self.owner.clone(),
            session_id: self.session_id.clone(),
            key: self.key.clone(),
            values,
        }
    }
}

/// Outcome of re-anchoring a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTransform {
    Updated(ReferenceData),
    /// The anchored content is gone; the reference must be disposed.
    Obsoleted,
}

/// Re-anchor `reference` after `op` was applied to the document.
///
/// Compound operations are folded in order; the first obsoleting step ends
/// the fold.
///
/// ```
/// use tandem::ot::ops::{DiscreteOperation, OpBody};
/// use tandem::ot::reference::{transform_reference, ReferenceData, ReferenceTransform, ReferenceValues};
///
/// let cursor = ReferenceData {
///     owner: Some("text".into()),
///     session_id: "s1".into(),
///     key: "cursor".into(),
///     values: ReferenceValues::Index(vec![10]),
/// };
/// let insert = DiscreteOperation::new("text", OpBody::StringInsert { index: 4, value: "abc".into() }).unwrap();
/// let ReferenceTransform::Updated(moved) = transform_reference(&insert.into(), &cursor).unwrap() else {
///     panic!("cursor survives an insert");
/// };
/// assert_eq!(moved.values, ReferenceValues::Index(vec![13]));
/// ```
///
/// # Errors
///
/// [`TransformError::IndexOutOfRange`] if an anchor lies past the end of an
/// array being reordered.
pub fn transform_reference(
    op: &Operation,
    reference: &ReferenceData,
) -> Result<ReferenceTransform, TransformError> {
    let mut current = reference.clone();
    for step in op.discrete_ops() {
        match transform_discrete(step, &current)? {
            ReferenceTransform::Updated(next) => current = next,
            ReferenceTransform::Obsoleted => {
                tracing::debug!(
                    key = %reference.key,
                    session = %reference.session_id,
                    operation = %step.op_type(),
                    "reference obsoleted"
                );
                return Ok(ReferenceTransform::Obsoleted);
            }
        }
    }
    Ok(ReferenceTransform::Updated(current))
}

fn transform_discrete(
    op: &DiscreteOperation,
    reference: &ReferenceData,
) -> Result<ReferenceTransform, TransformError> {
    if op.is_no_op() || reference.owner.as_ref() != Some(op.id()) {
        return Ok(ReferenceTransform::Updated(reference.clone()));
    }
    let updated = |values: ReferenceValues| -> Result<ReferenceTransform, TransformError> {
        Ok(ReferenceTransform::Updated(reference.with_values(values)))
    };

    if op.op_type().is_set() {
        return match reference.values {
            ReferenceValues::Element(_) => Ok(ReferenceTransform::Updated(reference.clone())),
            _ => Ok(ReferenceTransform::Obsoleted),
        };
    }

    match (&reference.values, op.body()) {
        (ReferenceValues::Index(positions), body) => match body {
            OpBody::StringInsert { index, value } => {
                updated(ReferenceValues::Index(handle_insert(positions, *index, value.chars().count())))
            }
            OpBody::ArrayInsert { index, .. } => {
                updated(ReferenceValues::Index(handle_insert(positions, *index, 1)))
            }
            OpBody::StringRemove { index, value } => {
                let count = value.chars().count();
                if positions.iter().any(|&p| p > *index && p < index + count) {
                    return Ok(ReferenceTransform::Obsoleted);
                }
                updated(ReferenceValues::Index(handle_remove(positions, *index, count)))
            }
            OpBody::ArrayRemove { index } => {
                updated(ReferenceValues::Index(handle_remove(positions, *index, 1)))
            }
            OpBody::ArrayMove { from, to } => {
                updated(ReferenceValues::Index(handle_move(positions, *from, *to)))
            }
            OpBody::ArrayReorder { order } => {
                check_within(positions.iter().copied(), order.len())?;
                match handle_reorder(positions, order) {
                    Some(moved) => updated(ReferenceValues::Index(moved)),
                    None => Ok(ReferenceTransform::Obsoleted),
                }
            }
            _ => Ok(ReferenceTransform::Updated(reference.clone())),
        },

        (ReferenceValues::Range(ranges), body) => {
            let (starts, ends): (Vec<usize>, Vec<usize>) = ranges.iter().copied().unzip();
            let (starts, ends) = match body {
                OpBody::StringInsert { index, value } => {
                    let count = value.chars().count();
                    (handle_insert(&starts, *index, count), handle_insert(&ends, *index, count))
                }
                OpBody::ArrayInsert { index, .. } => {
                    (handle_insert(&starts, *index, 1), handle_insert(&ends, *index, 1))
                }
                OpBody::StringRemove { index, value } => {
                    let count = value.chars().count();
                    (handle_remove(&starts, *index, count), handle_remove(&ends, *index, count))
                }
                OpBody::ArrayRemove { index } => {
                    (handle_remove(&starts, *index, 1), handle_remove(&ends, *index, 1))
                }
                OpBody::ArrayMove { .. } => return Ok(ReferenceTransform::Obsoleted),
                OpBody::ArrayReorder { order } => {
                    check_within(starts.iter().chain(&ends).copied(), order.len())?;
                    return Ok(ReferenceTransform::Obsoleted);
                }
                _ => return Ok(ReferenceTransform::Updated(reference.clone())),
            };
            updated(ReferenceValues::Range(starts.into_iter().zip(ends).collect()))
        }

        (ReferenceValues::Property(keys), OpBody::ObjectRemoveProperty { prop }) => {
            let kept: Vec<String> = keys.iter().filter(|k| *k != prop).cloned().collect();
            if kept.is_empty() {
                Ok(ReferenceTransform::Obsoleted)
            } else {
                updated(ReferenceValues::Property(kept))
            }
        }

        _ => Ok(ReferenceTransform::Updated(reference.clone())),
    }
}

fn check_within(
    positions: impl IntoIterator<Item = usize>,
    length: usize,
) -> Result<(), TransformError> {
    match positions.into_iter().find(|&p| p > length) {
        Some(index) => Err(TransformError::IndexOutOfRange {
            operation: OperationType::ArrayReorder,
            index,
            length,
        }),
        None => Ok(()),
    }
}

/// Drop anchors on elements that were detached from the tree.
///
/// Element references lose the detached ids and are obsoleted once none
/// remain; any other reference is obsoleted when its owner was detached.
pub fn prune_detached(reference: &ReferenceData, detached: &[ElementId]) -> ReferenceTransform {
    if let Some(owner) = &reference.owner {
        if detached.contains(owner) {
            return ReferenceTransform::Obsoleted;
        }
    }
    match &reference.values {
        ReferenceValues::Element(ids) => {
            let kept: Vec<ElementId> = ids.iter().filter(|id| !detached.contains(*id)).cloned().collect();
            if kept.is_empty() {
                ReferenceTransform::Obsoleted
            } else {
                ReferenceTransform::Updated(reference.with_values(ReferenceValues::Element(kept)))
            }
        }
        _ => ReferenceTransform::Updated(reference.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataValue;
    use crate::ot::ops::CompoundOperation;

    fn reference(owner: &str, values: ReferenceValues) -> ReferenceData {
        ReferenceData {
            owner: Some(owner.into()),
            session_id: "s1".into(),
            key: "k".into(),
            values,
        }
    }

    fn op(id: &str, body: OpBody) -> Operation {
        DiscreteOperation::new(id, body).unwrap().into()
    }

    fn values_after(op: &Operation, r: &ReferenceData) -> ReferenceValues {
        match transform_reference(op, r).unwrap() {
            ReferenceTransform::Updated(data) => data.values,
            ReferenceTransform::Obsoleted => panic!("unexpectedly obsoleted"),
        }
    }

    #[test]
    fn index_shifts_on_insert_and_obsoletes_inside_remove() {
        let r = reference("t", ReferenceValues::Index(vec![10]));
        let insert = op("t", OpBody::StringInsert { index: 4, value: "abc".into() });
        assert_eq!(values_after(&insert, &r), ReferenceValues::Index(vec![13]));

        let remove = op("t", OpBody::StringRemove { index: 8, value: "89ab".into() });
        assert_eq!(transform_reference(&remove, &r), Ok(ReferenceTransform::Obsoleted));
    }

    #[test]
    fn index_at_remove_boundary_survives() {
        let r = reference("t", ReferenceValues::Index(vec![8, 12]));
        let remove = op("t", OpBody::StringRemove { index: 8, value: "89ab".into() });
        assert_eq!(values_after(&remove, &r), ReferenceValues::Index(vec![8, 8]));
    }

    #[test]
    fn range_clamps_through_remove() {
        let r = reference("t", ReferenceValues::Range(vec![(2, 6)]));
        let remove = op("t", OpBody::StringRemove { index: 4, value: "4567".into() });
        assert_eq!(values_after(&remove, &r), ReferenceValues::Range(vec![(2, 4)]));
    }

    #[test]
    fn range_is_obsoleted_by_move() {
        let r = reference("a", ReferenceValues::Range(vec![(0, 2)]));
        let mv = op("a", OpBody::ArrayMove { from: 0, to: 3 });
        assert_eq!(transform_reference(&mv, &r), Ok(ReferenceTransform::Obsoleted));
    }

    #[test]
    fn array_index_follows_move_and_reorder() {
        let r = reference("a", ReferenceValues::Index(vec![0]));
        let mv = op("a", OpBody::ArrayMove { from: 0, to: 3 });
        assert_eq!(values_after(&mv, &r), ReferenceValues::Index(vec![3]));

        let reorder = op("a", OpBody::ArrayReorder { order: vec![1, 2, 0] });
        assert_eq!(values_after(&reorder, &r), ReferenceValues::Index(vec![2]));

        let far = reference("a", ReferenceValues::Index(vec![7]));
        assert!(matches!(
            transform_reference(&reorder, &far),
            Err(TransformError::IndexOutOfRange { index: 7, length: 3, .. })
        ));
    }

    #[test]
    fn set_obsoletes_owned_references() {
        let set = op("t", OpBody::StringSet { value: "new".into() });
        let r = reference("t", ReferenceValues::Index(vec![1]));
        assert_eq!(transform_reference(&set, &r), Ok(ReferenceTransform::Obsoleted));
    }

    #[test]
    fn property_reference_drops_removed_keys() {
        let r = reference("o", ReferenceValues::Property(vec!["a".into(), "b".into()]));
        let remove_a = op("o", OpBody::ObjectRemoveProperty { prop: "a".into() });
        assert_eq!(
            values_after(&remove_a, &r),
            ReferenceValues::Property(vec!["b".into()])
        );

        let both = Operation::from(CompoundOperation::new(
            [
                OpBody::ObjectRemoveProperty { prop: "a".into() },
                OpBody::ObjectRemoveProperty { prop: "b".into() },
            ]
            .into_iter()
            .map(|body| DiscreteOperation::new("o", body).unwrap())
            .collect(),
        ));
        assert_eq!(transform_reference(&both, &r), Ok(ReferenceTransform::Obsoleted));
    }

    #[test]
    fn other_elements_and_no_ops_are_ignored() {
        let r = reference("t", ReferenceValues::Index(vec![3]));
        let elsewhere = op("u", OpBody::StringInsert { index: 0, value: "x".into() });
        assert_eq!(values_after(&elsewhere, &r), ReferenceValues::Index(vec![3]));

        let inert: Operation = DiscreteOperation::new("t", OpBody::StringInsert { index: 0, value: "x".into() })
            .unwrap()
            .as_no_op()
            .into();
        assert_eq!(values_after(&inert, &r), ReferenceValues::Index(vec![3]));
    }

    #[test]
    fn element_references_prune_detached_ids() {
        let r = ReferenceData {
            owner: None,
            session_id: "s1".into(),
            key: "sel".into(),
            values: ReferenceValues::Element(vec!["a".into(), "b".into()]),
        };
        let set = op("a", OpBody::ArraySet { value: Vec::<DataValue>::new() });
        assert_eq!(values_after(&set, &r), r.values);

        let ReferenceTransform::Updated(pruned) = prune_detached(&r, &[ElementId::from("a")]) else {
            panic!("one id remains");
        };
        assert_eq!(pruned.values, ReferenceValues::Element(vec!["b".into()]));
        assert_eq!(prune_detached(&pruned, &[ElementId::from("b")]), ReferenceTransform::Obsoleted);
    }

    #[test]
    fn detached_owner_obsoletes() {
        let r = reference("t", ReferenceValues::Index(vec![0]));
        assert_eq!(prune_detached(&r, &[ElementId::from("t")]), ReferenceTransform::Obsoleted);
    }
}
