//! Entry points: discrete and compound transformation.

use crate::error::TransformError;
use crate::ot::ops::{CompoundOperation, DiscreteOperation, Operation};
use crate::ot::pair::OperationPair;

use super::{registry, unchanged};

/// Transform two concurrent discrete operations.
///
/// A `noOp` operand, or operands targeting different elements, come back
/// unchanged without consulting the registry.
///
/// # Errors
///
/// See [`super::Registry::apply`].
pub fn transform_discrete(
    s: &DiscreteOperation,
    c: &DiscreteOperation,
) -> Result<OperationPair, TransformError> {
    if s.is_no_op() || c.is_no_op() || s.id() != c.id() {
        return Ok(unchanged(s, c));
    }
    tracing::trace!(
        first = %s.op_type(),
        second = %c.op_type(),
        target = %s.id(),
        "transform step"
    );
    registry().apply(s, c)
}

/// Transform two concurrent operations of any shape.
///
/// Compound operands are folded in order: each contained operation is
/// transformed against the other side, which is threaded through the fold.
/// The shape of each operand is preserved.
///
/// ```
/// use tandem::model::{DataValue, ElementId};
/// use tandem::ot::ops::{DiscreteOperation, OpBody, Operation};
/// use tandem::ot::transform;
///
/// let s: Operation = DiscreteOperation::new("list", OpBody::ArrayRemove { index: 1 })
///     .unwrap()
///     .into();
/// let c: Operation = DiscreteOperation::new("list", OpBody::ArrayInsert {
///     index: 4,
///     value: DataValue::string(ElementId::from("c:0"), "x"),
/// })
/// .unwrap()
/// .into();
///
/// let pair = transform(&s, &c).unwrap();
/// let moved = &pair.second.discrete_ops()[0];
/// assert!(matches!(moved.body(), OpBody::ArrayInsert { index: 3, .. }));
/// ```
///
/// # Errors
///
/// The first failing step aborts the whole transformation.
pub fn transform(
    s: &Operation,
    c: &Operation,
) -> Result<OperationPair<Operation>, TransformError> {
    if let (Operation::Discrete(s), Operation::Discrete(c)) = (s, c) {
        return transform_discrete(s, c).map(OperationPair::into_operations);
    }
    let (first, second) = transform_sequences(s.discrete_ops(), c.discrete_ops())?;
    Ok(OperationPair::new(reshape(s, first), reshape(c, second)))
}

fn transform_sequences(
    s: &[DiscreteOperation],
    c: &[DiscreteOperation],
) -> Result<(Vec<DiscreteOperation>, Vec<DiscreteOperation>), TransformError> {
    let mut first = Vec::with_capacity(s.len());
    let mut second = c.to_vec();
    for op in s {
        let mut current = op.clone();
        let mut next = Vec::with_capacity(second.len());
        for other in &second {
            let pair = transform_discrete(&current, other)?;
            current = pair.first;
            next.push(pair.second);
        }
        first.push(current);
        second = next;
    }
    Ok((first, second))
}

fn reshape(original: &Operation, mut ops: Vec<DiscreteOperation>) -> Operation {
    match original {
        Operation::Discrete(_) if ops.len() == 1 => Operation::Discrete(ops.remove(0)),
        _ => Operation::Compound(CompoundOperation::new(ops)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataValue, ElementId};
    use crate::ot::ops::OpBody;

    fn op(id: &str, body: OpBody) -> DiscreteOperation {
        DiscreteOperation::new(id, body).unwrap()
    }

    fn insert(index: usize, text: &str) -> DiscreteOperation {
        op(
            "s",
            OpBody::StringInsert {
                index,
                value: text.into(),
            },
        )
    }

    #[test]
    fn different_targets_pass_through() {
        let a = op("a", OpBody::ArrayRemove { index: 0 });
        let b = op("b", OpBody::ArrayRemove { index: 0 });
        let pair = transform_discrete(&a, &b).unwrap();
        assert_eq!(pair.first, a);
        assert_eq!(pair.second, b);
    }

    #[test]
    fn no_op_operands_pass_through() {
        let a = op("a", OpBody::ArrayRemove { index: 0 }).as_no_op();
        let b = op("a", OpBody::ArrayRemove { index: 0 });
        let pair = transform_discrete(&a, &b).unwrap();
        assert_eq!(pair.first, a);
        assert_eq!(pair.second, b);
    }

    #[test]
    fn cross_family_pair_is_unsupported() {
        let a = op("a", OpBody::ArrayRemove { index: 0 });
        let b = op("a", OpBody::StringSet { value: "x".into() });
        assert_eq!(
            transform_discrete(&a, &b),
            Err(TransformError::Unsupported {
                first: a.op_type(),
                second: b.op_type(),
            })
        );
    }

    #[test]
    fn compound_threads_the_other_side() {
        let s = Operation::from(CompoundOperation::new(vec![insert(0, "ab"), insert(5, "c")]));
        let c = Operation::from(insert(1, "xyz"));
        let pair = transform(&s, &c).unwrap();

        let first = pair.first.discrete_ops();
        assert_eq!(first.len(), 2);
        assert!(matches!(first[0].body(), OpBody::StringInsert { index: 0, .. }));
        // shifted by the concurrent "xyz" at 1 (seen after "ab" moved it to 3)
        assert!(matches!(first[1].body(), OpBody::StringInsert { index: 8, .. }));
        assert!(matches!(pair.first, Operation::Compound(_)));

        let second = pair.second.discrete_ops();
        assert!(matches!(second[0].body(), OpBody::StringInsert { index: 3, .. }));
        assert!(matches!(pair.second, Operation::Discrete(_)));
    }

    #[test]
    fn compound_against_compound() {
        let item = |n: &str| DataValue::string(ElementId::from(n), n);
        let s = Operation::from(CompoundOperation::new(vec![
            op("l", OpBody::ArrayInsert { index: 0, value: item("a") }),
            op("l", OpBody::ArrayInsert { index: 0, value: item("b") }),
        ]));
        let c = Operation::from(CompoundOperation::new(vec![
            op("l", OpBody::ArrayRemove { index: 0 }),
            op("l", OpBody::ArrayRemove { index: 0 }),
        ]));
        let pair = transform(&s, &c).unwrap();
        let second = pair.second.discrete_ops();
        assert!(matches!(second[0].body(), OpBody::ArrayRemove { index: 2 }));
        assert!(matches!(second[1].body(), OpBody::ArrayRemove { index: 2 }));
        let first = pair.first.discrete_ops();
        assert!(matches!(first[0].body(), OpBody::ArrayInsert { index: 0, .. }));
        assert!(matches!(first[1].body(), OpBody::ArrayInsert { index: 0, .. }));
    }

    #[test]
    fn empty_compound_is_preserved() {
        let s = Operation::from(CompoundOperation::default());
        let c = Operation::from(insert(0, "x"));
        let pair = transform(&s, &c).unwrap();
        assert_eq!(pair.first, s);
        assert_eq!(pair.second, c);
    }
}
