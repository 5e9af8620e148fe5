//! Whole-value replacement rules shared by every family, plus the number,
//! boolean and date tables.

use crate::error::TransformError;
use crate::ot::ops::{DiscreteOperation, OpBody, OperationType};
use crate::ot::pair::OperationPair;

use super::{both_no_op, unchanged, unsupported, Registry};

type Op = DiscreteOperation;
type Outcome = Result<OperationPair, TransformError>;

pub(super) fn register(registry: &mut Registry) {
    use OperationType::*;

    registry.register(NumberDelta, NumberDelta, delta_delta);
    registry.register(NumberSet, NumberDelta, set_wins);
    registry.register(NumberSet, NumberSet, set_set);
    registry.register(BooleanSet, BooleanSet, set_set);
    registry.register(DateSet, DateSet, set_set);
}

/// `s` replaces the whole value; whatever `c` did to it is discarded.
pub(super) fn set_wins(s: &Op, c: &Op) -> Outcome {
    if !s.op_type().is_set() {
        return Err(unsupported(s, c));
    }
    Ok(OperationPair::new(s.clone(), c.as_no_op()))
}

/// Identical replacements cancel out; otherwise the first one wins.
pub(super) fn set_set(s: &Op, c: &Op) -> Outcome {
    if !s.op_type().is_set() || s.op_type() != c.op_type() {
        return Err(unsupported(s, c));
    }
    if s.body() == c.body() {
        Ok(both_no_op(s, c))
    } else {
        Ok(OperationPair::new(s.clone(), c.as_no_op()))
    }
}

/// Additions commute, up to `f64` rounding of the intermediate sums.
fn delta_delta(s: &Op, c: &Op) -> Outcome {
    match (s.body(), c.body()) {
        (OpBody::NumberDelta { .. }, OpBody::NumberDelta { .. }) => Ok(unchanged(s, c)),
        _ => Err(unsupported(s, c)),
    }
}
