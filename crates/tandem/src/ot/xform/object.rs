//! Object transformation rules. Edits to different properties commute.

use crate::error::TransformError;
use crate::ot::ops::{DiscreteOperation, OpBody, OperationType};
use crate::ot::pair::OperationPair;

use super::scalar::{set_set, set_wins};
use super::{both_no_op, unchanged, unsupported, Registry};

type Op = DiscreteOperation;
type Outcome = Result<OperationPair, TransformError>;

pub(super) fn register(registry: &mut Registry) {
    use OperationType::*;

    registry.register(ObjectAddProperty, ObjectAddProperty, add_add);
    registry.register(ObjectAddProperty, ObjectSetProperty, add_conflict);
    registry.register(ObjectAddProperty, ObjectRemoveProperty, add_conflict);
    registry.register(ObjectSetProperty, ObjectSetProperty, set_prop_set_prop);
    registry.register(ObjectSetProperty, ObjectRemoveProperty, set_prop_remove);
    registry.register(ObjectRemoveProperty, ObjectRemoveProperty, remove_remove);

    for other in [ObjectAddProperty, ObjectSetProperty, ObjectRemoveProperty] {
        registry.register(ObjectSet, other, set_wins);
    }
    registry.register(ObjectSet, ObjectSet, set_set);
}

fn prop_of(op: &Op) -> Option<&str> {
    match op.body() {
        OpBody::ObjectAddProperty { prop, .. }
        | OpBody::ObjectSetProperty { prop, .. }
        | OpBody::ObjectRemoveProperty { prop } => Some(prop),
        _ => None,
    }
}

fn same_prop(s: &Op, c: &Op) -> Result<bool, TransformError> {
    match (prop_of(s), prop_of(c)) {
        (Some(p), Some(q)) => Ok(p == q),
        _ => Err(unsupported(s, c)),
    }
}

/// Both sides created the same property; the first value wins.
fn add_add(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ObjectAddProperty { prop, value: sv }, OpBody::ObjectAddProperty { value: cv, .. }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    if !same_prop(s, c)? {
        return Ok(unchanged(s, c));
    }
    if sv == cv {
        return Ok(both_no_op(s, c));
    }
    let s = s.with_body(OpBody::ObjectSetProperty {
        prop: prop.clone(),
        value: sv.clone(),
    });
    Ok(OperationPair::new(s, c.as_no_op()))
}

/// A property cannot be added while it is concurrently set or removed: one
/// side would have to have seen it present and the other absent.
fn add_conflict(s: &Op, c: &Op) -> Outcome {
    if !same_prop(s, c)? {
        return Ok(unchanged(s, c));
    }
    Err(TransformError::Incompatible {
        first: s.op_type(),
        second: c.op_type(),
        reason: format!("property {:?} cannot be both absent and present", prop_of(s).unwrap_or_default()),
    })
}

fn set_prop_set_prop(s: &Op, c: &Op) -> Outcome {
    if !same_prop(s, c)? {
        return Ok(unchanged(s, c));
    }
    if s.body() == c.body() {
        Ok(both_no_op(s, c))
    } else {
        Ok(OperationPair::new(s.clone(), c.as_no_op()))
    }
}

/// The set survives a concurrent removal by re-adding the property.
fn set_prop_remove(s: &Op, c: &Op) -> Outcome {
    let OpBody::ObjectSetProperty { prop, value } = s.body() else {
        return Err(unsupported(s, c));
    };
    if !same_prop(s, c)? {
        return Ok(unchanged(s, c));
    }
    let s = s.with_body(OpBody::ObjectAddProperty {
        prop: prop.clone(),
        value: value.clone(),
    });
    Ok(OperationPair::new(s, c.as_no_op()))
}

fn remove_remove(s: &Op, c: &Op) -> Outcome {
    if same_prop(s, c)? {
        Ok(both_no_op(s, c))
    } else {
        Ok(unchanged(s, c))
    }
}
