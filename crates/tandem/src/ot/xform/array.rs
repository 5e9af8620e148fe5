//! Array transformation rules.

use crate::error::TransformError;
use crate::ot::index::{insert_index, inverse_permutation, move_index};
use crate::ot::ops::{DiscreteOperation, OpBody, OperationType};
use crate::ot::pair::OperationPair;

use super::scalar::{set_set, set_wins};
use super::{both_no_op, unchanged, unsupported, Registry};

type Op = DiscreteOperation;
type Outcome = Result<OperationPair, TransformError>;

pub(super) fn register(registry: &mut Registry) {
    use OperationType::*;

    registry.register(ArrayInsert, ArrayInsert, insert_insert);
    registry.register(ArrayInsert, ArrayRemove, insert_remove);
    registry.register(ArrayInsert, ArrayReplace, insert_replace);
    registry.register(ArrayInsert, ArrayMove, insert_move);
    registry.register(ArrayInsert, ArrayReorder, insert_reorder);

    registry.register(ArrayRemove, ArrayRemove, remove_remove);
    registry.register(ArrayRemove, ArrayReplace, remove_replace);
    registry.register(ArrayRemove, ArrayMove, remove_move);
    registry.register(ArrayRemove, ArrayReorder, remove_reorder);

    registry.register(ArrayReplace, ArrayReplace, replace_replace);
    registry.register(ArrayReplace, ArrayMove, replace_move);
    registry.register(ArrayReplace, ArrayReorder, replace_reorder);

    registry.register(ArrayMove, ArrayMove, move_move);
    registry.register(ArrayMove, ArrayReorder, move_reorder);

    registry.register(ArrayReorder, ArrayReorder, reorder_reorder);

    for other in [ArrayInsert, ArrayRemove, ArrayReplace, ArrayMove, ArrayReorder] {
        registry.register(ArraySet, other, set_wins);
    }
    registry.register(ArraySet, ArraySet, set_set);
}

fn out_of_range(operation: OperationType, index: usize, length: usize) -> TransformError {
    TransformError::IndexOutOfRange {
        operation,
        index,
        length,
    }
}

// ── Insert ────────────────────────────────────────────────────────────────

fn insert_insert(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayInsert { index: i, value: sv }, OpBody::ArrayInsert { index: j, value: cv }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    let (i, j) = (*i, *j);
    if i <= j {
        let c = c.with_body(OpBody::ArrayInsert {
            index: j + 1,
            value: cv.clone(),
        });
        Ok(OperationPair::new(s.clone(), c))
    } else {
        let s = s.with_body(OpBody::ArrayInsert {
            index: i + 1,
            value: sv.clone(),
        });
        Ok(OperationPair::new(s, c.clone()))
    }
}

fn insert_remove(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayInsert { index: i, value }, OpBody::ArrayRemove { index: j }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    let (i, j) = (*i, *j);
    if i <= j {
        let c = c.with_body(OpBody::ArrayRemove { index: j + 1 });
        Ok(OperationPair::new(s.clone(), c))
    } else {
        let s = s.with_body(OpBody::ArrayInsert {
            index: i - 1,
            value: value.clone(),
        });
        Ok(OperationPair::new(s, c.clone()))
    }
}

fn insert_replace(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayInsert { index: i, .. }, OpBody::ArrayReplace { index: j, value }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    if i <= j {
        let c = c.with_body(OpBody::ArrayReplace {
            index: j + 1,
            value: value.clone(),
        });
        Ok(OperationPair::new(s.clone(), c))
    } else {
        Ok(unchanged(s, c))
    }
}

/// The insertion point is first located in the array without the moved
/// element; an insertion at the moved element's own gap lands before it.
fn insert_move(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayInsert { index: i, value }, OpBody::ArrayMove { from, to }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    let (i, from, to) = (*i, *from, *to);
    let gap = if i <= from { i } else { i - 1 };
    let from = if from < i { from } else { from + 1 };
    let (index, to) = if gap <= to {
        (gap, to + 1)
    } else {
        (gap + 1, to)
    };
    let s = s.with_body(OpBody::ArrayInsert {
        index,
        value: value.clone(),
    });
    let c = c.with_body(OpBody::ArrayMove { from, to });
    Ok(OperationPair::new(s, c))
}

/// The new element stays in front of the element it was inserted before.
fn insert_reorder(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayInsert { index: i, value }, OpBody::ArrayReorder { order }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    let i = *i;
    let n = order.len();
    if i > n {
        return Err(out_of_range(OperationType::ArrayInsert, i, n));
    }
    let index = if i == n { n } else { inverse_permutation(order)[i] };

    let mut rebased: Vec<usize> = order.iter().map(|&o| insert_index(o, i, 1)).collect();
    rebased.insert(index, i);

    let s = s.with_body(OpBody::ArrayInsert {
        index,
        value: value.clone(),
    });
    let c = c.with_body(OpBody::ArrayReorder { order: rebased });
    Ok(OperationPair::new(s, c))
}

// ── Remove ────────────────────────────────────────────────────────────────

fn remove_remove(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayRemove { index: i }, OpBody::ArrayRemove { index: j }) = (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    let (i, j) = (*i, *j);
    if i == j {
        Ok(both_no_op(s, c))
    } else if i < j {
        let c = c.with_body(OpBody::ArrayRemove { index: j - 1 });
        Ok(OperationPair::new(s.clone(), c))
    } else {
        let s = s.with_body(OpBody::ArrayRemove { index: i - 1 });
        Ok(OperationPair::new(s, c.clone()))
    }
}

/// A replace of the removed element re-creates it at the same index.
fn remove_replace(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayRemove { index: i }, OpBody::ArrayReplace { index: j, value }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    let (i, j) = (*i, *j);
    if i < j {
        let c = c.with_body(OpBody::ArrayReplace {
            index: j - 1,
            value: value.clone(),
        });
        Ok(OperationPair::new(s.clone(), c))
    } else if i == j {
        let c = c.with_body(OpBody::ArrayInsert {
            index: j,
            value: value.clone(),
        });
        Ok(OperationPair::new(s.as_no_op(), c))
    } else {
        Ok(unchanged(s, c))
    }
}

fn remove_move(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayRemove { index: i }, OpBody::ArrayMove { from, to }) = (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    let (i, from, to) = (*i, *from, *to);
    if i == from {
        let s = s.with_body(OpBody::ArrayRemove { index: to });
        return Ok(OperationPair::new(s, c.as_no_op()));
    }
    let removed = move_index(i, from, to);
    // Recompute the move as seen without the removed element.
    let gap = if i < from { i } else { i - 1 };
    let moved_from = if from < i { from } else { from - 1 };
    let moved_to = if gap < to { to - 1 } else { to };
    let s = s.with_body(OpBody::ArrayRemove { index: removed });
    let c = c.with_body(OpBody::ArrayMove {
        from: moved_from,
        to: moved_to,
    });
    Ok(OperationPair::new(s, c))
}

fn remove_reorder(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayRemove { index: i }, OpBody::ArrayReorder { order }) = (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    let i = *i;
    let n = order.len();
    if i >= n {
        return Err(out_of_range(OperationType::ArrayRemove, i, n));
    }
    let index = inverse_permutation(order)[i];
    let rebased: Vec<usize> = order
        .iter()
        .filter(|&&o| o != i)
        .map(|&o| if o > i { o - 1 } else { o })
        .collect();
    let s = s.with_body(OpBody::ArrayRemove { index });
    let c = c.with_body(OpBody::ArrayReorder { order: rebased });
    Ok(OperationPair::new(s, c))
}

// ── Replace ───────────────────────────────────────────────────────────────

fn replace_replace(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayReplace { index: i, value: sv }, OpBody::ArrayReplace { index: j, value: cv }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    if i != j {
        Ok(unchanged(s, c))
    } else if sv == cv {
        Ok(both_no_op(s, c))
    } else {
        Ok(OperationPair::new(s.clone(), c.as_no_op()))
    }
}

fn replace_move(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayReplace { index: i, value }, OpBody::ArrayMove { from, to }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    let s = s.with_body(OpBody::ArrayReplace {
        index: move_index(*i, *from, *to),
        value: value.clone(),
    });
    Ok(OperationPair::new(s, c.clone()))
}

fn replace_reorder(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayReplace { index: i, value }, OpBody::ArrayReorder { order }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    let i = *i;
    let n = order.len();
    if i >= n {
        return Err(out_of_range(OperationType::ArrayReplace, i, n));
    }
    let s = s.with_body(OpBody::ArrayReplace {
        index: inverse_permutation(order)[i],
        value: value.clone(),
    });
    Ok(OperationPair::new(s, c.clone()))
}

// ── Move / reorder ────────────────────────────────────────────────────────

/// Each moved element is placed into a gap of the array without both moved
/// elements; both sides then agree on the final layout. On the same gap the
/// first operand's element goes first.
fn move_move(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayMove { from: f1, to: t1 }, OpBody::ArrayMove { from: f2, to: t2 }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    let (f1, t1, f2, t2) = (*f1, *t1, *f2, *t2);
    if f1 == f2 {
        if t1 == t2 {
            return Ok(both_no_op(s, c));
        }
        let s = s.with_body(OpBody::ArrayMove { from: t2, to: t1 });
        return Ok(OperationPair::new(s, c.as_no_op()));
    }

    let gap = |target: usize, from: usize, other_from: usize| {
        let other = if other_from < from { other_from } else { other_from - 1 };
        if target <= other {
            target
        } else {
            target - 1
        }
    };
    let g1 = gap(t1, f1, f2);
    let g2 = gap(t2, f2, f1);
    let (p1, p2) = if g1 <= g2 { (g1, g2 + 1) } else { (g1 + 1, g2) };

    let s = s.with_body(OpBody::ArrayMove {
        from: move_index(f1, f2, t2),
        to: p1,
    });
    let c = c.with_body(OpBody::ArrayMove {
        from: move_index(f2, f1, t1),
        to: p2,
    });
    Ok(OperationPair::new(s, c))
}

/// The reorder wins; the move is dropped and the permutation rebased.
fn move_reorder(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayMove { from, to }, OpBody::ArrayReorder { order }) = (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    let n = order.len();
    if *from >= n || *to >= n {
        return Err(out_of_range(OperationType::ArrayMove, (*from).max(*to), n));
    }
    let rebased = order.iter().map(|&o| move_index(o, *from, *to)).collect();
    let c = c.with_body(OpBody::ArrayReorder { order: rebased });
    Ok(OperationPair::new(s.as_no_op(), c))
}

fn reorder_reorder(s: &Op, c: &Op) -> Outcome {
    let (OpBody::ArrayReorder { order: so }, OpBody::ArrayReorder { order: co }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    if so.len() != co.len() {
        return Err(out_of_range(OperationType::ArrayReorder, so.len(), co.len()));
    }
    if so == co {
        return Ok(both_no_op(s, c));
    }
    let inverse = inverse_permutation(co);
    let rebased = so.iter().map(|&o| inverse[o]).collect();
    let s = s.with_body(OpBody::ArrayReorder { order: rebased });
    Ok(OperationPair::new(s, c.as_no_op()))
}
