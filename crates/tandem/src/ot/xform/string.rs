//! String transformation rules. Offsets count Unicode scalar values.

use crate::error::TransformError;
use crate::ot::index::{insert_index, remove_index};
use crate::ot::ops::{DiscreteOperation, OpBody, OperationType};
use crate::ot::pair::OperationPair;

use super::scalar::{set_set, set_wins};
use super::{unsupported, Registry};

type Op = DiscreteOperation;
type Outcome = Result<OperationPair, TransformError>;

pub(super) fn register(registry: &mut Registry) {
    use OperationType::*;

    registry.register(StringInsert, StringInsert, insert_insert);
    registry.register(StringInsert, StringRemove, insert_remove);
    registry.register(StringRemove, StringRemove, remove_remove);
    registry.register(StringSet, StringInsert, set_wins);
    registry.register(StringSet, StringRemove, set_wins);
    registry.register(StringSet, StringSet, set_set);
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn insert_insert(s: &Op, c: &Op) -> Outcome {
    let (OpBody::StringInsert { index: i, value: sv }, OpBody::StringInsert { index: j, value: cv }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    if i <= j {
        let c = c.with_body(OpBody::StringInsert {
            index: insert_index(*j, *i, char_len(sv)),
            value: cv.clone(),
        });
        Ok(OperationPair::new(s.clone(), c))
    } else {
        let s = s.with_body(OpBody::StringInsert {
            index: insert_index(*i, *j, char_len(cv)),
            value: sv.clone(),
        });
        Ok(OperationPair::new(s, c.clone()))
    }
}

/// An insertion strictly inside a concurrently removed span is removed along
/// with it.
fn insert_remove(s: &Op, c: &Op) -> Outcome {
    let (OpBody::StringInsert { index: i, value: inserted }, OpBody::StringRemove { index: j, value: removed }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    let (i, j) = (*i, *j);
    let removed_len = char_len(removed);

    if i <= j {
        let c = c.with_body(OpBody::StringRemove {
            index: insert_index(j, i, char_len(inserted)),
            value: removed.clone(),
        });
        Ok(OperationPair::new(s.clone(), c))
    } else if i >= j + removed_len {
        let s = s.with_body(OpBody::StringInsert {
            index: remove_index(i, j, removed_len),
            value: inserted.clone(),
        });
        Ok(OperationPair::new(s, c.clone()))
    } else {
        let split = i - j;
        let mut grown: String = removed.chars().take(split).collect();
        grown.push_str(inserted);
        grown.extend(removed.chars().skip(split));
        let c = c.with_body(OpBody::StringRemove {
            index: j,
            value: grown,
        });
        Ok(OperationPair::new(s.as_no_op(), c))
    }
}

/// Overlapping removals shrink to the characters the other side left alone.
fn remove_remove(s: &Op, c: &Op) -> Outcome {
    let (OpBody::StringRemove { index: a, value: sv }, OpBody::StringRemove { index: b, value: cv }) =
        (s.body(), c.body())
    else {
        return Err(unsupported(s, c));
    };
    let (a, b) = (*a, *b);
    let (a_len, b_len) = (char_len(sv), char_len(cv));
    let (a_end, b_end) = (a + a_len, b + b_len);

    if a_end <= b {
        let c = c.with_body(OpBody::StringRemove {
            index: remove_index(b, a, a_len),
            value: cv.clone(),
        });
        return Ok(OperationPair::new(s.clone(), c));
    }
    if b_end <= a {
        let s = s.with_body(OpBody::StringRemove {
            index: remove_index(a, b, b_len),
            value: sv.clone(),
        });
        return Ok(OperationPair::new(s, c.clone()));
    }

    let s = shrink(s, a, sv, b, b_end);
    let c = shrink(c, b, cv, a, a_end);
    Ok(OperationPair::new(s, c))
}

/// Keep the characters of `text` (removed from `start`) that fall outside
/// `[other, other_end)`. An empty remainder becomes a `noOp`.
fn shrink(op: &Op, start: usize, text: &str, other: usize, other_end: usize) -> Op {
    let kept: String = text
        .chars()
        .enumerate()
        .filter(|(k, _)| {
            let pos = start + k;
            pos < other || pos >= other_end
        })
        .map(|(_, ch)| ch)
        .collect();
    if kept.is_empty() {
        return op.as_no_op();
    }
    op.with_body(OpBody::StringRemove {
        index: start.min(other),
        value: kept,
    })
}
