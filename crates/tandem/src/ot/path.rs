//! Rebasing of paths under structural edits to one of their ancestors.

use tandem_path::{is_ancestor_of, Path, PathElement};

use crate::ot::index::{inverse_permutation, move_index};
use crate::ot::ops::{DiscreteOperation, OpBody};

/// Outcome of [`rebase_descendant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTransformation {
    Unchanged,
    Updated(Path),
    /// The addressed element no longer exists.
    Obsoleted,
}

/// Rebase `descendant` after `op` was applied to the element at `ancestor`.
///
/// Only the step of `descendant` directly below `ancestor` can change. Paths
/// that are not strictly below `ancestor`, and `noOp` operations, leave the
/// path unchanged.
///
/// ```
/// use tandem::ot::ops::{DiscreteOperation, OpBody};
/// use tandem::ot::path::{rebase_descendant, PathTransformation};
/// use tandem_path::parse_path;
///
/// let remove = DiscreteOperation::new("list", OpBody::ArrayRemove { index: 1 }).unwrap();
/// let list = parse_path("/list");
/// assert_eq!(
///     rebase_descendant(&remove, &list, &parse_path("/list/3/title")),
///     PathTransformation::Updated(parse_path("/list/2/title")),
/// );
/// assert_eq!(
///     rebase_descendant(&remove, &list, &parse_path("/list/1")),
///     PathTransformation::Obsoleted,
/// );
/// ```
pub fn rebase_descendant(
    op: &DiscreteOperation,
    ancestor: &[PathElement],
    descendant: &[PathElement],
) -> PathTransformation {
    if op.is_no_op() || !is_ancestor_of(ancestor, descendant) {
        return PathTransformation::Unchanged;
    }
    let step = &descendant[ancestor.len()];

    match op.body() {
        OpBody::ArraySet { .. } | OpBody::ObjectSet { .. } => PathTransformation::Obsoleted,
        OpBody::ObjectSetProperty { prop, .. } | OpBody::ObjectRemoveProperty { prop } => {
            if step.as_key() == Some(prop.as_str()) {
                PathTransformation::Obsoleted
            } else {
                PathTransformation::Unchanged
            }
        }
        body => match step.as_index() {
            Some(k) => rebase_index(body, k)
                .map_or(PathTransformation::Obsoleted, |next| {
                    if next == k {
                        PathTransformation::Unchanged
                    } else {
                        PathTransformation::Updated(with_step(descendant, ancestor.len(), next))
                    }
                }),
            None => PathTransformation::Unchanged,
        },
    }
}

/// New index of the element at `k`, or `None` if it is gone.
fn rebase_index(body: &OpBody, k: usize) -> Option<usize> {
    match body {
        OpBody::ArrayInsert { index, .. } => Some(if k >= *index { k + 1 } else { k }),
        OpBody::ArrayRemove { index } => match k.cmp(index) {
            std::cmp::Ordering::Less => Some(k),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(k - 1),
        },
        OpBody::ArrayReplace { index, .. } => (k != *index).then_some(k),
        OpBody::ArrayMove { from, to } => Some(move_index(k, *from, *to)),
        OpBody::ArrayReorder { order } => {
            Some(inverse_permutation(order).get(k).copied().unwrap_or(k))
        }
        _ => Some(k),
    }
}

fn with_step(path: &[PathElement], at: usize, index: usize) -> Path {
    let mut next = path.to_vec();
    next[at] = PathElement::Index(index);
    next
}
