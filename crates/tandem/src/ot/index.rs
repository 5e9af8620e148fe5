//! Position arithmetic shared by the transformation functions and the
//! reference layer.
//!
//! A position is an offset into a sequence (a string in Unicode scalar
//! values or an array in elements). The set-level functions map every
//! position independently and preserve order and length of the input.

use crate::ot::ops::is_permutation;

// ── Single positions ──────────────────────────────────────────────────────

/// Position after `count` items were inserted at `at`.
/// A position equal to `at` moves with the insertion.
pub fn insert_index(pos: usize, at: usize, count: usize) -> usize {
    if pos >= at {
        pos + count
    } else {
        pos
    }
}

/// Position after the span `[at, at+count)` was removed.
/// Positions inside the span clamp to `at`.
pub fn remove_index(pos: usize, at: usize, count: usize) -> usize {
    if pos >= at + count {
        pos - count
    } else if pos > at {
        at
    } else {
        pos
    }
}

/// Index of the element formerly at `pos` after the element at `from` was
/// moved to `to`.
pub fn move_index(pos: usize, from: usize, to: usize) -> usize {
    if pos == from {
        return to;
    }
    let without = if pos > from { pos - 1 } else { pos };
    if without >= to {
        without + 1
    } else {
        without
    }
}

/// `inverse[order[k]] == k`. Callers pass the order of a validated
/// `ArrayReorder`, which is always a permutation.
pub(crate) fn inverse_permutation(order: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; order.len()];
    for (k, &old) in order.iter().enumerate() {
        inverse[old] = k;
    }
    inverse
}

// ── Position sets ─────────────────────────────────────────────────────────

pub fn handle_insert(positions: &[usize], at: usize, count: usize) -> Vec<usize> {
    positions.iter().map(|&p| insert_index(p, at, count)).collect()
}

pub fn handle_remove(positions: &[usize], at: usize, count: usize) -> Vec<usize> {
    positions.iter().map(|&p| remove_index(p, at, count)).collect()
}

pub fn handle_move(positions: &[usize], from: usize, to: usize) -> Vec<usize> {
    positions.iter().map(|&p| move_index(p, from, to)).collect()
}

/// Follow every position through a reorder. Positions at or past the end of
/// the array (insertion points) are unaffected.
///
/// Returns `None` when `order` is not a permutation of `0..order.len()`.
pub fn handle_reorder(positions: &[usize], order: &[usize]) -> Option<Vec<usize>> {
    if !is_permutation(order) {
        return None;
    }
    let inverse = inverse_permutation(order);
    Some(
        positions
            .iter()
            .map(|&p| inverse.get(p).copied().unwrap_or(p))
            .collect(),
    )
}
