//! Transformation function registry.
//!
//! One function per unordered pair of operation types within a value family.
//! The table is indexed by [`OperationType::index`] in both dimensions; the
//! mirrored cell of every authored pair calls the same function with the
//! arguments swapped and swaps the result back.
//!
//! Tie-break: the first argument precedes the second at equal positions and
//! wins where only one side can survive.

mod array;
mod object;
mod scalar;
mod string;
mod transformer;

use std::sync::OnceLock;

use crate::error::TransformError;
use crate::ot::ops::{DiscreteOperation, OperationType};
use crate::ot::pair::OperationPair;

pub use transformer::{transform, transform_discrete};

/// Signature shared by every transformation function.
pub type TransformFn =
    fn(&DiscreteOperation, &DiscreteOperation) -> Result<OperationPair, TransformError>;

#[derive(Clone, Copy)]
enum Entry {
    Forward(TransformFn),
    Mirror(TransformFn),
}

/// Immutable `(OperationType, OperationType)` dispatch table.
pub struct Registry {
    table: Vec<Option<Entry>>,
}

impl Registry {
    fn empty() -> Self {
        Self {
            table: vec![None; OperationType::COUNT * OperationType::COUNT],
        }
    }

    fn build() -> Self {
        let mut registry = Self::empty();
        array::register(&mut registry);
        string::register(&mut registry);
        object::register(&mut registry);
        scalar::register(&mut registry);
        registry
    }

    fn slot(first: OperationType, second: OperationType) -> usize {
        first.index() * OperationType::COUNT + second.index()
    }

    /// Author the rule for `(first, second)`; `(second, first)` is derived.
    fn register(&mut self, first: OperationType, second: OperationType, f: TransformFn) {
        self.table[Self::slot(first, second)] = Some(Entry::Forward(f));
        if first != second {
            self.table[Self::slot(second, first)] = Some(Entry::Mirror(f));
        }
    }

    pub fn contains(&self, first: OperationType, second: OperationType) -> bool {
        self.table[Self::slot(first, second)].is_some()
    }

    /// Run the registered rule for the types of `s` and `c`.
    ///
    /// Does not short-circuit `noOp` operands or differing targets; that is
    /// [`transform_discrete`]'s job.
    ///
    /// # Errors
    ///
    /// [`TransformError::Unsupported`] when no rule exists for the pair, plus
    /// whatever the rule itself rejects.
    pub fn apply(
        &self,
        s: &DiscreteOperation,
        c: &DiscreteOperation,
    ) -> Result<OperationPair, TransformError> {
        match self.table[Self::slot(s.op_type(), c.op_type())] {
            Some(Entry::Forward(f)) => f(s, c),
            Some(Entry::Mirror(f)) => f(c, s).map(OperationPair::swap),
            None => Err(unsupported(s, c)),
        }
    }

    /// Same-family type pairs without a rule. Empty for a complete table.
    pub fn missing_pairs(&self) -> Vec<(OperationType, OperationType)> {
        let mut missing = Vec::new();
        for first in OperationType::ALL {
            for second in OperationType::ALL {
                if first.family() == second.family() && !self.contains(first, second) {
                    missing.push((first, second));
                }
            }
        }
        missing
    }
}

/// The process-wide registry, built on first use.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let registry = Registry::build();
        let missing = registry.missing_pairs();
        if !missing.is_empty() {
            tracing::error!(count = missing.len(), ?missing, "transformation registry is incomplete");
        }
        registry
    })
}

/// See [`Registry::missing_pairs`].
pub fn missing_pairs() -> Vec<(OperationType, OperationType)> {
    registry().missing_pairs()
}

pub(crate) fn unsupported(s: &DiscreteOperation, c: &DiscreteOperation) -> TransformError {
    TransformError::Unsupported {
        first: s.op_type(),
        second: c.op_type(),
    }
}

/// Both operands unchanged.
fn unchanged(s: &DiscreteOperation, c: &DiscreteOperation) -> OperationPair {
    OperationPair::new(s.clone(), c.clone())
}

/// Both operands become `noOp`.
fn both_no_op(s: &DiscreteOperation, c: &DiscreteOperation) -> OperationPair {
    OperationPair::new(s.as_no_op(), c.as_no_op())
}
