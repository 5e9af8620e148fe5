//! Result of a transform step.

use crate::ot::ops::{DiscreteOperation, Operation};

/// `(first, second)` after transforming each against the other.
///
/// `first` is now applicable after `second` has been applied, and vice versa.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationPair<T = DiscreteOperation> {
    pub first: T,
    pub second: T,
}

impl<T> OperationPair<T> {
    pub fn new(first: T, second: T) -> Self {
        Self { first, second }
    }

    /// The same pair seen from the other side.
    pub fn swap(self) -> Self {
        Self {
            first: self.second,
            second: self.first,
        }
    }
}

impl OperationPair<DiscreteOperation> {
    pub fn into_operations(self) -> OperationPair<Operation> {
        OperationPair::new(self.first.into(), self.second.into())
    }
}
