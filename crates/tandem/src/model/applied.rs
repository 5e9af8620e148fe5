use crate::model::ElementId;
use crate::ot::ops::DiscreteOperation;

/// Record of one discrete operation that changed the document.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedOperation {
    pub operation: DiscreteOperation,
    /// Undoes `operation` when applied to the resulting document.
    pub inverse: DiscreteOperation,
    /// Elements that left the tree, subtrees included.
    pub detached: Vec<ElementId>,
}

impl AppliedOperation {
    pub fn new(
        operation: DiscreteOperation,
        inverse: DiscreteOperation,
        detached: Vec<ElementId>,
    ) -> Self {
        Self {
            operation,
            inverse,
            detached,
        }
    }
}
