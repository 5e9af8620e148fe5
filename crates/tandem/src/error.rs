//! Error types.
//!
//! Each area of the engine has its own error enum; [`Error`] aggregates them
//! for callers that do not care which layer failed.

use thiserror::Error;

use crate::model::ElementId;
use crate::ot::ops::OperationType;

/// Rejections raised while constructing an operation, before it can enter a
/// pending queue or the registry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OperationError {
    #[error("{operation} carries a non-finite number: {value}")]
    NonFiniteNumber { operation: OperationType, value: f64 },

    #[error("reorder of {length} elements is not a permutation")]
    InvalidPermutation { length: usize },
}

/// Failures of a transform step.
///
/// All of them are protocol or programming errors. `Unsupported` in
/// particular means the participants disagree about the operation set and the
/// document needs a full resynchronization.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    #[error("no transformation function registered for ({first}, {second})")]
    Unsupported {
        first: OperationType,
        second: OperationType,
    },

    #[error("{operation} index {index} is out of range for length {length}")]
    IndexOutOfRange {
        operation: OperationType,
        index: usize,
        length: usize,
    },

    #[error("{first} and {second} cannot be concurrent: {reason}")]
    Incompatible {
        first: OperationType,
        second: OperationType,
        reason: String,
    },
}

/// Failures while applying an operation to a [`crate::model::Document`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("element {0} appears more than once")]
    DuplicateId(ElementId),

    #[error("{operation} cannot target element {id}: it is a {found}")]
    TypeMismatch {
        operation: OperationType,
        id: ElementId,
        found: &'static str,
    },

    #[error("{operation} on {id}: index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        operation: OperationType,
        id: ElementId,
        index: usize,
        length: usize,
    },

    #[error("property {prop:?} does not exist on {id}")]
    PropertyNotFound { id: ElementId, prop: String },

    #[error("property {prop:?} already exists on {id}")]
    PropertyExists { id: ElementId, prop: String },

    #[error("reorder on {id} has {order} entries but the array has {length}")]
    ReorderLength {
        id: ElementId,
        order: usize,
        length: usize,
    },
}

/// Failures of the client-side concurrency control.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error("expected server version {expected}, got {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    #[error("acknowledged sequence number {seq_no} does not match the pending head {head:?}")]
    UnexpectedAcknowledgement { seq_no: u64, head: Option<u64> },

    #[error("a batch is already open")]
    BatchAlreadyOpen,

    #[error("no batch is open")]
    NoBatchOpen,

    #[error("remote operations cannot be processed while a local batch is open")]
    BatchInProgress,

    #[error("pending queue is full ({max} operations)")]
    QueueFull { max: usize },

    #[error("document requires resynchronization")]
    ResyncRequired,

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Any error raised by this crate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Operation(#[from] OperationError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Control(#[from] ControlError),
}
