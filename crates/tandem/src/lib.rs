//! Operational transformation engine for concurrently edited hierarchical
//! documents.
//!
//! Clients edit a shared tree of identified elements while a server imposes
//! one commit order. This crate holds the pieces a client needs to stay in
//! step with that order:
//!
//! - [`ot::ops`]: discrete and compound operation values
//! - [`ot::index`]: insert/remove/move position arithmetic
//! - [`ot::xform`]: the pairwise transformation function registry
//! - [`ot::reference`]: re-anchoring of cursors and selections
//! - [`ot::path`]: rebasing of paths under structural edits
//! - [`ot::control`]: reconciliation of server operations with the pending
//!   queue
//! - [`model`]: the element tree operations are applied to
//!
//! Transport, persistence and presence are left to the host.

pub mod config;
pub mod error;
pub mod model;
pub mod ot;

pub use config::ControlConfig;
pub use error::{ControlError, Error, ModelError, OperationError, TransformError};
pub use model::{AppliedOperation, DataKind, DataValue, Document, ElementId, IdGenerator};
pub use ot::control::{ClientConcurrencyControl, IncomingOperation, OutgoingOperation};
pub use ot::ops::{CompoundOperation, DiscreteOperation, OpBody, Operation, OperationType};
pub use ot::pair::OperationPair;
