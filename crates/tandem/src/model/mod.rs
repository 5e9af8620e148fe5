//! In-memory element tree that operations are applied to.

mod applied;
mod document;
mod value;

pub use applied::AppliedOperation;
pub use document::Document;
pub use value::{DataKind, DataValue, ElementId, IdGenerator};
