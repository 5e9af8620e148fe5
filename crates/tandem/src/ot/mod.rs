//! Operational transformation.
//!
//! Leaf-first: [`index`] arithmetic is shared by [`xform`] and
//! [`reference`]; [`control`] drives [`xform`] against a pending queue.

pub mod control;
pub mod index;
pub mod ops;
pub mod pair;
pub mod path;
pub mod reference;
pub mod xform;

pub use xform::{transform, transform_discrete};
