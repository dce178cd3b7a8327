//! Space construction and invalidation.

pub mod boundary;
pub mod invalidation;

pub use boundary::{calculate, SpaceBoundaries};
pub use invalidation::{check, InvalidationConfig};
