//! Domain layer types and invariants.

pub mod clock;
pub mod entities;
pub mod ids;
