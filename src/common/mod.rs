//! Shared pure model: colors, geometry and domain types

pub mod color;
pub mod types;
