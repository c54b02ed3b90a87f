//! Domain types for type safety and clarity

pub mod domain;
pub mod geometry;

pub use domain::EdgeSelection;
pub use geometry::{Dimensions, EdgeFlags, Rect, edge_rects};
