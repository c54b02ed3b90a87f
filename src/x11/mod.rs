//! X11 utilities and cached state
//!
//! Provides visual/format lookups for translucent windows and primary
//! display geometry queries.

mod context;
mod display;

pub use context::{CachedFormats, find_argb_visual};
pub use display::{primary_bounds, select_geometry_events};
