//! Geometric types for X11 coordinates and dimensions
//!
//! Provides type-safe wrappers for positions and sizes to avoid
//! common integer confusion (e.g., swapping width/height or x/y),
//! plus the pure edge-rectangle derivation used by the overlay.

use super::domain::EdgeSelection;

/// A position in 2D space (X11 coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i16,
    pub y: i16,
}

impl Position {
    /// Create a new position
    pub fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

/// Surface dimensions (width × height)
/// Using a newtype prevents accidentally swapping width and height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimensions {
    pub width: u16,
    pub height: u16,
}

impl Dimensions {
    /// Create new dimensions
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Calculate total area in pixels
    pub fn area(&self) -> u32 {
        self.width as u32 * self.height as u32
    }
}

/// Axis-aligned rectangle (position + dimensions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub position: Position,
    pub dimensions: Dimensions,
}

impl Rect {
    pub fn new(x: i16, y: i16, width: u16, height: u16) -> Self {
        Self {
            position: Position::new(x, y),
            dimensions: Dimensions::new(width, height),
        }
    }

    pub fn x(&self) -> i16 {
        self.position.x
    }

    pub fn y(&self) -> i16 {
        self.position.y
    }

    pub fn width(&self) -> u16 {
        self.dimensions.width
    }

    pub fn height(&self) -> u16 {
        self.dimensions.height
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.area() == 0
    }
}

/// Which edges of the surface get a bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EdgeFlags {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

impl EdgeFlags {
    /// Derive the edge flags for a selection.
    ///
    /// The bottom edge is lit only for [`EdgeSelection::All`].
    pub fn for_selection(selection: EdgeSelection) -> Self {
        match selection {
            EdgeSelection::All => Self {
                top: true,
                bottom: true,
                left: true,
                right: true,
            },
            EdgeSelection::TopOnly => Self {
                top: true,
                bottom: false,
                left: false,
                right: false,
            },
            EdgeSelection::TopSides => Self {
                top: true,
                bottom: false,
                left: true,
                right: true,
            },
            EdgeSelection::SidesOnly => Self {
                top: false,
                bottom: false,
                left: true,
                right: true,
            },
        }
    }
}

/// Vertical span `[top, bottom)` of the side bars.
///
/// Side bars start below a drawn top bar and end above a drawn bottom bar,
/// otherwise they run the full surface height.
pub fn side_bar_span(flags: EdgeFlags, height: u16, ring_width: u16) -> (u16, u16) {
    let ring_width = ring_width.min(height);
    let top = if flags.top { ring_width } else { 0 };
    let bottom = if flags.bottom {
        height - ring_width
    } else {
        height
    };
    (top, bottom.max(top))
}

/// Compute the rectangles of the ring, relative to the surface origin.
///
/// The ring width is capped at half the smaller surface dimension so opposite
/// bars never cross. Empty rectangles are omitted.
pub fn edge_rects(surface: Dimensions, ring_width: u16, flags: EdgeFlags) -> Vec<Rect> {
    let Dimensions { width, height } = surface;
    let ring_width = ring_width.min(width.min(height) / 2);
    let (side_top, side_bottom) = side_bar_span(flags, height, ring_width);
    let side_height = side_bottom - side_top;

    let mut rects = Vec::with_capacity(4);

    if flags.top {
        rects.push(Rect::new(0, 0, width, ring_width));
    }
    if flags.bottom {
        rects.push(Rect::new(0, to_coord(height - ring_width), width, ring_width));
    }
    if flags.left {
        rects.push(Rect::new(0, to_coord(side_top), ring_width, side_height));
    }
    if flags.right {
        rects.push(Rect::new(
            to_coord(width - ring_width),
            to_coord(side_top),
            ring_width,
            side_height,
        ));
    }

    rects.retain(|rect| !rect.is_empty());
    rects
}

/// X11 coordinates are signed 16-bit; clamp offsets that would overflow
fn to_coord(value: u16) -> i16 {
    i16::try_from(value).unwrap_or(i16::MAX)
}
