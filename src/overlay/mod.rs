//! Screen-edge glow overlay

pub mod compositor;
pub mod x11_surface;

pub use compositor::{Compositor, OverlayParameters, Surface};
pub use x11_surface::{SurfaceEvents, X11Surface};
