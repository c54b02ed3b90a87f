//! X11 rendition of the overlay surface
//!
//! A 32-bit ARGB override-redirect window with an empty input shape, so it
//! stays above other windows without receiving clicks. The ring is painted
//! with RENDER FillRectangles onto a picture of the window.

use anyhow::{Context, Result};
use std::os::unix::io::{AsRawFd, RawFd};
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::render::{ConnectionExt as RenderExt, CreatePictureAux, PictOp, Picture};
use x11rb::protocol::shape::{ConnectionExt as ShapeExt, SK, SO};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use super::compositor::{OverlayState, Surface};
use crate::common::color::TRANSPARENT;
use crate::common::types::Rect;
use crate::constants::{app, x11};
use crate::x11::{CachedFormats, find_argb_visual, primary_bounds, select_geometry_events};

/// What a batch of X events asks the compositor to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceEvents {
    pub geometry_changed: bool,
    pub exposed: bool,
}

impl SurfaceEvents {
    pub fn is_empty(&self) -> bool {
        !self.geometry_changed && !self.exposed
    }
}

pub struct X11Surface {
    conn: RustConnection,
    root: Window,
    window: Window,
    colormap: Colormap,
    picture: Picture,
    randr: bool,
    mapped: bool,
    size: (u16, u16),
}

impl X11Surface {
    /// Connect to the display and create the (unmapped) overlay window
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(None).context("Failed to connect to X11 display")?;
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .with_context(|| format!("X11 screen {} not found", screen_num))?
            .clone();
        let root = screen.root;

        let visual = find_argb_visual(&screen).with_context(|| {
            format!(
                "No {}-bit TrueColor visual; a compositing-capable X server is required",
                x11::ARGB_DEPTH
            )
        })?;
        let formats = CachedFormats::new(&conn)?;
        let randr = select_geometry_events(&conn, root)?;

        let colormap = conn.generate_id().context("Failed to generate colormap ID")?;
        conn.create_colormap(ColormapAlloc::NONE, colormap, root, visual)
            .context("Failed to create ARGB colormap")?;

        let window = create_window(&conn, root, visual, colormap)?;
        setup_window_properties(&conn, window)?;

        let picture = conn.generate_id().context("Failed to generate ID for window picture")?;
        conn.render_create_picture(picture, window, formats.argb, &CreatePictureAux::new())
            .context("Failed to create overlay picture")?;

        conn.flush().context("Failed to flush X11 connection")?;
        info!(window = window, visual = visual, randr = randr, "Created overlay window");

        Ok(Self {
            conn,
            root,
            window,
            colormap,
            picture,
            randr,
            mapped: false,
            size: (1, 1),
        })
    }

    /// Connection file descriptor, for readiness polling on the event loop
    pub fn raw_fd(&self) -> RawFd {
        self.conn.stream().as_raw_fd()
    }

    /// Drain pending X events, reporting what needs refreshing
    pub fn drain_events(&self) -> Result<SurfaceEvents> {
        let mut events = SurfaceEvents::default();

        while let Some(event) = self
            .conn
            .poll_for_event()
            .context("Failed to read X11 event")?
        {
            match event {
                Event::Expose(expose) if expose.window == self.window && expose.count == 0 => {
                    events.exposed = true;
                }
                Event::ConfigureNotify(configure) if configure.window == self.root => {
                    debug!(
                        width = configure.width,
                        height = configure.height,
                        "Root window reconfigured"
                    );
                    events.geometry_changed = true;
                }
                Event::RandrScreenChangeNotify(_) | Event::RandrNotify(_) => {
                    debug!("RandR configuration changed");
                    events.geometry_changed = true;
                }
                Event::Error(e) => {
                    warn!(error = ?e, "X11 error on overlay connection");
                }
                _ => {}
            }
        }

        Ok(events)
    }
}

impl Surface for X11Surface {
    fn primary_bounds(&mut self) -> Result<Rect> {
        primary_bounds(&self.conn, self.root, self.randr)
    }

    fn show(&mut self, bounds: Rect) -> Result<()> {
        // X11 rejects zero-sized windows
        let width = bounds.width().max(1);
        let height = bounds.height().max(1);

        self.conn
            .configure_window(
                self.window,
                &ConfigureWindowAux::new()
                    .x(i32::from(bounds.x()))
                    .y(i32::from(bounds.y()))
                    .width(u32::from(width))
                    .height(u32::from(height))
                    .stack_mode(StackMode::ABOVE),
            )
            .context("Failed to move overlay window")?;
        self.size = (width, height);

        if !self.mapped {
            self.conn
                .map_window(self.window)
                .context("Failed to map overlay window")?;
            self.mapped = true;
        }

        self.conn.flush().context("Failed to flush X11 connection")?;
        Ok(())
    }

    fn hide(&mut self) -> Result<()> {
        if self.mapped {
            self.conn
                .unmap_window(self.window)
                .context("Failed to unmap overlay window")?;
            self.mapped = false;
            self.conn.flush().context("Failed to flush X11 connection")?;
        }
        Ok(())
    }

    fn paint(&mut self, state: &OverlayState) -> Result<()> {
        let (width, height) = self.size;
        let full = Rectangle {
            x: 0,
            y: 0,
            width,
            height,
        };
        self.conn
            .render_fill_rectangles(PictOp::SRC, self.picture, TRANSPARENT, &[full])
            .context("Failed to clear overlay")?;

        let rects: Vec<Rectangle> = state
            .rects()
            .into_iter()
            .map(|rect| Rectangle {
                x: rect.x(),
                y: rect.y(),
                width: rect.width(),
                height: rect.height(),
            })
            .collect();

        if !rects.is_empty() {
            self.conn
                .render_fill_rectangles(
                    PictOp::SRC,
                    self.picture,
                    state.color.to_x11_color(),
                    &rects,
                )
                .context("Failed to paint glow")?;
        }

        self.conn.flush().context("Failed to flush X11 connection")?;
        Ok(())
    }
}

impl Drop for X11Surface {
    fn drop(&mut self) {
        let _ = self.conn.render_free_picture(self.picture);
        let _ = self.conn.destroy_window(self.window);
        let _ = self.conn.free_colormap(self.colormap);
        if let Err(e) = self.conn.flush() {
            warn!(error = %e, "Failed to flush X11 connection while destroying overlay");
        }
    }
}

fn create_window(
    conn: &RustConnection,
    root: Window,
    visual: Visualid,
    colormap: Colormap,
) -> Result<Window> {
    let window = conn.generate_id().context("Failed to generate X11 window ID")?;
    conn.create_window(
        x11::ARGB_DEPTH,
        window,
        root,
        0,
        0,
        1,
        1,
        0,
        WindowClass::INPUT_OUTPUT,
        visual,
        // A 32-bit visual needs explicit border pixel and colormap, or CreateWindow fails with BadMatch
        &CreateWindowAux::new()
            .background_pixel(0)
            .border_pixel(0)
            .colormap(colormap)
            .override_redirect(x11::OVERRIDE_REDIRECT)
            .event_mask(EventMask::EXPOSURE),
    )
    .context("Failed to create overlay window")?;

    Ok(window)
}

/// Click-through input shape and identification properties
fn setup_window_properties(conn: &RustConnection, window: Window) -> Result<()> {
    // Empty input region: pointer events fall through to the windows below
    conn.shape_rectangles(
        SO::SET,
        SK::INPUT,
        ClipOrdering::UNSORTED,
        window,
        0,
        0,
        &[],
    )
    .context("Failed to clear overlay input shape (SHAPE extension missing?)")?;

    let class = format!("{id}\0{id}\0", id = app::ID);
    conn.change_property8(
        PropMode::REPLACE,
        window,
        AtomEnum::WM_CLASS,
        AtomEnum::STRING,
        class.as_bytes(),
    )
    .context("Failed to set WM_CLASS on overlay window")?;

    conn.change_property8(
        PropMode::REPLACE,
        window,
        AtomEnum::WM_NAME,
        AtomEnum::STRING,
        app::NAME.as_bytes(),
    )
    .context("Failed to set WM_NAME on overlay window")?;

    Ok(())
}
