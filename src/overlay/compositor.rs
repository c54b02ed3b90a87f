//! Overlay compositor: parameter state, visibility and repaint decisions
//!
//! Owns a [`Surface`] and derives the ring to draw from the four overlay
//! parameters plus the current primary display bounds. Setters always update
//! the stored parameter; the surface is only touched while visible.

use anyhow::Result;
use tracing::{debug, info};

use crate::common::color::GlowColor;
use crate::common::types::{Dimensions, EdgeFlags, EdgeSelection, Rect, edge_rects};
use crate::config::{Configuration, settings};
use crate::constants::defaults;

/// A borderless, click-through, always-on-top drawing surface
pub trait Surface {
    /// Bounds of the primary display in root coordinates
    fn primary_bounds(&mut self) -> Result<Rect>;

    /// Map the surface over `bounds` and raise it to the top
    fn show(&mut self, bounds: Rect) -> Result<()>;

    fn hide(&mut self) -> Result<()>;

    /// Clear the surface, then draw the ring described by `state`
    fn paint(&mut self, state: &OverlayState) -> Result<()>;
}

/// Inputs the ring is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayParameters {
    pub brightness: u8,
    pub color_temperature: u16,
    pub glow_width: u16,
    pub edge_selection: EdgeSelection,
}

impl Default for OverlayParameters {
    fn default() -> Self {
        Self {
            brightness: defaults::BRIGHTNESS,
            color_temperature: defaults::COLOR_TEMPERATURE,
            glow_width: defaults::GLOW_WIDTH,
            edge_selection: EdgeSelection::default(),
        }
    }
}

impl From<&Configuration> for OverlayParameters {
    fn from(config: &Configuration) -> Self {
        Self {
            brightness: config.brightness,
            color_temperature: config.color_temperature,
            glow_width: config.glow_width,
            edge_selection: config.edge_selection,
        }
    }
}

/// Everything needed to draw one frame; a pure function of parameters and screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayState {
    pub screen_rect: Rect,
    pub ring_width: u16,
    pub edge_flags: EdgeFlags,
    pub color: GlowColor,
}

impl OverlayState {
    pub fn derive(parameters: &OverlayParameters, screen_rect: Rect) -> Self {
        Self {
            screen_rect,
            ring_width: parameters.glow_width,
            edge_flags: EdgeFlags::for_selection(parameters.edge_selection),
            color: GlowColor::from_parameters(parameters.brightness, parameters.color_temperature),
        }
    }

    /// Ring rectangles relative to the surface origin
    pub fn rects(&self) -> Vec<Rect> {
        edge_rects(self.surface_size(), self.ring_width, self.edge_flags)
    }

    pub fn surface_size(&self) -> Dimensions {
        self.screen_rect.dimensions
    }
}

pub struct Compositor<S: Surface> {
    surface: S,
    parameters: OverlayParameters,
    enabled: bool,
    screen_rect: Rect,
}

impl<S: Surface> Compositor<S> {
    /// Create a hidden compositor
    pub fn new(surface: S, parameters: OverlayParameters) -> Self {
        Self {
            surface,
            parameters,
            enabled: false,
            screen_rect: Rect::default(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    #[cfg(test)]
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn parameters(&self) -> OverlayParameters {
        self.parameters
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current derived state (screen bounds as of the last geometry refresh)
    pub fn state(&self) -> OverlayState {
        OverlayState::derive(&self.parameters, self.screen_rect)
    }

    /// Hidden -> Visible: cover the primary display and paint
    /// State only changes once the surface is mapped
    pub fn enable(&mut self) -> Result<()> {
        let bounds = self.surface.primary_bounds()?;
        self.surface.show(bounds)?;
        self.screen_rect = bounds;
        self.enabled = true;
        info!(
            bounds = ?self.screen_rect,
            parameters = ?self.parameters,
            "Glow enabled"
        );
        self.repaint()
    }

    /// Visible -> Hidden
    pub fn disable(&mut self) -> Result<()> {
        self.surface.hide()?;
        self.enabled = false;
        info!("Glow disabled");
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        if enabled {
            self.enable()
        } else {
            self.disable()
        }
    }

    /// Flip visibility; returns the new state
    pub fn toggle(&mut self) -> Result<bool> {
        let enabled = !self.enabled;
        self.set_enabled(enabled)?;
        Ok(enabled)
    }

    pub fn set_brightness(&mut self, brightness: u8) -> Result<()> {
        self.parameters.brightness = settings::clamp_brightness(i64::from(brightness));
        self.parameters_changed()
    }

    pub fn set_color_temperature(&mut self, kelvin: u16) -> Result<()> {
        self.parameters.color_temperature = settings::clamp_color_temperature(i64::from(kelvin));
        self.parameters_changed()
    }

    pub fn set_glow_width(&mut self, width: u16) -> Result<()> {
        self.parameters.glow_width = settings::clamp_glow_width(i64::from(width));
        self.parameters_changed()
    }

    pub fn set_edge_selection(&mut self, selection: EdgeSelection) -> Result<()> {
        self.parameters.edge_selection = selection;
        self.parameters_changed()
    }

    /// Re-query the display bounds; moves and repaints only if they changed
    pub fn refresh_geometry(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let bounds = self.surface.primary_bounds()?;
        if bounds == self.screen_rect {
            return Ok(());
        }

        info!(from = ?self.screen_rect, to = ?bounds, "Display geometry changed");
        self.screen_rect = bounds;
        self.surface.show(bounds)?;
        self.repaint()
    }

    /// Paint the current state; no-op while hidden
    pub fn repaint(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let state = self.state();
        debug!(rects = state.rects().len(), color = ?state.color, "Repainting glow");
        self.surface.paint(&state)
    }

    fn parameters_changed(&mut self) -> Result<()> {
        if self.enabled {
            self.repaint()
        } else {
            Ok(())
        }
    }
}
