//! Color derivation for the glow
//!
//! Provides:
//! - Color temperature (Kelvin) to RGB interpolation over a fixed reference table
//! - Brightness to alpha mapping
//! - Conversion to X11 render Colors (16-bit per channel, premultiplied)

use x11rb::protocol::render::Color;

use crate::constants::{glow, ranges};

/// 8-bit RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

/// Find the table entries bracketing `kelvin` (`lo <= kelvin <= hi`).
///
/// Both bounds collapse to the same entry when `kelvin` sits exactly on a
/// reference point or outside the table.
fn bracketing_entries(kelvin: u16) -> ((u16, Rgb), (u16, Rgb)) {
    let table = glow::COLOR_TEMP_TABLE;
    let first = table[0];
    let last = table[table.len() - 1];

    let lo = table
        .iter()
        .rev()
        .find(|(k, _)| *k <= kelvin)
        .copied()
        .unwrap_or(first);
    let hi = table
        .iter()
        .find(|(k, _)| *k >= kelvin)
        .copied()
        .unwrap_or(last);

    ((lo.0, lo.1.into()), (hi.0, hi.1.into()))
}

/// Interpolate the RGB value for a color temperature.
///
/// The input is clamped to the supported Kelvin range, then each channel is
/// linearly interpolated between the two bracketing reference points and
/// truncated to an integer.
pub fn interpolate_color_temperature(kelvin: u16) -> Rgb {
    let kelvin = kelvin.clamp(ranges::COLOR_TEMP_MIN, ranges::COLOR_TEMP_MAX);
    let ((lo_k, lo), (hi_k, hi)) = bracketing_entries(kelvin);

    if lo_k == hi_k {
        return lo;
    }

    let ratio = f64::from(kelvin - lo_k) / f64::from(hi_k - lo_k);
    let channel = |from: u8, to: u8| -> u8 {
        let value = f64::from(from) + ratio * (f64::from(to) - f64::from(from));
        value as u8
    };

    Rgb::new(channel(lo.r, hi.r), channel(lo.g, hi.g), channel(lo.b, hi.b))
}

/// Map brightness (0-100, clamped) to an 8-bit alpha in `[55, 255]`
pub fn alpha_for_brightness(brightness: u8) -> u8 {
    let brightness = u16::from(brightness.min(ranges::BRIGHTNESS_MAX));
    let span = brightness * u16::from(glow::ALPHA_SPAN) / u16::from(ranges::BRIGHTNESS_MAX);
    glow::ALPHA_FLOOR + span as u8
}

/// Flat glow color: RGB plus straight (non-premultiplied) alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GlowColor {
    pub rgb: Rgb,
    pub alpha: u8,
}

impl GlowColor {
    /// Derive the glow color from the overlay parameters
    pub fn from_parameters(brightness: u8, color_temperature: u16) -> Self {
        Self {
            rgb: interpolate_color_temperature(color_temperature),
            alpha: alpha_for_brightness(brightness),
        }
    }

    /// Convert to X11 render Color (16-bit per channel, premultiplied by alpha)
    pub fn to_x11_color(self) -> Color {
        // Scale from 8-bit (0-255) to 16-bit (0-65535)
        let scale = |v: u8| {
            let v = u32::from(v);
            (v << 8 | v) as u16
        };
        let premultiply =
            |v: u8| (u32::from(scale(v)) * u32::from(self.alpha) / 255) as u16;

        Color {
            red: premultiply(self.rgb.r),
            green: premultiply(self.rgb.g),
            blue: premultiply(self.rgb.b),
            alpha: scale(self.alpha),
        }
    }
}

/// Fully transparent render color (used to clear the surface)
pub const TRANSPARENT: Color = Color {
    red: 0,
    green: 0,
    blue: 0,
    alpha: 0,
};
