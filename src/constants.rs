//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Application identity
pub mod app {
    /// Human-readable application name (shown in logs)
    pub const NAME: &str = "Edge Light";

    /// Lower-case identifier used for directories and desktop entries
    pub const ID: &str = "edge-light";
}

/// X11 protocol and rendering constants
pub mod x11 {
    /// Standard 32-bit color depth required for translucent windows
    pub const ARGB_DEPTH: u8 = 32;

    /// Override redirect flag for unmanaged windows
    pub const OVERRIDE_REDIRECT: u32 = 1;

    /// Offset between evdev key codes and X11 keycodes on modern servers
    pub const EVDEV_KEYCODE_OFFSET: u16 = 8;

    /// Smallest and largest valid X11 keycode
    pub const MIN_KEYCODE: u16 = 8;
    pub const MAX_KEYCODE: u16 = 255;
}

/// Input event constants (from evdev)
pub mod input {
    /// Key press event value
    pub const KEY_PRESS: i32 = 1;

    /// Poll timeout for hotkey listener threads (milliseconds); bounds how
    /// long stopping a listener can take
    pub const LISTENER_POLL_TIMEOUT_MS: i32 = 250;

    /// Key code for Tab key - used to identify keyboard devices (from Linux input-event-codes.h)
    pub const KEY_TAB: u16 = 15;

    /// Modifier key codes (left/right pairs)
    pub const KEY_LEFTCTRL: u16 = 29;
    pub const KEY_RIGHTCTRL: u16 = 97;
    pub const KEY_LEFTSHIFT: u16 = 42;
    pub const KEY_RIGHTSHIFT: u16 = 54;
    pub const KEY_LEFTALT: u16 = 56;
    pub const KEY_RIGHTALT: u16 = 100;
    pub const KEY_LEFTMETA: u16 = 125;
    pub const KEY_RIGHTMETA: u16 = 126;
}

/// System paths
pub mod paths {
    /// Input device directory
    pub const DEV_INPUT: &str = "/dev/input";
}

/// User group permissions
pub mod permissions {
    /// Linux group name for input device access
    pub const INPUT_GROUP: &str = "input";

    /// Command to add user to input group
    pub const ADD_TO_INPUT_GROUP: &str = "sudo usermod -a -G input $USER";
}

/// Settings file location
pub mod settings {
    /// Settings filename (stored beside the executable)
    pub const FILENAME: &str = "edgelight_settings.json";
}

/// XDG autostart entry
pub mod autostart {
    /// Directory under the XDG config dir holding autostart entries
    pub const SUBDIR: &str = "autostart";

    /// Desktop entry filename
    pub const FILENAME: &str = "edge-light.desktop";
}

/// Hotkey binding names used by the control layer
pub mod hotkeys {
    /// Binding that toggles the glow on/off
    pub const TOGGLE: &str = "toggle";

    /// Binding that requests the settings panel
    pub const PANEL: &str = "panel";
}

/// Valid ranges for numeric settings (inclusive)
pub mod ranges {
    pub const BRIGHTNESS_MIN: u8 = 0;
    pub const BRIGHTNESS_MAX: u8 = 100;

    /// Warm (orange/yellow)
    pub const COLOR_TEMP_MIN: u16 = 2700;
    /// Cool (blue/white)
    pub const COLOR_TEMP_MAX: u16 = 6500;

    pub const GLOW_WIDTH_MIN: u16 = 50;
    pub const GLOW_WIDTH_MAX: u16 = 400;
}

/// Glow rendering constants
pub mod glow {
    /// Alpha used at brightness 0 (the glow never fully disappears while enabled)
    pub const ALPHA_FLOOR: u8 = 55;

    /// Alpha added between brightness 0 and brightness 100
    pub const ALPHA_SPAN: u8 = 200;

    /// Color temperature reference points (Kelvin -> RGB), sorted by Kelvin
    pub const COLOR_TEMP_TABLE: &[(u16, (u8, u8, u8))] = &[
        (2700, (255, 180, 107)), // Warm (incandescent)
        (3000, (255, 191, 125)), // Soft warm
        (3500, (255, 206, 151)), // Warm white
        (4000, (255, 219, 175)), // Neutral warm
        (4500, (255, 231, 198)), // Neutral
        (5000, (255, 242, 221)), // Neutral cool
        (5500, (255, 250, 244)), // Daylight
        (6000, (248, 250, 255)), // Cool daylight
        (6500, (235, 245, 255)), // Cool (blueish)
    ];
}

/// Default configuration values
/// These are used for a fresh install and for keys missing from an older settings file
pub mod defaults {
    pub const ENABLED: bool = false;

    /// Percentage (0-100)
    pub const BRIGHTNESS: u8 = 60;

    /// Kelvin
    pub const COLOR_TEMPERATURE: u16 = 4500;

    /// Pixels
    pub const GLOW_WIDTH: u16 = 175;

    pub const HOTKEY_TOGGLE: &str = "alt+shift+l";
    pub const HOTKEY_PANEL: &str = "alt+shift+p";
}
