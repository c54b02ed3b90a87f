//! Persisted configuration record and typed setting keys
//!
//! The JSON representation is a flat object with one key per field. Loading is
//! lenient: missing keys take their defaults, numeric values are clamped into
//! range, and a field holding a value of the wrong type falls back to its
//! default without discarding the rest of the file.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::common::types::EdgeSelection;
use crate::constants::{defaults, ranges};
use crate::input::normalize_combination;

/// The single persisted settings record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    #[serde(deserialize_with = "lenient_enabled")]
    pub enabled: bool,
    #[serde(deserialize_with = "lenient_brightness")]
    pub brightness: u8,
    #[serde(deserialize_with = "lenient_color_temperature")]
    pub color_temperature: u16,
    #[serde(deserialize_with = "lenient_glow_width")]
    pub glow_width: u16,
    #[serde(deserialize_with = "lenient_edge_selection")]
    pub edge_selection: EdgeSelection,
    #[serde(deserialize_with = "lenient_hotkey_toggle")]
    pub hotkey_toggle: String,
    #[serde(deserialize_with = "lenient_hotkey_panel")]
    pub hotkey_panel: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            enabled: defaults::ENABLED,
            brightness: defaults::BRIGHTNESS,
            color_temperature: defaults::COLOR_TEMPERATURE,
            glow_width: defaults::GLOW_WIDTH,
            edge_selection: EdgeSelection::default(),
            hotkey_toggle: defaults::HOTKEY_TOGGLE.to_string(),
            hotkey_panel: defaults::HOTKEY_PANEL.to_string(),
        }
    }
}

/// Names of the configuration fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    Enabled,
    Brightness,
    ColorTemperature,
    GlowWidth,
    EdgeSelection,
    HotkeyToggle,
    HotkeyPanel,
}

impl SettingKey {
    pub const ALL: [SettingKey; 7] = [
        SettingKey::Enabled,
        SettingKey::Brightness,
        SettingKey::ColorTemperature,
        SettingKey::GlowWidth,
        SettingKey::EdgeSelection,
        SettingKey::HotkeyToggle,
        SettingKey::HotkeyPanel,
    ];

    /// JSON key in the settings file
    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::Enabled => "enabled",
            SettingKey::Brightness => "brightness",
            SettingKey::ColorTemperature => "color_temperature",
            SettingKey::GlowWidth => "glow_width",
            SettingKey::EdgeSelection => "edge_selection",
            SettingKey::HotkeyToggle => "hotkey_toggle",
            SettingKey::HotkeyPanel => "hotkey_panel",
        }
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A setting key together with its typed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    Enabled(bool),
    Brightness(u8),
    ColorTemperature(u16),
    GlowWidth(u16),
    EdgeSelection(EdgeSelection),
    HotkeyToggle(String),
    HotkeyPanel(String),
}

impl Setting {
    pub fn key(&self) -> SettingKey {
        match self {
            Setting::Enabled(_) => SettingKey::Enabled,
            Setting::Brightness(_) => SettingKey::Brightness,
            Setting::ColorTemperature(_) => SettingKey::ColorTemperature,
            Setting::GlowWidth(_) => SettingKey::GlowWidth,
            Setting::EdgeSelection(_) => SettingKey::EdgeSelection,
            Setting::HotkeyToggle(_) => SettingKey::HotkeyToggle,
            Setting::HotkeyPanel(_) => SettingKey::HotkeyPanel,
        }
    }

    /// Bring the value into its valid range (numeric clamp, combination normalization)
    pub fn sanitized(self) -> Self {
        match self {
            Setting::Brightness(value) => Setting::Brightness(clamp_brightness(i64::from(value))),
            Setting::ColorTemperature(value) => {
                Setting::ColorTemperature(clamp_color_temperature(i64::from(value)))
            }
            Setting::GlowWidth(value) => Setting::GlowWidth(clamp_glow_width(i64::from(value))),
            Setting::HotkeyToggle(combo) => Setting::HotkeyToggle(normalize_combination(&combo)),
            Setting::HotkeyPanel(combo) => Setting::HotkeyPanel(normalize_combination(&combo)),
            other => other,
        }
    }
}

impl Configuration {
    /// Read one field as a typed setting
    pub fn get(&self, key: SettingKey) -> Setting {
        match key {
            SettingKey::Enabled => Setting::Enabled(self.enabled),
            SettingKey::Brightness => Setting::Brightness(self.brightness),
            SettingKey::ColorTemperature => Setting::ColorTemperature(self.color_temperature),
            SettingKey::GlowWidth => Setting::GlowWidth(self.glow_width),
            SettingKey::EdgeSelection => Setting::EdgeSelection(self.edge_selection),
            SettingKey::HotkeyToggle => Setting::HotkeyToggle(self.hotkey_toggle.clone()),
            SettingKey::HotkeyPanel => Setting::HotkeyPanel(self.hotkey_panel.clone()),
        }
    }

    /// Write one field, sanitizing the value first. Returns the stored value.
    pub fn apply(&mut self, setting: Setting) -> Setting {
        let setting = setting.sanitized();
        match &setting {
            Setting::Enabled(value) => self.enabled = *value,
            Setting::Brightness(value) => self.brightness = *value,
            Setting::ColorTemperature(value) => self.color_temperature = *value,
            Setting::GlowWidth(value) => self.glow_width = *value,
            Setting::EdgeSelection(value) => self.edge_selection = *value,
            Setting::HotkeyToggle(value) => self.hotkey_toggle = value.clone(),
            Setting::HotkeyPanel(value) => self.hotkey_panel = value.clone(),
        }
        setting
    }

    /// Settings from `other` whose value differs from `self`, in key order
    pub fn changes_to(&self, other: &Configuration) -> Vec<Setting> {
        SettingKey::ALL
            .into_iter()
            .map(|key| other.get(key))
            .filter(|setting| *setting != self.get(setting.key()))
            .collect()
    }
}

pub fn clamp_brightness(value: i64) -> u8 {
    value.clamp(
        i64::from(ranges::BRIGHTNESS_MIN),
        i64::from(ranges::BRIGHTNESS_MAX),
    ) as u8
}

pub fn clamp_color_temperature(value: i64) -> u16 {
    value.clamp(
        i64::from(ranges::COLOR_TEMP_MIN),
        i64::from(ranges::COLOR_TEMP_MAX),
    ) as u16
}

pub fn clamp_glow_width(value: i64) -> u16 {
    value.clamp(
        i64::from(ranges::GLOW_WIDTH_MIN),
        i64::from(ranges::GLOW_WIDTH_MAX),
    ) as u16
}

// ==============================================================================
// Lenient field deserializers
// ==============================================================================

/// Deserialize a field as raw JSON and convert it, falling back to `default`
/// (with a warning) when the value has the wrong shape
fn lenient<'de, D, T>(
    deserializer: D,
    key: SettingKey,
    default: T,
    convert: impl FnOnce(&Value) -> Option<T>,
) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(convert(&value).unwrap_or_else(|| {
        warn!(key = %key, value = %value, "Invalid value in settings file, using default");
        default
    }))
}

/// JSON numbers may be written as integers or floats; floats are truncated
fn as_integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|number| number as i64))
}

fn lenient_enabled<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    lenient(deserializer, SettingKey::Enabled, defaults::ENABLED, Value::as_bool)
}

fn lenient_brightness<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    lenient(
        deserializer,
        SettingKey::Brightness,
        defaults::BRIGHTNESS,
        |value| as_integer(value).map(clamp_brightness),
    )
}

fn lenient_color_temperature<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<u16, D::Error> {
    lenient(
        deserializer,
        SettingKey::ColorTemperature,
        defaults::COLOR_TEMPERATURE,
        |value| as_integer(value).map(clamp_color_temperature),
    )
}

fn lenient_glow_width<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    lenient(
        deserializer,
        SettingKey::GlowWidth,
        defaults::GLOW_WIDTH,
        |value| as_integer(value).map(clamp_glow_width),
    )
}

fn lenient_edge_selection<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<EdgeSelection, D::Error> {
    lenient(
        deserializer,
        SettingKey::EdgeSelection,
        EdgeSelection::default(),
        |value| value.as_str().map(|s| EdgeSelection::from(s.to_string())),
    )
}

fn lenient_combination(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(normalize_combination)
        .filter(|combo| !combo.is_empty())
}

fn lenient_hotkey_toggle<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    lenient(
        deserializer,
        SettingKey::HotkeyToggle,
        defaults::HOTKEY_TOGGLE.to_string(),
        lenient_combination,
    )
}

fn lenient_hotkey_panel<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    lenient(
        deserializer,
        SettingKey::HotkeyPanel,
        defaults::HOTKEY_PANEL.to_string(),
        lenient_combination,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_defaults() {
        let config = Configuration::default();

        assert!(!config.enabled);
        assert_eq!(config.brightness, 60);
        assert_eq!(config.color_temperature, 4500);
        assert_eq!(config.glow_width, 175);
        assert_eq!(config.edge_selection, EdgeSelection::All);
        assert_eq!(config.hotkey_toggle, "alt+shift+l");
        assert_eq!(config.hotkey_panel, "alt+shift+p");
    }

    #[test]
    fn test_serialization_uses_flat_keys() {
        let json = serde_json::to_value(Configuration::default()).unwrap();
        let object = json.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        let mut expected: Vec<&str> = SettingKey::ALL.iter().map(|k| k.as_str()).collect();
        expected.sort_unstable();
        assert_eq!(keys, expected);
        assert_eq!(object["edge_selection"], "all");
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let config: Configuration =
            serde_json::from_str(r#"{"brightness": 80, "edge_selection": "top"}"#).unwrap();

        assert_eq!(config.brightness, 80);
        assert_eq!(config.edge_selection, EdgeSelection::TopOnly);
        assert_eq!(config.glow_width, defaults::GLOW_WIDTH);
        assert_eq!(config.hotkey_panel, defaults::HOTKEY_PANEL);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let config: Configuration = serde_json::from_str(
            r#"{"brightness": 250, "color_temperature": 1000, "glow_width": 9000}"#,
        )
        .unwrap();

        assert_eq!(config.brightness, 100);
        assert_eq!(config.color_temperature, 2700);
        assert_eq!(config.glow_width, 400);

        let config: Configuration = serde_json::from_str(r#"{"brightness": -5}"#).unwrap();
        assert_eq!(config.brightness, 0);
    }

    #[test]
    fn test_wrong_types_fall_back_per_field() {
        let config: Configuration = serde_json::from_str(
            r#"{"enabled": "yes", "brightness": "bright", "glow_width": 120.7, "hotkey_toggle": 42}"#,
        )
        .unwrap();

        assert_eq!(config.enabled, defaults::ENABLED);
        assert_eq!(config.brightness, defaults::BRIGHTNESS);
        assert_eq!(config.glow_width, 120);
        assert_eq!(config.hotkey_toggle, defaults::HOTKEY_TOGGLE);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config: Configuration =
            serde_json::from_str(r#"{"enabled": true, "window_x": 12}"#).unwrap();
        assert!(config.enabled);
    }

    #[test]
    fn test_hotkeys_are_normalized_on_load() {
        let config: Configuration =
            serde_json::from_str(r#"{"hotkey_toggle": " Shift + ALT + L "}"#).unwrap();
        assert_eq!(config.hotkey_toggle, "alt+shift+l");
    }

    #[test]
    fn test_apply_clamps_and_returns_stored_value() {
        let mut config = Configuration::default();

        assert_eq!(config.apply(Setting::Brightness(180)), Setting::Brightness(100));
        assert_eq!(config.brightness, 100);

        assert_eq!(
            config.apply(Setting::GlowWidth(10)),
            Setting::GlowWidth(ranges::GLOW_WIDTH_MIN)
        );
        assert_eq!(
            config.apply(Setting::HotkeyPanel("Ctrl + Alt + P".to_string())),
            Setting::HotkeyPanel("ctrl+alt+p".to_string())
        );
    }

    #[test]
    fn test_get_matches_fields() {
        let config = Configuration::default();
        for key in SettingKey::ALL {
            assert_eq!(config.get(key).key(), key);
        }
        assert_eq!(config.get(SettingKey::GlowWidth), Setting::GlowWidth(175));
    }

    #[test]
    fn test_changes_to_lists_only_differences() {
        let base = Configuration::default();
        let mut edited = base.clone();
        edited.brightness = 30;
        edited.edge_selection = EdgeSelection::SidesOnly;

        assert_eq!(
            base.changes_to(&edited),
            vec![
                Setting::Brightness(30),
                Setting::EdgeSelection(EdgeSelection::SidesOnly)
            ]
        );
        assert!(base.changes_to(&base).is_empty());
    }
}
