//! Key-combination strings and their parsed form
//!
//! Combinations are written as `+`-separated tokens (`"alt+shift+l"`).
//! Normalization makes them case-, whitespace- and modifier-order-insensitive;
//! [`KeyChord`] is the installable form (one evdev key code plus modifiers).

use anyhow::{Result, bail};
use evdev::KeyCode;
use std::str::FromStr;

/// Modifier keys in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Win,
}

impl Modifier {
    pub const ALL: [Modifier; 4] = [Modifier::Ctrl, Modifier::Alt, Modifier::Shift, Modifier::Win];

    /// Resolve a lower-case token, accepting the usual aliases
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "alt" => Some(Modifier::Alt),
            "shift" => Some(Modifier::Shift),
            "win" | "windows" | "cmd" | "super" | "meta" => Some(Modifier::Win),
            _ => None,
        }
    }

    /// Token used in the normalized form
    pub fn token(self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
            Modifier::Win => "win",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Modifier::Ctrl => "Ctrl",
            Modifier::Alt => "Alt",
            Modifier::Shift => "Shift",
            Modifier::Win => "Win",
        }
    }
}

/// Held modifier state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub win: bool,
}

impl Modifiers {
    pub fn contains(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Ctrl => self.ctrl,
            Modifier::Alt => self.alt,
            Modifier::Shift => self.shift,
            Modifier::Win => self.win,
        }
    }

    pub fn insert(&mut self, modifier: Modifier) {
        match modifier {
            Modifier::Ctrl => self.ctrl = true,
            Modifier::Alt => self.alt = true,
            Modifier::Shift => self.shift = true,
            Modifier::Win => self.win = true,
        }
    }

    /// Held modifiers in canonical order
    pub fn iter(&self) -> impl Iterator<Item = Modifier> + '_ {
        Modifier::ALL.into_iter().filter(|m| self.contains(*m))
    }
}

/// Split a combination into its modifiers and remaining key tokens
/// (lower-case, whitespace removed, empty tokens dropped)
fn split_combination(combination: &str) -> (Modifiers, Vec<String>) {
    let cleaned: String = combination
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    let mut modifiers = Modifiers::default();
    let mut keys = Vec::new();

    for token in cleaned.split('+').filter(|t| !t.is_empty()) {
        match Modifier::from_token(token) {
            Some(modifier) => modifiers.insert(modifier),
            None => keys.push(token.to_string()),
        }
    }

    (modifiers, keys)
}

/// Canonical form of a combination: lower-case, `+`-joined, modifiers first in
/// canonical order, then the remaining keys in their original order
pub fn normalize_combination(combination: &str) -> String {
    let (modifiers, keys) = split_combination(combination);

    modifiers
        .iter()
        .map(|m| m.token().to_string())
        .chain(keys)
        .collect::<Vec<_>>()
        .join("+")
}

/// Human-readable form, e.g. `"alt+shift+l"` -> `"Alt+Shift+L"`
pub fn display_string(combination: &str) -> String {
    let (modifiers, keys) = split_combination(combination);

    modifiers
        .iter()
        .map(|m| m.label().to_string())
        .chain(keys.iter().map(|key| display_key(key)))
        .collect::<Vec<_>>()
        .join("+")
}

/// Single characters are upper-cased, longer names capitalized
fn display_key(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        None => String::new(),
        Some(first) if chars.as_str().is_empty() => first.to_uppercase().collect(),
        Some(first) => first
            .to_uppercase()
            .chain(chars.as_str().to_lowercase().chars())
            .collect(),
    }
}

/// A physical key plus the modifiers that must be held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    /// evdev key code (e.g., KEY_L = 38)
    pub key_code: u16,
    pub modifiers: Modifiers,
}

impl KeyChord {
    pub fn new(key_code: u16, modifiers: Modifiers) -> Self {
        Self {
            key_code,
            modifiers,
        }
    }

    /// Parse a combination string. Installable combinations have exactly one
    /// non-modifier key, and that key must resolve to a known key code.
    pub fn parse(combination: &str) -> Result<Self> {
        let (modifiers, keys) = split_combination(combination);

        let key = match keys.as_slice() {
            [key] => key,
            [] => bail!("Combination '{}' has no key besides modifiers", combination),
            _ => bail!(
                "Combination '{}' has {} non-modifier keys, expected one",
                combination,
                keys.len()
            ),
        };

        let Some(key_code) = key_name_to_code(key) else {
            bail!("Unknown key '{}' in combination '{}'", key, combination);
        };

        Ok(Self::new(key_code, modifiers))
    }
}

impl std::fmt::Display for KeyChord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for modifier in self.modifiers.iter() {
            write!(f, "{}+", modifier.label())?;
        }
        write!(f, "{:?}", KeyCode(self.key_code))
    }
}

/// Convert a lower-case key token to an evdev key code
///
/// Short aliases are mapped to their Linux names first, everything else goes
/// through evdev's `KEY_*` parser (`"f5"` -> `KEY_F5`, `"space"` -> `KEY_SPACE`).
fn key_name_to_code(name: &str) -> Option<u16> {
    let linux_name = match name {
        "escape" => "ESC",
        "return" => "ENTER",
        "del" => "DELETE",
        "ins" => "INSERT",
        "pgup" => "PAGEUP",
        "pgdn" => "PAGEDOWN",
        "arrowup" => "UP",
        "arrowdown" => "DOWN",
        "arrowleft" => "LEFT",
        "arrowright" => "RIGHT",
        "print" | "printscreen" | "prtsc" => "SYSRQ",
        "`" => "GRAVE",
        "-" => "MINUS",
        "=" => "EQUAL",
        "[" => "LEFTBRACE",
        "]" => "RIGHTBRACE",
        ";" => "SEMICOLON",
        "'" => "APOSTROPHE",
        "\\" => "BACKSLASH",
        "," => "COMMA",
        "." => "DOT",
        "/" => "SLASH",
        other => other,
    };

    KeyCode::from_str(&format!("KEY_{}", linux_name.to_uppercase()))
        .ok()
        .map(|key| key.code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_combination() {
        assert_eq!(normalize_combination(" Shift + ALT+l "), "alt+shift+l");
        assert_eq!(normalize_combination("alt+shift+l"), "alt+shift+l");
        assert_eq!(normalize_combination("Control+Super+F5"), "ctrl+win+f5");
        assert_eq!(normalize_combination("cmd+meta+shift+x"), "shift+win+x");
        assert_eq!(normalize_combination("++alt++t"), "alt+t");
        assert_eq!(normalize_combination(""), "");
    }

    #[test]
    fn test_normalize_is_order_insensitive() {
        let variants = ["ctrl+alt+t", "alt+ctrl+t", "T+ALT+CTRL", " t + control + alt"];
        for variant in variants {
            assert_eq!(normalize_combination(variant), "ctrl+alt+t", "{}", variant);
        }
    }

    #[test]
    fn test_display_string() {
        assert_eq!(display_string("alt+shift+l"), "Alt+Shift+L");
        assert_eq!(display_string("shift+ctrl+win+a"), "Ctrl+Shift+Win+A");
        assert_eq!(display_string("ctrl+alt+delete"), "Ctrl+Alt+Delete");
        assert_eq!(display_string("ctrl+F12"), "Ctrl+F12");
        assert_eq!(display_string("control+PAGEUP"), "Ctrl+Pageup");
    }

    #[test]
    fn test_parse_chord() {
        let chord = KeyChord::parse("alt+shift+l").unwrap();
        assert_eq!(chord.key_code, KeyCode::KEY_L.code());
        assert_eq!(
            chord.modifiers,
            Modifiers {
                alt: true,
                shift: true,
                ..Modifiers::default()
            }
        );

        let chord = KeyChord::parse("ctrl+f1").unwrap();
        assert_eq!(chord.key_code, 59);
        assert!(chord.modifiers.ctrl);

        assert_eq!(KeyChord::parse("win+space").unwrap().key_code, 57);
        assert_eq!(KeyChord::parse("ctrl+escape").unwrap().key_code, 1);
        assert_eq!(KeyChord::parse("alt+7").unwrap().key_code, KeyCode::KEY_7.code());
    }

    #[test]
    fn test_parse_rejects_uninstallable_combinations() {
        assert!(KeyChord::parse("ctrl+alt").is_err());
        assert!(KeyChord::parse("").is_err());
        assert!(KeyChord::parse("ctrl+a+b").is_err());
        assert!(KeyChord::parse("alt+notakey").is_err());
    }

    #[test]
    fn test_parse_ignores_modifier_order() {
        assert_eq!(
            KeyChord::parse("shift+alt+l").unwrap(),
            KeyChord::parse("ALT + Shift + L").unwrap()
        );
    }

    #[test]
    fn test_pressed_chord_equals_parsed() {
        let chord = KeyChord::parse("ctrl+alt+t").unwrap();
        let held = Modifiers {
            ctrl: true,
            alt: true,
            ..Modifiers::default()
        };

        assert_eq!(chord, KeyChord::new(KeyCode::KEY_T.code(), held));
        assert_ne!(chord, KeyChord::new(KeyCode::KEY_T.code(), Modifiers::default()));
        assert_ne!(chord, KeyChord::new(KeyCode::KEY_Y.code(), held));
    }

    #[test]
    fn test_chord_display() {
        let chord = KeyChord::parse("alt+shift+l").unwrap();
        assert_eq!(chord.to_string(), "Alt+Shift+KEY_L");
    }
}
