//! evdev hotkey backend
//!
//! Monitors keyboards directly via /dev/input. Modifiers are read from the
//! live key state of every keyboard at press time, so Ctrl held on one
//! keyboard combines with a key pressed on another.
//!
//! Security warning: Requires 'input' group membership, which allows ALL applications
//! to read keyboard and mouse input. Use only if the X11 backend cannot be used.

use anyhow::{Context, Result, bail};
use evdev::{Device, EventType, KeyCode};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::constants::{input, paths, permissions};
use crate::input::backend::{
    BackendCapabilities, DispatchTable, HotkeyBackend, HotkeyCallback, poll_readable,
};
use crate::input::chord::{KeyChord, Modifiers};
use crate::input::device_detection;

pub struct EvdevBackend {
    table: DispatchTable,
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl EvdevBackend {
    /// Check that input devices are accessible before committing to this backend
    pub fn probe() -> Result<Self> {
        if !device_detection::check_permissions() {
            print_permission_error();
            bail!("Cannot access {}", paths::DEV_INPUT);
        }

        Ok(Self {
            table: DispatchTable::default(),
            stop: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        })
    }

    fn stop_listeners(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("evdev hotkey listener thread panicked");
            }
        }
    }
}

impl HotkeyBackend for EvdevBackend {
    fn name(&self) -> &'static str {
        "evdev"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            supports_cross_device_modifiers: true,
            requires_permissions: true,
            permission_description: Some(format!(
                "Requires '{}' group membership. Run: {}",
                permissions::INPUT_GROUP,
                permissions::ADD_TO_INPUT_GROUP
            )),
        }
    }

    fn activate(&mut self) -> Result<()> {
        if !self.handles.is_empty() {
            return Ok(());
        }

        let devices = device_detection::find_keyboards()?;

        // Every listener reads modifier state from ALL keyboards
        let keyboard_paths: Arc<Vec<PathBuf>> =
            Arc::new(devices.iter().map(|(_, path)| path.clone()).collect());

        // Fresh flag per activation; a previous deactivate left the old one set
        self.stop = Arc::new(AtomicBool::new(false));

        for (device, device_path) in devices {
            let table = self.table.clone();
            let stop = Arc::clone(&self.stop);
            let keyboard_paths = Arc::clone(&keyboard_paths);

            let handle = thread::Builder::new()
                .name("evdev-hotkeys".to_string())
                .spawn(move || {
                    info!(device = ?device.name(), path = %device_path.display(), "Hotkey listener started");
                    if let Err(e) = listen_for_hotkeys(device, &table, &keyboard_paths, &stop) {
                        error!(path = %device_path.display(), error = %e, "Hotkey listener error");
                    }
                })
                .context("Failed to spawn evdev hotkey listener thread")?;
            self.handles.push(handle);
        }

        Ok(())
    }

    fn install(&mut self, chord: KeyChord, callback: HotkeyCallback) -> Result<()> {
        self.table.insert(chord, callback)?;
        info!(chord = %chord, "Registered evdev hotkey");
        Ok(())
    }

    fn uninstall(&mut self, chord: &KeyChord) -> Result<()> {
        self.table.remove(chord);
        debug!(chord = %chord, "Unregistered evdev hotkey");
        Ok(())
    }

    fn deactivate(&mut self) {
        self.stop_listeners();
        self.table.clear();
        info!("evdev hotkey listeners stopped");
    }
}

impl Drop for EvdevBackend {
    fn drop(&mut self) {
        self.stop_listeners();
    }
}

/// Event loop processing raw input events from a single keyboard
fn listen_for_hotkeys(
    mut device: Device,
    table: &DispatchTable,
    keyboard_paths: &[PathBuf],
    stop: &AtomicBool,
) -> Result<()> {
    let fd = device.as_raw_fd();

    while !stop.load(Ordering::SeqCst) {
        if !poll_readable(fd, input::LISTENER_POLL_TIMEOUT_MS)? {
            continue;
        }

        // Value 1 is a physical press; auto-repeat (2) and release (0) never trigger
        let presses: Vec<u16> = device
            .fetch_events()
            .context("Failed to fetch events")?
            .filter(|event| {
                event.event_type() == EventType::KEY && event.value() == input::KEY_PRESS
            })
            .map(|event| event.code())
            .filter(|code| table.watches_key(*code))
            .collect();

        for key_code in presses {
            if stop.load(Ordering::SeqCst) {
                break;
            }

            let modifiers = held_modifiers(keyboard_paths);
            let chord = KeyChord::new(key_code, modifiers);
            debug!(chord = %chord, "Candidate hotkey press");
            table.dispatch(&chord);
        }
    }

    Ok(())
}

/// Query modifier state across all keyboards
fn held_modifiers(keyboard_paths: &[PathBuf]) -> Modifiers {
    let mut modifiers = Modifiers::default();

    for path in keyboard_paths {
        if let Ok(device) = Device::open(path)
            && let Ok(key_state) = device.get_key_state()
        {
            let held = modifiers_from_state(|code| key_state.contains(KeyCode(code)));
            modifiers.ctrl |= held.ctrl;
            modifiers.alt |= held.alt;
            modifiers.shift |= held.shift;
            modifiers.win |= held.win;
        }
    }

    modifiers
}

/// Derive modifiers from a key-down predicate (left or right variant counts)
fn modifiers_from_state(is_down: impl Fn(u16) -> bool) -> Modifiers {
    Modifiers {
        ctrl: is_down(input::KEY_LEFTCTRL) || is_down(input::KEY_RIGHTCTRL),
        alt: is_down(input::KEY_LEFTALT) || is_down(input::KEY_RIGHTALT),
        shift: is_down(input::KEY_LEFTSHIFT) || is_down(input::KEY_RIGHTSHIFT),
        win: is_down(input::KEY_LEFTMETA) || is_down(input::KEY_RIGHTMETA),
    }
}

/// Log a helpful error message when permissions are missing
pub fn print_permission_error() {
    error!(path = %paths::DEV_INPUT, "Cannot access input devices");
    error!(group = %permissions::INPUT_GROUP, "Hotkeys require group membership");
    error!(command = %permissions::ADD_TO_INPUT_GROUP, "Add user to input group");
    error!("  Then log out and back in");
    warn!(continuing = true, "Continuing without hotkey support...");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifiers_from_state() {
        let down = [input::KEY_RIGHTCTRL, input::KEY_LEFTSHIFT];
        let modifiers = modifiers_from_state(|code| down.contains(&code));

        assert_eq!(
            modifiers,
            Modifiers {
                ctrl: true,
                shift: true,
                ..Modifiers::default()
            }
        );

        let modifiers = modifiers_from_state(|code| code == input::KEY_LEFTMETA);
        assert!(modifiers.win && !modifiers.alt);
    }

    #[test]
    fn test_modifier_codes_match_evdev() {
        assert_eq!(KeyCode::KEY_LEFTCTRL.code(), input::KEY_LEFTCTRL);
        assert_eq!(KeyCode::KEY_RIGHTALT.code(), input::KEY_RIGHTALT);
        assert_eq!(KeyCode::KEY_RIGHTMETA.code(), input::KEY_RIGHTMETA);
        assert_eq!(KeyCode::KEY_TAB.code(), input::KEY_TAB);
    }
}
