//! X11 XGrabKey hotkey backend
//!
//! Uses X11's native global hotkey registration via XGrabKey.
//! This is the default backend as it requires no special permissions.
//!
//! Limitations:
//! - Cannot distinguish between different physical keyboards
//! - A chord already grabbed by another client cannot be installed
//! - Some exotic key combinations may not work under XWayland

use anyhow::{Context, Result, bail};
use std::collections::HashSet;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::constants::{input, x11};
use crate::input::backend::{
    BackendCapabilities, DispatchTable, HotkeyBackend, HotkeyCallback, poll_readable,
};
use crate::input::chord::{KeyChord, Modifiers};

/// Lock-key permutations grabbed alongside every chord.
/// X11 treats "Ctrl+C" and "Ctrl+C+NumLock" as different hotkeys.
fn ignored_lock_masks() -> [ModMask; 4] {
    [
        ModMask::from(0u16),         // No lock keys
        ModMask::M2,                 // NumLock (Mod2)
        ModMask::LOCK,               // CapsLock
        ModMask::M2 | ModMask::LOCK, // NumLock + CapsLock
    ]
}

struct ListenerThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct X11Backend {
    conn: Arc<RustConnection>,
    root: Window,
    table: DispatchTable,
    listener: Option<ListenerThread>,
}

impl X11Backend {
    /// Open a dedicated connection for key grabs
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(None).context("Failed to connect to X11 for hotkey listening")?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .with_context(|| format!("X11 screen {} not found", screen_num))?;

        info!("X11 hotkey backend connected to display");

        Ok(Self {
            conn: Arc::new(conn),
            root,
            table: DispatchTable::default(),
            listener: None,
        })
    }

    fn stop_listener(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.stop.store(true, Ordering::SeqCst);
            if listener.handle.join().is_err() {
                error!("X11 hotkey listener thread panicked");
            }
        }
    }
}

impl HotkeyBackend for X11Backend {
    fn name(&self) -> &'static str {
        "X11"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            supports_cross_device_modifiers: false,
            requires_permissions: false,
            permission_description: None,
        }
    }

    fn activate(&mut self) -> Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let conn = Arc::clone(&self.conn);
        let table = self.table.clone();
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("x11-hotkeys".to_string())
            .spawn(move || {
                if let Err(e) = run_x11_listener(&conn, &table, &thread_stop) {
                    error!(error = %e, "X11 hotkey listener error");
                }
            })
            .context("Failed to spawn X11 hotkey listener thread")?;

        self.listener = Some(ListenerThread { stop, handle });
        info!("X11 hotkey listener started");
        Ok(())
    }

    fn install(&mut self, chord: KeyChord, callback: HotkeyCallback) -> Result<()> {
        if self.table.contains(&chord) {
            bail!("Chord {} is already installed", chord);
        }

        let (keycode, modmask) = chord_to_x11(&chord)
            .with_context(|| format!("Chord {} has no X11 keycode", chord))?;

        if let Err(e) = grab_chord(&self.conn, self.root, keycode, modmask) {
            // Release any permutations that did succeed
            let _ = ungrab_chord(&self.conn, self.root, keycode, modmask);
            return Err(e);
        }
        self.table.insert(chord, callback)?;
        self.conn.flush().context("Failed to flush X11 connection")?;

        info!(
            chord = %chord,
            x11_keycode = keycode,
            modmask = ?modmask,
            "Registered X11 hotkey"
        );
        Ok(())
    }

    fn uninstall(&mut self, chord: &KeyChord) -> Result<()> {
        self.table.remove(chord);
        if let Some((keycode, modmask)) = chord_to_x11(chord) {
            ungrab_chord(&self.conn, self.root, keycode, modmask)?;
            self.conn.flush().context("Failed to flush X11 connection")?;
        }
        debug!(chord = %chord, "Unregistered X11 hotkey");
        Ok(())
    }

    fn deactivate(&mut self) {
        self.stop_listener();

        for chord in self.table.clear() {
            if let Some((keycode, modmask)) = chord_to_x11(&chord)
                && let Err(e) = ungrab_chord(&self.conn, self.root, keycode, modmask)
            {
                warn!(chord = %chord, error = %e, "Failed to ungrab X11 hotkey");
            }
        }
        if let Err(e) = self.conn.flush() {
            warn!(error = %e, "Failed to flush X11 connection");
        }
        info!("X11 hotkey listener stopped");
    }
}

impl Drop for X11Backend {
    fn drop(&mut self) {
        self.stop_listener();
    }
}

/// Main X11 listener loop, runs until `stop` is set
fn run_x11_listener(conn: &RustConnection, table: &DispatchTable, stop: &AtomicBool) -> Result<()> {
    let x11_fd = conn.stream().as_raw_fd();
    let mut repeat_filter = RepeatFilter::default();

    while !stop.load(Ordering::SeqCst) {
        poll_readable(x11_fd, input::LISTENER_POLL_TIMEOUT_MS)?;

        // Drain unconditionally: replies awaited on the installing thread may
        // have pulled events into the connection's queue without waking poll
        while let Some(event) = conn.poll_for_event()? {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            match event {
                Event::KeyPress(key_event) => {
                    if !repeat_filter.press(key_event.detail, key_event.time) {
                        debug!(keycode = key_event.detail, "Ignoring key auto-repeat");
                        continue;
                    }

                    let Some(chord) = x11_to_chord(key_event.detail, key_event.state) else {
                        continue;
                    };
                    if !table.dispatch(&chord) {
                        debug!(
                            keycode = key_event.detail,
                            state = ?key_event.state,
                            "KeyPress event didn't match any registered hotkey"
                        );
                    }
                }
                Event::KeyRelease(key_event) => {
                    repeat_filter.release(key_event.detail, key_event.time);
                }
                Event::MappingNotify(_) => {
                    warn!("Keyboard mapping changed - hotkeys may not work correctly until rebound");
                }
                _ => {}
            }
        }
    }

    Ok(())
}

/// Suppresses auto-repeat so one physical press triggers once.
///
/// Servers without detectable auto-repeat send a synthetic release
/// immediately followed by a press with the same timestamp; servers with it
/// send repeated presses without releases.
#[derive(Debug, Default)]
struct RepeatFilter {
    held: HashSet<Keycode>,
    last_release: Option<(Keycode, Timestamp)>,
}

impl RepeatFilter {
    /// Returns true for a physical press
    fn press(&mut self, keycode: Keycode, time: Timestamp) -> bool {
        let synthetic_release = self.last_release.take() == Some((keycode, time));
        let newly_held = self.held.insert(keycode);
        newly_held && !synthetic_release
    }

    fn release(&mut self, keycode: Keycode, time: Timestamp) {
        self.held.remove(&keycode);
        self.last_release = Some((keycode, time));
    }
}

/// Grab a chord under every lock-key permutation, waiting for the server's
/// verdict so a conflicting grab surfaces as an error
fn grab_chord(conn: &RustConnection, root: Window, keycode: Keycode, modmask: ModMask) -> Result<()> {
    for ignore_mask in ignored_lock_masks() {
        let effective_modmask = modmask | ignore_mask;

        conn.grab_key(
            false, // owner_events: false = Send events to this client only
            root,
            effective_modmask,
            keycode,
            GrabMode::ASYNC,
            GrabMode::ASYNC,
        )
        .context("Failed to send GrabKey request")?
        .check()
        .with_context(|| {
            format!(
                "Failed to grab key: keycode={}, modmask={:?} (already grabbed by another client?)",
                keycode, effective_modmask
            )
        })?;
    }

    Ok(())
}

/// Reverse of [`grab_chord`]
fn ungrab_chord(conn: &RustConnection, root: Window, keycode: Keycode, modmask: ModMask) -> Result<()> {
    for ignore_mask in ignored_lock_masks() {
        let effective_modmask = modmask | ignore_mask;
        conn.ungrab_key(keycode, root, effective_modmask)
            .context("Failed to send UngrabKey request")?;
    }

    Ok(())
}

/// Normalize modifier mask by removing lock keys
fn normalize_modmask(state: KeyButMask) -> ModMask {
    let state_u16: u16 = state.into();

    // Keep only Shift, Control, Mod1 (Alt), Mod4 (Super)
    // Remove Mod2 (NumLock), Lock (CapsLock), Mod5 (ScrollLock)
    let normalized = state_u16
        & (ModMask::SHIFT.bits()
            | ModMask::CONTROL.bits()
            | ModMask::M1.bits()
            | ModMask::M4.bits());

    ModMask::from(normalized)
}

fn modifiers_to_modmask(modifiers: Modifiers) -> ModMask {
    let mut modmask = ModMask::from(0u16);

    if modifiers.ctrl {
        modmask |= ModMask::CONTROL;
    }
    if modifiers.shift {
        modmask |= ModMask::SHIFT;
    }
    if modifiers.alt {
        modmask |= ModMask::M1; // Alt is typically Mod1
    }
    if modifiers.win {
        modmask |= ModMask::M4; // Super is typically Mod4
    }

    modmask
}

fn modmask_to_modifiers(modmask: ModMask) -> Modifiers {
    let bits = modmask.bits();
    Modifiers {
        ctrl: bits & ModMask::CONTROL.bits() != 0,
        alt: bits & ModMask::M1.bits() != 0,
        shift: bits & ModMask::SHIFT.bits() != 0,
        win: bits & ModMask::M4.bits() != 0,
    }
}

/// Convert a chord to X11 keycode and modifier mask
fn chord_to_x11(chord: &KeyChord) -> Option<(Keycode, ModMask)> {
    let keycode = evdev_keycode_to_x11(chord.key_code)?;
    Some((keycode, modifiers_to_modmask(chord.modifiers)))
}

/// Convert an X11 key event back to the chord it represents
fn x11_to_chord(keycode: Keycode, state: KeyButMask) -> Option<KeyChord> {
    let evdev_code = u16::from(keycode).checked_sub(x11::EVDEV_KEYCODE_OFFSET)?;
    Some(KeyChord::new(
        evdev_code,
        modmask_to_modifiers(normalize_modmask(state)),
    ))
}

/// Convert evdev keycode to X11 keycode
///
/// X11 keycodes are typically evdev keycode + 8
/// This is the standard mapping on modern Linux systems
fn evdev_keycode_to_x11(evdev_code: u16) -> Option<Keycode> {
    let x11_code = evdev_code.checked_add(x11::EVDEV_KEYCODE_OFFSET)?;

    if (x11::MIN_KEYCODE..=x11::MAX_KEYCODE).contains(&x11_code) {
        Keycode::try_from(x11_code).ok()
    } else {
        None
    }
}
