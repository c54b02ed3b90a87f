//! Hotkey backend abstraction layer
//!
//! Provides a trait-based interface for different hotkey input backends.
//! Currently supports:
//! - X11 XGrabKey (default, secure, no permissions)
//! - evdev raw input (optional, requires input group)

use anyhow::{Result, bail};
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::input::chord::KeyChord;
use crate::input::evdev_backend::EvdevBackend;
use crate::input::x11_backend::X11Backend;

/// Callback fired on a listener thread when a chord is pressed
pub type HotkeyCallback = Arc<dyn Fn() + Send + Sync>;

/// Which backend to listen with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BackendKind {
    /// X11 XGrabKey backend (default, secure, no permissions required)
    #[default]
    X11,
    /// evdev raw input backend (optional, requires input group membership)
    Evdev,
    /// No backend: hotkeys are accepted but never fire
    #[value(name = "none")]
    Disabled,
}

/// Capabilities and limitations of a hotkey backend
#[derive(Debug, Clone)]
pub struct BackendCapabilities {
    /// Can detect modifiers held on a different physical device
    pub supports_cross_device_modifiers: bool,

    /// Requires special system permissions
    pub requires_permissions: bool,

    /// Human-readable description of permission requirements
    pub permission_description: Option<String>,
}

/// Hotkey backend trait
///
/// Backends own the OS-level listening threads. Chords may be installed and
/// removed while active; `deactivate` must not return while a callback is
/// still able to start.
pub trait HotkeyBackend: Send {
    /// Get human-readable backend name
    fn name(&self) -> &'static str;

    /// Get backend capabilities and limitations
    fn capabilities(&self) -> BackendCapabilities;

    /// Spawn the backend's listening threads
    fn activate(&mut self) -> Result<()>;

    /// Arm one chord. A failure concerns this chord only.
    fn install(&mut self, chord: KeyChord, callback: HotkeyCallback) -> Result<()>;

    /// Disarm one chord
    fn uninstall(&mut self, chord: &KeyChord) -> Result<()>;

    /// Remove every chord and stop listening
    fn deactivate(&mut self);
}

/// Probe and construct the requested backend. Returns `None` (degraded
/// mode) when it is unavailable on this system.
pub fn create_backend(kind: BackendKind) -> Option<Box<dyn HotkeyBackend>> {
    let backend: Result<Box<dyn HotkeyBackend>> = match kind {
        BackendKind::Disabled => {
            info!("Hotkey backend disabled");
            return None;
        }
        BackendKind::X11 => X11Backend::connect().map(|b| Box::new(b) as Box<dyn HotkeyBackend>),
        BackendKind::Evdev => {
            EvdevBackend::probe().map(|b| Box::new(b) as Box<dyn HotkeyBackend>)
        }
    };

    match backend {
        Ok(backend) => {
            let capabilities = backend.capabilities();
            info!(
                backend = backend.name(),
                cross_device_modifiers = capabilities.supports_cross_device_modifiers,
                requires_permissions = capabilities.requires_permissions,
                permissions = ?capabilities.permission_description,
                "Hotkey backend available"
            );
            Some(backend)
        }
        Err(e) => {
            warn!(backend = ?kind, error = ?e, "Hotkey backend unavailable, hotkeys will not fire");
            None
        }
    }
}

/// Chord to callback table shared between a backend and its listener threads
///
/// Callbacks run while the table lock is held, so `clear` (and `remove`)
/// wait for an in-flight callback and no callback starts after they return.
#[derive(Clone, Default)]
pub struct DispatchTable {
    entries: Arc<Mutex<HashMap<KeyChord, HotkeyCallback>>>,
}

impl DispatchTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<KeyChord, HotkeyCallback>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, chord: KeyChord, callback: HotkeyCallback) -> Result<()> {
        let mut entries = self.lock();
        if entries.contains_key(&chord) {
            bail!("Chord {} is already installed", chord);
        }
        entries.insert(chord, callback);
        Ok(())
    }

    pub fn remove(&self, chord: &KeyChord) -> bool {
        self.lock().remove(chord).is_some()
    }

    pub fn contains(&self, chord: &KeyChord) -> bool {
        self.lock().contains_key(chord)
    }

    /// Remove every entry, returning the removed chords
    pub fn clear(&self) -> Vec<KeyChord> {
        self.lock().drain().map(|(chord, _)| chord).collect()
    }

    /// Whether any installed chord uses this key code
    pub fn watches_key(&self, key_code: u16) -> bool {
        self.lock().keys().any(|chord| chord.key_code == key_code)
    }

    /// Invoke the callback bound to `chord`. Returns whether one was found.
    pub fn dispatch(&self, chord: &KeyChord) -> bool {
        let entries = self.lock();
        match entries.get(chord) {
            Some(callback) => {
                debug!(chord = %chord, "Dispatching hotkey");
                callback();
                true
            }
            None => false,
        }
    }
}

/// Block until `fd` is readable or `timeout_ms` expires.
///
/// Listener threads wake at least once per timeout to check their stop flag.
/// Returns `Ok(false)` on timeout or signal interruption.
#[allow(unsafe_code)] // Required for libc::poll() system call
pub fn poll_readable(fd: RawFd, timeout_ms: i32) -> Result<bool> {
    let mut poll_fds = [libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    }];

    // SAFETY: `poll_fds` is a valid pointer to a stack-allocated array of `pollfd`.
    // The array length is 1, which matches the second argument.
    let poll_result = unsafe { libc::poll(poll_fds.as_mut_ptr(), 1, timeout_ms) };

    if poll_result < 0 {
        let error = std::io::Error::last_os_error();
        if error.kind() == std::io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(anyhow::Error::new(error).context("poll() failed"));
    }

    let revents = poll_fds[0].revents;
    if revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0 && revents & libc::POLLIN == 0 {
        bail!("File descriptor {} closed (revents={:#x})", fd, revents);
    }

    Ok(poll_result > 0 && (revents & libc::POLLIN) != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::chord::Modifiers;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn counting_callback() -> (Arc<AtomicUsize>, HotkeyCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        (
            count,
            Arc::new(move || {
                sink.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn test_dispatch_table_fires_matching_chord() {
        let table = DispatchTable::default();
        let chord = KeyChord::parse("alt+shift+l").unwrap();
        let (count, callback) = counting_callback();

        table.insert(chord, callback).unwrap();

        assert!(table.dispatch(&chord));
        assert!(!table.dispatch(&KeyChord::new(chord.key_code, Modifiers::default())));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_table_rejects_duplicates() {
        let table = DispatchTable::default();
        let chord = KeyChord::parse("ctrl+f1").unwrap();
        let (_, first) = counting_callback();
        let (_, second) = counting_callback();

        table.insert(chord, first).unwrap();
        assert!(table.insert(chord, second).is_err());
        assert_eq!(table.clear(), vec![chord]);
    }

    #[test]
    fn test_dispatch_table_clear_stops_dispatch() {
        let table = DispatchTable::default();
        let chord = KeyChord::parse("win+space").unwrap();
        let (count, callback) = counting_callback();

        table.insert(chord, callback).unwrap();
        assert!(table.watches_key(chord.key_code));
        assert_eq!(table.clear(), vec![chord]);

        assert!(!table.dispatch(&chord));
        assert!(!table.contains(&chord));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clear_waits_for_running_callback() {
        let table = DispatchTable::default();
        let chord = KeyChord::parse("alt+shift+l").unwrap();
        let started = Arc::new(Barrier::new(2));
        let finished = Arc::new(AtomicBool::new(false));

        let callback: HotkeyCallback = {
            let started = Arc::clone(&started);
            let finished = Arc::clone(&finished);
            Arc::new(move || {
                started.wait();
                thread::sleep(Duration::from_millis(50));
                finished.store(true, Ordering::SeqCst);
            })
        };
        table.insert(chord, callback).unwrap();

        let listener = {
            let table = table.clone();
            thread::spawn(move || table.dispatch(&chord))
        };

        started.wait();
        assert_eq!(table.clear(), vec![chord]);
        // Once clear returns no callback is mid-flight and none can start
        assert!(finished.load(Ordering::SeqCst));
        assert!(!table.dispatch(&chord));
        assert!(listener.join().unwrap());
    }

    #[test]
    fn test_create_backend_none_is_degraded() {
        assert!(create_backend(BackendKind::Disabled).is_none());
    }
}
