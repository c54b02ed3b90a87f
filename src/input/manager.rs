//! Named, rebindable hotkey bindings on top of a [`HotkeyBackend`]
//!
//! The manager owns the binding table. Each binding keeps its callback across
//! rebinds; the backend only ever sees parsed chords.

use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use crate::input::backend::{HotkeyBackend, HotkeyCallback};
use crate::input::chord::{KeyChord, display_string, normalize_combination};

struct Binding {
    combination: String,
    callback: HotkeyCallback,
    /// Chord armed in the backend, if installation succeeded
    installed: Option<KeyChord>,
}

pub struct HotkeyManager {
    /// `None` runs the manager in degraded mode: registrations are kept but nothing fires
    backend: Option<Box<dyn HotkeyBackend>>,
    bindings: BTreeMap<String, Binding>,
    running: bool,
}

impl HotkeyManager {
    pub fn new(backend: Option<Box<dyn HotkeyBackend>>) -> Self {
        if backend.is_none() {
            warn!("No hotkey backend available, hotkeys are disabled");
        }
        Self {
            backend,
            bindings: BTreeMap::new(),
            running: false,
        }
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|backend| backend.name())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Store or replace the binding for `name`. While running, the old chord is
    /// disarmed before the new one is armed.
    pub fn register(&mut self, name: &str, combination: &str, callback: HotkeyCallback) {
        let combination = normalize_combination(combination);

        if let Some(previous) = self.bindings.remove(name) {
            self.disarm(name, &previous);
        }

        let mut binding = Binding {
            combination,
            callback,
            installed: None,
        };
        if self.running {
            self.arm(name, &mut binding);
        }

        debug!(binding = %name, combination = %binding.combination, "Registered hotkey");
        self.bindings.insert(name.to_string(), binding);
    }

    /// Move an existing binding to a new combination, keeping its callback.
    /// Returns the display form of the new combination, or `None` when `name`
    /// is not registered.
    pub fn rebind(&mut self, name: &str, combination: &str) -> Option<String> {
        let Some(callback) = self.bindings.get(name).map(|b| b.callback.clone()) else {
            warn!(binding = %name, "Cannot rebind unknown hotkey");
            return None;
        };

        self.register(name, combination, callback);
        let display_form = display_string(combination);
        info!(binding = %name, combination = %display_form, "Rebound hotkey");
        Some(display_form)
    }

    /// Arm every registered binding. No-op while already running.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;

        let activated = match self.backend.as_mut() {
            Some(backend) => backend.activate(),
            None => {
                debug!("Hotkey manager started without a backend");
                return;
            }
        };

        if let Err(e) = activated {
            error!(error = ?e, "Failed to start hotkey backend, hotkeys are disabled");
            self.backend = None;
            return;
        }

        // Arm one at a time so each sees the chords already armed before it
        let names: Vec<String> = self.bindings.keys().cloned().collect();
        for name in names {
            if let Some(mut binding) = self.bindings.remove(&name) {
                self.arm(&name, &mut binding);
                self.bindings.insert(name, binding);
            }
        }

        let armed = self.bindings.values().filter(|b| b.installed.is_some()).count();
        info!(
            armed = armed,
            registered = self.bindings.len(),
            "Hotkey manager started"
        );
    }

    /// Disarm everything; bindings are kept for a later `start`
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        if let Some(backend) = self.backend.as_mut() {
            backend.deactivate();
        }
        for binding in self.bindings.values_mut() {
            binding.installed = None;
        }
        info!("Hotkey manager stopped");
    }

    /// Normalized combination bound to `name`
    pub fn get_combination(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(|b| b.combination.as_str())
    }

    /// Human-readable form of a combination
    pub fn display_string(combination: &str) -> String {
        display_string(combination)
    }

    /// Install one binding; failures are logged and leave it unarmed
    fn arm(&mut self, name: &str, binding: &mut Binding) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };

        let chord = match KeyChord::parse(&binding.combination) {
            Ok(chord) => chord,
            Err(e) => {
                error!(binding = %name, error = %e, "Cannot install hotkey");
                return;
            }
        };

        if let Some((other, _)) = self
            .bindings
            .iter()
            .find(|(other, b)| other.as_str() != name && b.installed == Some(chord))
        {
            error!(
                binding = %name,
                conflicts_with = %other,
                combination = %binding.combination,
                "Hotkey already bound to another action"
            );
            return;
        }

        match backend.install(chord, binding.callback.clone()) {
            Ok(()) => binding.installed = Some(chord),
            Err(e) => {
                error!(
                    binding = %name,
                    combination = %binding.combination,
                    error = ?e,
                    "Failed to install hotkey"
                );
            }
        }
    }

    fn disarm(&mut self, name: &str, binding: &Binding) {
        if let (Some(backend), Some(chord)) = (self.backend.as_mut(), binding.installed.as_ref())
            && let Err(e) = backend.uninstall(chord)
        {
            warn!(binding = %name, error = ?e, "Failed to uninstall hotkey");
        }
    }
}

impl Drop for HotkeyManager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::backend::{BackendCapabilities, DispatchTable};
    use anyhow::{Result, bail};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Backend double: arms chords in a dispatch table and lets tests press keys
    #[derive(Clone, Default)]
    struct ScriptedBackend {
        table: DispatchTable,
        log: Arc<Mutex<Vec<String>>>,
        activations: Arc<AtomicUsize>,
        rejected: Arc<Mutex<Vec<KeyChord>>>,
    }

    impl ScriptedBackend {
        fn press(&self, combination: &str) -> bool {
            self.table.dispatch(&KeyChord::parse(combination).unwrap())
        }

        fn reject(&self, combination: &str) {
            self.rejected
                .lock()
                .unwrap()
                .push(KeyChord::parse(combination).unwrap());
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl HotkeyBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn capabilities(&self) -> BackendCapabilities {
            BackendCapabilities {
                supports_cross_device_modifiers: false,
                requires_permissions: false,
                permission_description: None,
            }
        }

        fn activate(&mut self) -> Result<()> {
            self.activations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn install(&mut self, chord: KeyChord, callback: HotkeyCallback) -> Result<()> {
            if self.rejected.lock().unwrap().contains(&chord) {
                bail!("rejected by the OS");
            }
            self.table.insert(chord, callback)?;
            self.log.lock().unwrap().push(format!("install {}", chord));
            Ok(())
        }

        fn uninstall(&mut self, chord: &KeyChord) -> Result<()> {
            self.table.remove(chord);
            self.log.lock().unwrap().push(format!("uninstall {}", chord));
            Ok(())
        }

        fn deactivate(&mut self) {
            self.table.clear();
            self.log.lock().unwrap().push("deactivate".to_string());
        }
    }

    fn counter() -> (Arc<AtomicUsize>, HotkeyCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        (
            count,
            Arc::new(move || {
                sink.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    fn manager() -> (ScriptedBackend, HotkeyManager) {
        let backend = ScriptedBackend::default();
        let manager = HotkeyManager::new(Some(Box::new(backend.clone())));
        (backend, manager)
    }

    #[test]
    fn test_registered_binding_fires_after_start() {
        let (backend, mut manager) = manager();
        let (count, callback) = counter();

        manager.register("toggle", "Shift + ALT + l", callback);
        assert!(!backend.press("alt+shift+l"));

        manager.start();
        assert!(backend.press("alt+shift+l"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(manager.get_combination("toggle"), Some("alt+shift+l"));
    }

    #[test]
    fn test_rebind_moves_trigger() {
        let (backend, mut manager) = manager();
        let (count, callback) = counter();

        manager.register("toggle", "alt+shift+l", callback);
        manager.start();

        let display = manager.rebind("toggle", "ctrl+alt+t");
        assert_eq!(display.as_deref(), Some("Ctrl+Alt+T"));

        assert!(!backend.press("alt+shift+l"));
        assert!(backend.press("ctrl+alt+t"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(manager.get_combination("toggle"), Some("ctrl+alt+t"));
    }

    #[test]
    fn test_rebind_uninstalls_before_installing() {
        let (backend, mut manager) = manager();
        let (_, callback) = counter();

        manager.register("toggle", "alt+shift+l", callback);
        manager.start();
        manager.rebind("toggle", "ctrl+alt+t");

        assert_eq!(
            backend.log(),
            vec![
                "install Alt+Shift+KEY_L",
                "uninstall Alt+Shift+KEY_L",
                "install Ctrl+Alt+KEY_T",
            ]
        );
    }

    #[test]
    fn test_rebind_unknown_name_is_noop() {
        let (backend, mut manager) = manager();
        manager.start();

        assert_eq!(manager.rebind("missing", "ctrl+alt+t"), None);
        assert_eq!(manager.get_combination("missing"), None);
        assert!(backend.log().is_empty());
    }

    #[test]
    fn test_rebind_while_stopped_applies_on_start() {
        let (backend, mut manager) = manager();
        let (count, callback) = counter();

        manager.register("panel", "alt+shift+p", callback);
        manager.rebind("panel", "ctrl+shift+p");
        assert!(backend.log().is_empty());

        manager.start();
        assert!(backend.press("ctrl+shift+p"));
        assert!(!backend.press("alt+shift+p"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_is_idempotent() {
        let (backend, mut manager) = manager();
        let (_, callback) = counter();

        manager.register("toggle", "alt+shift+l", callback);
        manager.start();
        manager.start();

        assert_eq!(backend.activations.load(Ordering::SeqCst), 1);
        assert_eq!(backend.log(), vec!["install Alt+Shift+KEY_L"]);
    }

    #[test]
    fn test_stop_is_safe_and_restartable() {
        let (backend, mut manager) = manager();
        let (count, callback) = counter();

        manager.stop();
        manager.register("toggle", "alt+shift+l", callback);
        manager.start();
        manager.stop();
        manager.stop();

        assert!(!manager.is_running());
        assert!(!backend.press("alt+shift+l"));

        manager.start();
        assert!(backend.press("alt+shift+l"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_binding_does_not_block_others() {
        let (backend, mut manager) = manager();
        let (toggle_count, toggle) = counter();
        let (panel_count, panel) = counter();

        backend.reject("alt+shift+p");
        manager.register("panel", "alt+shift+p", panel);
        manager.register("broken", "ctrl+alt", counter().1);
        manager.register("toggle", "alt+shift+l", toggle);
        manager.start();

        assert!(backend.press("alt+shift+l"));
        assert!(!backend.press("alt+shift+p"));
        assert_eq!(toggle_count.load(Ordering::SeqCst), 1);
        assert_eq!(panel_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duplicate_chord_fires_once() {
        let (backend, mut manager) = manager();
        let (first_count, first) = counter();
        let (second_count, second) = counter();

        manager.register("a", "ctrl+alt+t", first);
        manager.register("b", "alt+ctrl+T", second);
        manager.start();

        assert!(backend.press("ctrl+alt+t"));
        assert_eq!(
            first_count.load(Ordering::SeqCst) + second_count.load(Ordering::SeqCst),
            1
        );
    }

    #[test]
    fn test_degraded_manager_accepts_registrations() {
        let mut manager = HotkeyManager::new(None);
        let (count, callback) = counter();

        manager.register("toggle", "alt+shift+l", callback);
        manager.start();
        assert!(manager.is_running());
        assert_eq!(
            manager.rebind("toggle", "ctrl+t").as_deref(),
            Some("Ctrl+T")
        );
        manager.stop();

        assert_eq!(manager.backend_name(), None);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_display_string() {
        assert_eq!(HotkeyManager::display_string("alt+shift+l"), "Alt+Shift+L");
        assert_eq!(HotkeyManager::display_string("win+ctrl+home"), "Ctrl+Win+Home");
    }
}
