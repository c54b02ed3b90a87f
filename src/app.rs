//! Control loop: wires the settings store, overlay compositor and hotkeys together
//!
//! Everything here runs on the single-threaded runtime. Hotkey callbacks fire
//! on backend threads and only forward a [`ControlEvent`] over a channel; the
//! loop applies it.

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use tokio::io::unix::AsyncFd;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{Setting, SettingKey, SettingsStore};
use crate::constants::{app, hotkeys};
use crate::input::{BackendKind, HotkeyCallback, HotkeyManager, create_backend};
use crate::overlay::{Compositor, OverlayParameters, Surface, SurfaceEvents, X11Surface};

type Shared<T> = Rc<RefCell<T>>;

/// Requests forwarded from hotkey threads to the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlEvent {
    Toggle,
    OpenPanel,
}

pub async fn run(settings_path: PathBuf, backend: BackendKind) -> Result<()> {
    let mut store = SettingsStore::open(settings_path);
    let config = store.get_all();

    let surface = X11Surface::connect().context("Failed to initialize overlay window")?;
    let compositor = Rc::new(RefCell::new(Compositor::new(
        surface,
        OverlayParameters::from(&config),
    )));

    // Declared after the compositor so it is dropped (deregistered) before the connection closes
    let x11_fd = AsyncFd::new(compositor.borrow().surface().raw_fd())
        .context("Failed to create AsyncFd for X11 connection")?;

    if config.enabled
        && let Err(e) = compositor.borrow_mut().enable()
    {
        error!(error = ?e, "Failed to restore glow");
    }

    let (event_tx, mut event_rx) = mpsc::channel(32);
    let hotkey_manager = Rc::new(RefCell::new(HotkeyManager::new(create_backend(backend))));
    {
        let mut manager = hotkey_manager.borrow_mut();
        manager.register(
            hotkeys::TOGGLE,
            &config.hotkey_toggle,
            forward(&event_tx, ControlEvent::Toggle),
        );
        manager.register(
            hotkeys::PANEL,
            &config.hotkey_panel,
            forward(&event_tx, ControlEvent::OpenPanel),
        );
        manager.start();
    }

    attach_listeners(&mut store, &compositor, &hotkey_manager);

    let mut sigusr1 = signal(SignalKind::user_defined1()).context("Failed to register SIGUSR1 handler")?;
    let mut sigusr2 = signal(SignalKind::user_defined2()).context("Failed to register SIGUSR2 handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;

    info!(
        backend = hotkey_manager.borrow().backend_name().unwrap_or("none"),
        settings = %store.path().display(),
        "{} running. {}",
        app::NAME,
        hotkey_summary(&store)
    );

    loop {
        if let Err(e) = handle_surface_events(&compositor) {
            error!(error = ?e, "Overlay event handling error");
        }

        tokio::select! {
            Some(event) = event_rx.recv() => match event {
                ControlEvent::Toggle => toggle_glow(&mut store, &compositor),
                ControlEvent::OpenPanel => {
                    info!(
                        settings = %store.path().display(),
                        "Settings panel requested; edit the settings file and send SIGUSR2 to apply"
                    );
                }
            },

            _ = sigusr1.recv() => {
                debug!("SIGUSR1 received");
                toggle_glow(&mut store, &compositor);
            }

            _ = sigusr2.recv() => {
                debug!("SIGUSR2 received");
                store.reload();
            }

            _ = sigint.recv() => {
                info!("SIGINT received, shutting down");
                break;
            }

            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down");
                break;
            }

            ready = x11_fd.readable() => {
                match ready {
                    // Readiness is only cleared here; the events themselves are drained at the top of the loop
                    Ok(mut guard) => guard.clear_ready(),
                    Err(e) => error!(error = ?e, "Failed to poll X11 fd readiness"),
                }
            }
        }
    }

    hotkey_manager.borrow_mut().stop();
    store.save();
    info!("{} stopped", app::NAME);
    Ok(())
}

/// Hotkey callback that forwards `event` to the control loop
fn forward(tx: &mpsc::Sender<ControlEvent>, event: ControlEvent) -> HotkeyCallback {
    let tx = tx.clone();
    Arc::new(move || {
        if let Err(e) = tx.try_send(event) {
            warn!(event = ?event, error = %e, "Dropped hotkey event");
        }
    })
}

/// "Toggle: Alt+Shift+L | Panel: Alt+Shift+P"
fn hotkey_summary(store: &SettingsStore) -> String {
    let config = store.get_all();
    format!(
        "Toggle: {} | Panel: {}",
        HotkeyManager::display_string(&config.hotkey_toggle),
        HotkeyManager::display_string(&config.hotkey_panel)
    )
}

/// Route settings changes to the overlay and the hotkey bindings
fn attach_listeners<S: Surface + 'static>(
    store: &mut SettingsStore,
    compositor: &Shared<Compositor<S>>,
    hotkey_manager: &Shared<HotkeyManager>,
) {
    for key in [
        SettingKey::Enabled,
        SettingKey::Brightness,
        SettingKey::ColorTemperature,
        SettingKey::GlowWidth,
        SettingKey::EdgeSelection,
    ] {
        let compositor = Rc::clone(compositor);
        store.add_key_listener(key, move |setting| {
            apply_to_overlay(&mut compositor.borrow_mut(), setting)
        });
    }

    for key in [SettingKey::HotkeyToggle, SettingKey::HotkeyPanel] {
        let hotkey_manager = Rc::clone(hotkey_manager);
        store.add_key_listener(key, move |setting| {
            let (name, combination) = match setting {
                Setting::HotkeyToggle(combination) => (hotkeys::TOGGLE, combination),
                Setting::HotkeyPanel(combination) => (hotkeys::PANEL, combination),
                _ => return Ok(()),
            };
            hotkey_manager.borrow_mut().rebind(name, combination);
            Ok(())
        });
    }
}

fn apply_to_overlay<S: Surface>(compositor: &mut Compositor<S>, setting: &Setting) -> Result<()> {
    match setting {
        // Toggles already flipped the compositor before persisting
        Setting::Enabled(enabled) if *enabled != compositor.is_enabled() => {
            compositor.set_enabled(*enabled)
        }
        Setting::Brightness(value) => compositor.set_brightness(*value),
        Setting::ColorTemperature(value) => compositor.set_color_temperature(*value),
        Setting::GlowWidth(value) => compositor.set_glow_width(*value),
        Setting::EdgeSelection(value) => compositor.set_edge_selection(*value),
        _ => Ok(()),
    }
}

/// Flip the glow and persist the resulting state
fn toggle_glow<S: Surface>(store: &mut SettingsStore, compositor: &RefCell<Compositor<S>>) {
    let toggled = compositor.borrow_mut().toggle();
    if let Err(e) = toggled {
        error!(error = ?e, "Failed to toggle glow");
    }

    let enabled = compositor.borrow().is_enabled();
    store.set(Setting::Enabled(enabled), true);
}

/// Drain until the queue is empty. Replies awaited while repainting can pull
/// new events into the connection buffer without the fd turning readable again.
fn handle_surface_events(compositor: &RefCell<Compositor<X11Surface>>) -> Result<()> {
    loop {
        let events = compositor.borrow().surface().drain_events()?;
        if events.is_empty() {
            return Ok(());
        }
        apply_surface_events(&mut compositor.borrow_mut(), events)?;
    }
}

fn apply_surface_events<S: Surface>(
    compositor: &mut Compositor<S>,
    events: SurfaceEvents,
) -> Result<()> {
    if events.geometry_changed {
        compositor.refresh_geometry()?;
    }
    if events.exposed {
        compositor.repaint()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{EdgeSelection, Rect};
    use crate::config::Configuration;
    use crate::overlay::compositor::OverlayState;
    use tempfile::TempDir;

    /// Surface double counting paints
    #[derive(Default)]
    struct CountingSurface {
        paints: usize,
        visible: bool,
        display_lost: bool,
    }

    impl Surface for CountingSurface {
        fn primary_bounds(&mut self) -> Result<Rect> {
            if self.display_lost {
                anyhow::bail!("display connection lost");
            }
            Ok(Rect::new(0, 0, 1280, 720))
        }

        fn show(&mut self, _bounds: Rect) -> Result<()> {
            self.visible = true;
            Ok(())
        }

        fn hide(&mut self) -> Result<()> {
            self.visible = false;
            Ok(())
        }

        fn paint(&mut self, _state: &OverlayState) -> Result<()> {
            self.paints += 1;
            Ok(())
        }
    }

    struct Harness {
        _dir: TempDir,
        store: SettingsStore,
        compositor: Shared<Compositor<CountingSurface>>,
        hotkey_manager: Shared<HotkeyManager>,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let mut store = SettingsStore::open(dir.path().join("settings.json"));
        let compositor = Rc::new(RefCell::new(Compositor::new(
            CountingSurface::default(),
            OverlayParameters::default(),
        )));

        let hotkey_manager = Rc::new(RefCell::new(HotkeyManager::new(None)));
        {
            let mut manager = hotkey_manager.borrow_mut();
            manager.register(hotkeys::TOGGLE, "alt+shift+l", Arc::new(|| {}));
            manager.register(hotkeys::PANEL, "alt+shift+p", Arc::new(|| {}));
        }

        attach_listeners(&mut store, &compositor, &hotkey_manager);
        Harness {
            _dir: dir,
            store,
            compositor,
            hotkey_manager,
        }
    }

    #[test]
    fn test_overlay_settings_reach_compositor() {
        let mut h = harness();

        h.store.set(Setting::Brightness(30), false);
        h.store.set(Setting::ColorTemperature(3000), false);
        h.store.set(Setting::GlowWidth(999), false);
        h.store.set(Setting::EdgeSelection(EdgeSelection::TopSides), false);

        assert_eq!(
            h.compositor.borrow().parameters(),
            OverlayParameters {
                brightness: 30,
                color_temperature: 3000,
                glow_width: 400,
                edge_selection: EdgeSelection::TopSides,
            }
        );
    }

    #[test]
    fn test_enabled_setting_shows_overlay() {
        let mut h = harness();

        h.store.set(Setting::Enabled(true), false);
        assert!(h.compositor.borrow().is_enabled());
        assert!(h.compositor.borrow().surface().visible);

        h.store.set(Setting::Enabled(false), false);
        assert!(!h.compositor.borrow().surface().visible);
    }

    #[test]
    fn test_toggle_persists_without_double_flip() {
        let mut h = harness();

        toggle_glow(&mut h.store, &h.compositor);

        assert!(h.compositor.borrow().is_enabled());
        assert_eq!(h.compositor.borrow().surface().paints, 1);
        assert_eq!(h.store.get(SettingKey::Enabled), Setting::Enabled(true));
        assert!(h.store.load().enabled);

        toggle_glow(&mut h.store, &h.compositor);
        assert!(!h.compositor.borrow().is_enabled());
        assert!(!h.store.load().enabled);
    }

    #[test]
    fn test_failed_toggle_persists_hidden_state() {
        let mut h = harness();
        h.compositor.borrow_mut().surface_mut().display_lost = true;

        toggle_glow(&mut h.store, &h.compositor);

        assert!(!h.compositor.borrow().is_enabled());
        assert!(!h.compositor.borrow().surface().visible);
        assert_eq!(h.store.get(SettingKey::Enabled), Setting::Enabled(false));
        assert!(!h.store.load().enabled);

        // Display is back: a single toggle shows the glow
        h.compositor.borrow_mut().surface_mut().display_lost = false;
        toggle_glow(&mut h.store, &h.compositor);
        assert!(h.compositor.borrow().surface().visible);
        assert!(h.store.load().enabled);
    }

    #[test]
    fn test_surface_events_repaint() {
        let mut h = harness();
        h.store.set(Setting::Enabled(true), false);
        let mut compositor = h.compositor.borrow_mut();
        let baseline = compositor.surface().paints;

        apply_surface_events(&mut compositor, SurfaceEvents::default()).unwrap();
        assert_eq!(compositor.surface().paints, baseline);

        let exposed = SurfaceEvents {
            exposed: true,
            ..SurfaceEvents::default()
        };
        assert!(!exposed.is_empty());
        apply_surface_events(&mut compositor, exposed).unwrap();
        assert_eq!(compositor.surface().paints, baseline + 1);

        let resized = SurfaceEvents {
            geometry_changed: true,
            ..SurfaceEvents::default()
        };
        // Bounds are unchanged, so a geometry event alone repaints nothing
        apply_surface_events(&mut compositor, resized).unwrap();
        assert_eq!(compositor.surface().paints, baseline + 1);
        assert!(SurfaceEvents::default().is_empty());
    }

    #[test]
    fn test_hotkey_settings_rebind() {
        let mut h = harness();

        h.store
            .set(Setting::HotkeyToggle("Ctrl + Alt + G".to_string()), false);
        h.store
            .set(Setting::HotkeyPanel("win+f9".to_string()), false);

        let manager = h.hotkey_manager.borrow();
        assert_eq!(manager.get_combination(hotkeys::TOGGLE), Some("ctrl+alt+g"));
        assert_eq!(manager.get_combination(hotkeys::PANEL), Some("win+f9"));
    }

    #[test]
    fn test_reload_applies_file_edits() {
        let mut h = harness();

        let edited = Configuration {
            brightness: 85,
            edge_selection: EdgeSelection::SidesOnly,
            ..Configuration::default()
        };
        std::fs::write(h.store.path(), serde_json::to_string(&edited).unwrap()).unwrap();

        assert_eq!(h.store.reload(), 2);
        let parameters = h.compositor.borrow().parameters();
        assert_eq!(parameters.brightness, 85);
        assert_eq!(parameters.edge_selection, EdgeSelection::SidesOnly);
    }

    #[test]
    fn test_hotkey_summary() {
        let h = harness();
        assert_eq!(
            hotkey_summary(&h.store),
            "Toggle: Alt+Shift+L | Panel: Alt+Shift+P"
        );
    }

    #[tokio::test]
    async fn test_forwarded_callback_reaches_loop() {
        let (tx, mut rx) = mpsc::channel(4);
        let callback = forward(&tx, ControlEvent::OpenPanel);

        std::thread::spawn(move || callback()).join().unwrap();
        assert_eq!(rx.recv().await, Some(ControlEvent::OpenPanel));
    }
}
