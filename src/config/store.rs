//! Settings store: owns the live configuration, persists it and notifies listeners
//!
//! The store is single-threaded by construction (listeners are not `Send`);
//! callers on other threads marshal through the control loop first.

use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::settings::{Configuration, Setting, SettingKey};
use crate::constants;

/// Change listener. An `Err` is logged and does not stop dispatch.
pub type Listener = Box<dyn FnMut(&Setting) -> Result<()>>;

/// Handle returned by listener registration, used for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct SettingsStore {
    path: PathBuf,
    config: Configuration,
    key_listeners: HashMap<SettingKey, Vec<(ListenerId, Listener)>>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: u64,
}

impl SettingsStore {
    /// Settings file beside the executable, or under the XDG config dir when
    /// the executable location is unknown
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(constants::app::ID)
            })
            .join(constants::settings::FILENAME)
    }

    /// Create a store backed by `path` and load it immediately
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = load_from(&path);
        Self {
            path,
            config,
            key_listeners: HashMap::new(),
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted record. Never fails: problems are logged and the
    /// defaults are returned instead.
    pub fn load(&self) -> Configuration {
        load_from(&self.path)
    }

    pub fn get(&self, key: SettingKey) -> Setting {
        self.config.get(key)
    }

    /// Copy of the whole configuration
    pub fn get_all(&self) -> Configuration {
        self.config.clone()
    }

    /// Store a value (clamped), optionally persist, then notify listeners
    pub fn set(&mut self, setting: Setting, auto_save: bool) {
        let stored = self.config.apply(setting);
        debug!(key = %stored.key(), value = ?stored, "Setting updated");

        if auto_save {
            self.save();
        }

        self.notify(&stored);
    }

    /// Persist the full record. Returns `false` on failure; the in-memory
    /// configuration stays valid either way.
    pub fn save(&self) -> bool {
        match self.write_file() {
            Ok(()) => {
                debug!(path = %self.path.display(), "Saved settings");
                true
            }
            Err(e) => {
                error!(path = %self.path.display(), error = ?e, "Failed to save settings");
                false
            }
        }
    }

    fn write_file(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(&self.config)
            .context("Failed to serialize settings to JSON")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write settings to {:?}", self.path))?;
        Ok(())
    }

    /// Re-read the file and apply every value that changed on disk.
    /// Returns the number of settings that changed.
    pub fn reload(&mut self) -> usize {
        let loaded = self.load();
        let changes = self.config.changes_to(&loaded);
        let count = changes.len();

        for setting in changes {
            self.set(setting, false);
        }

        info!(changed = count, "Reloaded settings");
        count
    }

    /// Register a listener for every key
    pub fn add_listener(&mut self, listener: impl FnMut(&Setting) -> Result<()> + 'static) -> ListenerId {
        let id = self.allocate_id();
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Register a listener for one key
    pub fn add_key_listener(
        &mut self,
        key: SettingKey,
        listener: impl FnMut(&Setting) -> Result<()> + 'static,
    ) -> ListenerId {
        let id = self.allocate_id();
        self.key_listeners
            .entry(key)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Returns whether a listener with this id was registered
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listener_count();
        self.listeners.retain(|(entry, _)| *entry != id);
        for entries in self.key_listeners.values_mut() {
            entries.retain(|(entry, _)| *entry != id);
        }
        self.listener_count() != before
    }

    fn listener_count(&self) -> usize {
        self.listeners.len() + self.key_listeners.values().map(Vec::len).sum::<usize>()
    }

    fn allocate_id(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        id
    }

    fn notify(&mut self, setting: &Setting) {
        let key = setting.key();
        let keyed = self.key_listeners.get_mut(&key).into_iter().flatten();

        for (id, listener) in keyed.chain(self.listeners.iter_mut()) {
            if let Err(e) = listener(setting) {
                error!(key = %key, listener = id.0, error = ?e, "Settings listener failed");
            }
        }
    }
}

/// Load a configuration file, absorbing every failure into defaults
fn load_from(path: &Path) -> Configuration {
    if !path.exists() {
        info!(path = %path.display(), "Settings file not found, using defaults");
        return Configuration::default();
    }

    match read_file(path) {
        Ok(config) => {
            info!(path = %path.display(), "Loaded settings");
            config
        }
        Err(e) => {
            warn!(path = %path.display(), error = ?e, "Failed to load settings, using defaults");
            Configuration::default()
        }
    }
}

fn read_file(path: &Path) -> Result<Configuration> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {:?}", path))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse JSON from {:?}", path))?;

    // The record is a keyed object; arrays would otherwise map onto fields by position
    if !value.is_object() {
        bail!("Settings root in {:?} is not a JSON object", path);
    }

    let config = serde_json::from_value(value)
        .with_context(|| format!("Failed to decode settings from {:?}", path))?;
    Ok(config)
}
