//! Configuration management
//!
//! A single flat settings record persisted as JSON, owned by [`SettingsStore`]
//! which fans out change notifications to the overlay and hotkey layers.

pub mod settings;
pub mod store;

pub use settings::{Configuration, Setting, SettingKey};
pub use store::SettingsStore;
