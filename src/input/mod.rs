//! Global hotkeys: combination parsing, backends and the binding manager

pub mod backend;
pub mod chord;
pub mod device_detection;
pub mod evdev_backend;
pub mod manager;
pub mod x11_backend;

pub use backend::{BackendKind, HotkeyCallback, create_backend};
pub use chord::normalize_combination;
pub use manager::HotkeyManager;
