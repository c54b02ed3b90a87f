//! Keyboard detection for the evdev backend

use anyhow::{Context, Result};
use evdev::{Device, KeyCode};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::constants::{input, paths, permissions};

/// Scans /dev/input for keyboards, returning them with their paths
pub fn find_keyboards() -> Result<Vec<(Device, PathBuf)>> {
    info!(path = %paths::DEV_INPUT, "Scanning for input devices...");

    let mut devices = Vec::new();

    for entry in std::fs::read_dir(paths::DEV_INPUT).with_context(|| {
        format!(
            "Failed to read {} - are you in the '{}' group?",
            paths::DEV_INPUT,
            permissions::INPUT_GROUP
        )
    })? {
        let entry = entry?;
        let path = entry.path();

        if let Ok(device) = Device::open(&path)
            && is_keyboard(&device)
        {
            let key_count = device
                .supported_keys()
                .map(|k| k.iter().count())
                .unwrap_or(0);
            debug!(
                device_path = %path.display(),
                name = ?device.name(),
                key_count = key_count,
                "Found keyboard"
            );
            devices.push((device, path));
        }
    }

    if devices.is_empty() {
        anyhow::bail!(
            "No keyboard found. Ensure you're in '{}' group:\n\
             {}\n\
             Then log out and back in.",
            permissions::INPUT_GROUP,
            permissions::ADD_TO_INPUT_GROUP
        )
    }

    info!(count = devices.len(), "Found keyboard device(s)");

    Ok(devices)
}

/// A device counts as a keyboard when it reports a Tab key
fn is_keyboard(device: &Device) -> bool {
    device
        .supported_keys()
        .is_some_and(|keys| keys.contains(KeyCode(input::KEY_TAB)))
}

/// Check if raw input devices are readable (user has input group permissions)
pub fn check_permissions() -> bool {
    std::fs::read_dir(paths::DEV_INPUT).is_ok()
}
