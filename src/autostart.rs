//! Launch-at-login via an XDG autostart desktop entry
//!
//! The entry lives at `$XDG_CONFIG_HOME/autostart/edge-light.desktop` and
//! launches the current executable. Its presence is the enabled state.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::constants::{app, autostart};

/// Location of the desktop entry, if the config directory is known
pub fn desktop_entry_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(autostart::SUBDIR).join(autostart::FILENAME))
}

pub fn is_enabled() -> bool {
    desktop_entry_path().is_some_and(|path| path.exists())
}

/// Write or remove the desktop entry. Returns `false` on failure.
pub fn set_enabled(enabled: bool) -> bool {
    let Some(path) = desktop_entry_path() else {
        error!("Cannot determine config directory for autostart entry");
        return false;
    };

    let result = if enabled {
        std::env::current_exe()
            .context("Failed to determine current executable")
            .and_then(|exe| write_entry(&path, &exe))
    } else {
        remove_entry(&path)
    };

    match result {
        Ok(()) => {
            info!(enabled = enabled, path = %path.display(), "Updated autostart entry");
            true
        }
        Err(e) => {
            error!(enabled = enabled, path = %path.display(), error = ?e, "Failed to update autostart entry");
            false
        }
    }
}

fn desktop_entry(exe: &Path) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name={name}\n\
         Comment=Screen-edge glow for webcam lighting\n\
         Exec=\"{exe}\"\n\
         Terminal=false\n\
         X-GNOME-Autostart-enabled=true\n",
        name = app::NAME,
        exe = exe.display(),
    )
}

fn write_entry(path: &Path, exe: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create autostart directory {:?}", parent))?;
    }
    fs::write(path, desktop_entry(exe))
        .with_context(|| format!("Failed to write autostart entry {:?}", path))
}

/// Removing an entry that does not exist counts as success
fn remove_entry(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove autostart entry {:?}", path)),
    }
}
