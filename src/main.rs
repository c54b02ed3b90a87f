#![deny(unsafe_code)]

mod app;
mod autostart;
mod common;
mod config;
mod constants;
mod input;
mod overlay;
mod x11;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::Level as TraceLevel;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::SettingsStore;
use crate::input::BackendKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "edge-light")]
#[command(version)]
#[command(about = "Screen-edge glow for webcam lighting", long_about = None)]
struct Cli {
    /// Settings file (default: beside the executable)
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Global hotkey backend
    #[arg(long, value_enum, default_value_t = BackendKind::default())]
    backend: BackendKind,

    /// Maximum log level (overrides RUST_LOG)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<TraceLevel>,

    /// Enable or disable launching at login, then exit
    #[arg(long, value_enum)]
    autostart: Option<Switch>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    match cli.log_level {
        Some(level) => {
            let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        None => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    }
    .context("Failed to set tracing subscriber")?;

    if let Some(switch) = cli.autostart {
        let enabled = switch == Switch::On;
        if !autostart::set_enabled(enabled) {
            anyhow::bail!("Failed to update autostart entry");
        }
        println!(
            "Autostart {}",
            if autostart::is_enabled() { "enabled" } else { "disabled" }
        );
        return Ok(());
    }

    let settings_path = cli.settings.unwrap_or_else(SettingsStore::default_path);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    rt.block_on(app::run(settings_path, cli.backend))
}
