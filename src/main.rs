//! Fleetwatch desktop map
//!
//! Loads configuration, geofence overlays and the position batch, then opens
//! the map window.

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;
use fleetwatch_core::commands::SessionSender;
use fleetwatch_core::config::{AppConfig, LogFormat};
use fleetwatch_core::overlay::{GeofenceOverlay, OverlayRegistry};
use fleetwatch_core::types::load_batch;
use fleetwatch_core::PositionBatch;
use fleetwatch_gui::FleetwatchApp;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Fleetwatch - vehicle positions and geofence alerts on a live map
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/fleetwatch.yaml", env = "FLEETWATCH_CONFIG")]
    config: PathBuf,

    /// Position batch JSON file, overrides data.positions
    #[arg(short, long)]
    positions: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    /// Seconds between position reloads, overrides data.reload_interval_secs
    #[arg(long)]
    reload_interval: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(positions) = args.positions {
        config.data.positions = Some(positions);
    }
    if let Some(interval) = args.reload_interval {
        config.data.reload_interval_secs = interval;
    }
    config.validate().context("Invalid configuration")?;

    init_logging(&config)?;
    info!("Configuration loaded from {:?}", args.config);

    let overlays = load_overlays(&config)?;
    let batch = match &config.data.positions {
        Some(path) => load_batch(path).unwrap_or_else(|e| {
            warn!("Failed to load positions from {:?}: {}", path, e);
            PositionBatch::default()
        }),
        None => {
            warn!("No position file configured, starting with an empty map");
            PositionBatch::default()
        }
    };
    info!(
        positions = batch.len(),
        overlays = overlays.len(),
        "Starting fleetwatch"
    );

    let app = FleetwatchApp::new(&config, overlays, batch)?;
    let reload = config
        .data
        .positions
        .clone()
        .filter(|_| config.data.reload_interval_secs > 0)
        .map(|path| (path, Duration::from_secs(config.data.reload_interval_secs)));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Fleetwatch",
        options,
        Box::new(move |cc| {
            if let Some((path, interval)) = reload {
                spawn_reload(path, interval, app.command_sender(), cc.egui_ctx.clone());
            }
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Window error: {}", e))
}

/// Reads the config file with `FLEETWATCH__` overrides, or defaults if absent.
fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::from_config_builder(path)
            .with_context(|| format!("Failed to load config file: {:?}", path))
    } else {
        eprintln!("Config file {:?} not found, using defaults", path);
        Ok(AppConfig::default())
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let level = config.logging.parse_level()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

/// Loads every configured overlay. A missing or broken file only drops
/// that overlay from the map.
fn load_overlays(config: &AppConfig) -> Result<OverlayRegistry> {
    let mut loaded = Vec::with_capacity(config.overlays.len());
    for source in &config.overlays {
        match GeofenceOverlay::load(source) {
            Ok(overlay) => loaded.push(overlay),
            Err(e) => warn!(overlay = %source.id, "Skipping overlay: {}", e),
        }
    }
    OverlayRegistry::new(loaded).context("Invalid overlay set")
}

/// Periodically re-reads the position file and queues it for the map.
fn spawn_reload(path: PathBuf, interval: Duration, sender: SessionSender, ctx: egui::Context) {
    info!("Reloading positions from {:?} every {:?}", path, interval);
    std::thread::spawn(move || loop {
        std::thread::sleep(interval);
        if sender.is_closed() {
            break;
        }
        match load_batch(&path) {
            Ok(batch) => {
                let count = batch.len();
                if let Err(e) = sender.replace_batch(batch) {
                    error!("Stopping position reload: {}", e);
                    break;
                }
                info!(positions = count, "Position batch reloaded");
                ctx.request_repaint();
            }
            Err(e) => warn!("Failed to reload positions from {:?}: {}", path, e),
        }
    });
}
