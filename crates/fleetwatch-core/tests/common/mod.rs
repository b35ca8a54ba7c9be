//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use fleetwatch_core::base_layer::BaseLayerRegistry;
use fleetwatch_core::config::MarkerPalette;
use fleetwatch_core::overlay::{OverlayRegistry, OverlaySource};
use fleetwatch_core::session::{MapSessionManager, SessionSettings};
use fleetwatch_core::testing::RecordingBackend;
use fleetwatch_core::toggle::{LayerControlPanel, ViewToggleState};
use fleetwatch_core::{PositionBatch, PositionRecord};
use std::path::PathBuf;
use std::sync::Arc;

/// Get the path to test fixtures
pub fn fixtures_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir).join("tests").join("fixtures")
}

/// The two default overlays, read from the fixture GeoJSON files
pub fn fixture_overlays() -> OverlayRegistry {
    let mut cities = OverlaySource::city_polygons();
    cities.path = fixtures_dir().join("city_polygons.geojson");
    let mut barriers = OverlaySource::barrier_lines();
    barriers.path = fixtures_dir().join("barrier_lines.geojson");

    OverlayRegistry::load(&[cities, barriers]).expect("Failed to load fixture overlays")
}

pub fn record(vehicle: &str, lat: f64, lon: f64, is_alert: bool) -> PositionRecord {
    PositionRecord {
        vehicle_id: vehicle.to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        latitude: lat,
        longitude: lon,
        intersects_barrier: false,
        inside_polygon: false,
        is_alert,
    }
}

/// `count` normal positions spread over a small grid near Bauru
pub fn grid_batch(count: usize) -> PositionBatch {
    (0..count)
        .map(|i| {
            let lat = -22.0 - (i % 10) as f64 * 0.05;
            let lon = -49.0 - (i / 10) as f64 * 0.05;
            record(&format!("GRID{i:03}"), lat, lon, false)
        })
        .collect()
}

pub struct Harness {
    pub manager: MapSessionManager<RecordingBackend>,
    pub panel: LayerControlPanel,
}

impl Harness {
    pub fn new(chunk_size: usize) -> Self {
        Self::with_backend(RecordingBackend::new(), chunk_size)
    }

    pub fn with_backend(backend: RecordingBackend, chunk_size: usize) -> Self {
        let overlays = Arc::new(fixture_overlays());
        let base_layers = Arc::new(BaseLayerRegistry::builtin());
        let panel = LayerControlPanel::new(
            ViewToggleState::new("dark", ["city-polygons", "barrier-lines"]),
            &overlays,
            &base_layers,
        );
        let settings = SessionSettings {
            chunk_size,
            ..SessionSettings::default()
        };
        let manager = MapSessionManager::new(
            backend,
            settings,
            Arc::new(MarkerPalette::default()),
            overlays,
            base_layers,
        );
        Self { manager, panel }
    }

    pub fn mount(&mut self) {
        self.manager
            .mount(self.panel.state())
            .expect("Failed to mount map session");
    }
}
