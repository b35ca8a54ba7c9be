//! # Fleetwatch Core
//!
//! Renderer-agnostic map engine for the fleet monitoring dashboard.
//!
//! This crate holds everything that decides *what* the map shows; drawing is
//! left to a [`session::MapBackend`] implementation:
//!
//! - **Types**: position records and batches, coordinates, bounds and colors.
//! - **Classifier**: maps every position record to a marker style.
//! - **Registries**: GeoJSON geofence overlays and the base tile layer catalog.
//! - **Session**: the [`MapSessionManager`] state machine that keeps one
//!   persistent map instance in sync with the current batch and toggles.
//! - **Configuration**: YAML files with environment variable overrides.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use fleetwatch_core::config::AppConfig;
//! use fleetwatch_core::overlay::OverlayRegistry;
//! use fleetwatch_core::session::{MapSessionManager, SessionSettings, SessionState};
//! use fleetwatch_core::testing::RecordingBackend;
//! use fleetwatch_core::toggle::ViewToggleState;
//!
//! let config = AppConfig::default();
//! let mut manager = MapSessionManager::new(
//!     RecordingBackend::new(),
//!     SessionSettings::from_config(&config),
//!     Arc::new(config.markers.clone()),
//!     Arc::new(OverlayRegistry::default()),
//!     Arc::new(config.base_layer_registry().unwrap()),
//! );
//!
//! let toggles = ViewToggleState::from_config(&config.map);
//! assert_eq!(manager.mount(&toggles).unwrap(), SessionState::Ready);
//! ```

pub mod base_layer;
pub mod classifier;
pub mod commands;
pub mod config;
pub mod error;
pub mod legend;
pub mod overlay;
pub mod session;
pub mod testing;
pub mod toggle;
pub mod types;

// Re-export commonly used types for convenience
pub use config::AppConfig;
pub use error::{FleetwatchError, Result};
pub use session::{MapBackend, MapSessionManager, SessionState};
pub use types::{GeoBounds, GeoPoint, PositionBatch, PositionRecord};
