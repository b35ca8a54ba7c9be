//! Configuration management for the fleetwatch dashboard map.
//!
//! All options are load-time constants. Once the map session is built, the
//! only runtime-mutable state is the layer control panel's toggles.

use crate::base_layer::{builtin_catalog, BaseLayerDescriptor, BaseLayerRegistry};
use crate::error::{ConfigError, Result};
use crate::overlay::OverlaySource;
use crate::types::{Color, GeoPoint};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Root configuration.
///
/// # Examples
///
/// ```no_run
/// use fleetwatch_core::config::AppConfig;
///
/// let config = AppConfig::from_file("config/fleetwatch.yaml").unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Initial viewport and default layer selection
    #[serde(default)]
    pub map: MapConfig,

    /// Marker styling constants
    #[serde(default)]
    pub markers: MarkerPalette,

    /// Incremental marker placement
    #[serde(default)]
    pub placement: PlacementConfig,

    /// Base layer catalog; empty means the built-in catalog
    #[serde(default)]
    pub base_layers: Vec<BaseLayerDescriptor>,

    /// Geofence overlay sources
    #[serde(default = "default_overlays")]
    pub overlays: Vec<OverlaySource>,

    /// Position data source
    #[serde(default)]
    pub data: DataConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_overlays() -> Vec<OverlaySource> {
    vec![OverlaySource::city_polygons(), OverlaySource::barrier_lines()]
}

impl AppConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// Relative data paths are resolved against the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::load_failed(path.display().to_string(), e.to_string()))?;

        let mut config = Self::from_yaml(&contents)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration through the `config` crate, layering
    /// `FLEETWATCH__*` environment variables over the file.
    pub fn from_config_builder<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(
                config::Environment::with_prefix("FLEETWATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::load_failed(path.display().to_string(), e.to_string()))?;

        let mut config: AppConfig = settings.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
        })?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for overlay in &mut self.overlays {
            overlay.resolve_path(base);
        }
        if let Some(positions) = self.data.positions.as_mut() {
            if positions.is_relative() {
                *positions = base.join(&*positions);
            }
        }
    }

    /// Base layer registry for this configuration.
    pub fn base_layer_registry(&self) -> Result<BaseLayerRegistry> {
        if self.base_layers.is_empty() {
            BaseLayerRegistry::new(builtin_catalog())
        } else {
            BaseLayerRegistry::new(self.base_layers.clone())
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        self.map.validate()?;
        self.markers.validate()?;

        if self.placement.chunk_size == 0 {
            return Err(
                ConfigError::invalid_value("placement.chunk_size", "must be greater than 0")
                    .into(),
            );
        }

        let base_layers = self.base_layer_registry()?;
        if !base_layers.contains(&self.map.default_base_layer) {
            return Err(ConfigError::invalid_value(
                "map.default_base_layer",
                format!("'{}' is not in the base layer catalog", self.map.default_base_layer),
            )
            .into());
        }

        let mut overlay_ids = HashSet::new();
        for overlay in &self.overlays {
            if overlay.id.trim().is_empty() {
                return Err(ConfigError::invalid_value("overlays.id", "must not be empty").into());
            }
            if !overlay_ids.insert(overlay.id.as_str()) {
                return Err(ConfigError::DuplicateOverlayId {
                    id: overlay.id.clone(),
                }
                .into());
            }
        }

        for id in &self.map.default_overlays {
            if !overlay_ids.contains(id.as_str()) {
                return Err(ConfigError::invalid_value(
                    "map.default_overlays",
                    format!("'{}' is not a configured overlay", id),
                )
                .into());
            }
        }

        self.logging.parse_level()?;

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            map: MapConfig::default(),
            markers: MarkerPalette::default(),
            placement: PlacementConfig::default(),
            base_layers: Vec::new(),
            overlays: default_overlays(),
            data: DataConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Initial viewport and default layer selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Initial map center
    #[serde(default = "default_center")]
    pub center: GeoPoint,

    /// Initial zoom level
    #[serde(default = "default_zoom")]
    pub zoom: f64,

    /// Base layer active at startup
    #[serde(default = "default_base_layer")]
    pub default_base_layer: String,

    /// Overlays visible at startup
    #[serde(default = "default_visible_overlays")]
    pub default_overlays: Vec<String>,

    /// Padding around fitted bounds, in pixels
    #[serde(default = "default_fit_padding")]
    pub fit_padding: f32,

    /// Upper zoom limit when fitting bounds
    #[serde(default = "default_max_fit_zoom")]
    pub max_fit_zoom: f64,
}

fn default_center() -> GeoPoint {
    GeoPoint::new(-22.3, -49.5)
}

fn default_zoom() -> f64 {
    8.0
}

fn default_base_layer() -> String {
    "dark".to_string()
}

fn default_visible_overlays() -> Vec<String> {
    vec!["city-polygons".to_string(), "barrier-lines".to_string()]
}

fn default_fit_padding() -> f32 {
    40.0
}

fn default_max_fit_zoom() -> f64 {
    16.0
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: default_center(),
            zoom: default_zoom(),
            default_base_layer: default_base_layer(),
            default_overlays: default_visible_overlays(),
            fit_padding: default_fit_padding(),
            max_fit_zoom: default_max_fit_zoom(),
        }
    }
}

impl MapConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.center.is_valid() {
            return Err(ConfigError::invalid_value(
                "map.center",
                format!("{} is out of range", self.center),
            )
            .into());
        }
        if !(0.0..=19.0).contains(&self.zoom) {
            return Err(ConfigError::invalid_value("map.zoom", "must be within 0..=19").into());
        }
        if !(0.0..=19.0).contains(&self.max_fit_zoom) {
            return Err(
                ConfigError::invalid_value("map.max_fit_zoom", "must be within 0..=19").into(),
            );
        }
        if self.fit_padding < 0.0 {
            return Err(
                ConfigError::invalid_value("map.fit_padding", "must not be negative").into(),
            );
        }
        Ok(())
    }
}

/// Size and opacity of one marker category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerAppearance {
    /// Radius in pixels
    pub radius: f32,

    /// Overall opacity
    pub opacity: f32,

    /// Fill color
    pub fill: Color,

    /// Border width in pixels
    #[serde(default = "default_border_width")]
    pub border_width: f32,
}

fn default_border_width() -> f32 {
    1.0
}

/// Immutable marker styling constants handed to the map session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerPalette {
    /// Normal positions: small, low-opacity dot
    #[serde(default = "default_normal_appearance")]
    pub normal: MarkerAppearance,

    /// Alert positions
    #[serde(default = "default_alert_appearance")]
    pub alert: MarkerAppearance,

    /// Border of normal markers
    #[serde(default = "default_normal_border")]
    pub normal_border: Color,

    /// Halo drawn behind alert markers
    #[serde(default = "default_alert_halo")]
    pub alert_halo: Color,

    /// Alert border when the barrier flag is set
    #[serde(default = "default_barrier_color")]
    pub barrier_color: Color,

    /// Alert border when only the polygon flag is set
    #[serde(default = "default_polygon_color")]
    pub polygon_color: Color,

    /// Alert border when neither geofence flag is set
    #[serde(default = "default_alert_color")]
    pub default_alert_color: Color,
}

fn default_normal_appearance() -> MarkerAppearance {
    MarkerAppearance {
        radius: 5.0,
        opacity: 0.7,
        fill: Color::rgb(0x00, 0xff, 0xb3),
        border_width: 1.0,
    }
}

fn default_alert_appearance() -> MarkerAppearance {
    MarkerAppearance {
        radius: 9.0,
        opacity: 1.0,
        fill: Color::rgb(0xff, 0x55, 0x77),
        border_width: 2.0,
    }
}

fn default_normal_border() -> Color {
    Color::rgba(0x00, 0xff, 0xb3, 0x66)
}

fn default_alert_halo() -> Color {
    Color::rgba(0xff, 0x33, 0x55, 0x4d)
}

fn default_barrier_color() -> Color {
    Color::rgb(0xff, 0x88, 0x00)
}

fn default_polygon_color() -> Color {
    Color::rgb(0x00, 0xc2, 0xff)
}

fn default_alert_color() -> Color {
    Color::rgb(0xff, 0x33, 0x55)
}

impl Default for MarkerPalette {
    fn default() -> Self {
        Self {
            normal: default_normal_appearance(),
            alert: default_alert_appearance(),
            normal_border: default_normal_border(),
            alert_halo: default_alert_halo(),
            barrier_color: default_barrier_color(),
            polygon_color: default_polygon_color(),
            default_alert_color: default_alert_color(),
        }
    }
}

impl MarkerPalette {
    pub fn validate(&self) -> Result<()> {
        for (field, appearance) in [("markers.normal", &self.normal), ("markers.alert", &self.alert)]
        {
            if appearance.radius <= 0.0 {
                return Err(ConfigError::invalid_value(field, "radius must be positive").into());
            }
            if !(0.0..=1.0).contains(&appearance.opacity) {
                return Err(
                    ConfigError::invalid_value(field, "opacity must be within 0..=1").into(),
                );
            }
        }
        Ok(())
    }
}

/// Incremental marker placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Markers inserted per frame
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    500
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// Position data source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// JSON file holding the position batch
    #[serde(default)]
    pub positions: Option<PathBuf>,

    /// Re-read the file every N seconds; 0 disables reloading
    #[serde(default)]
    pub reload_interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "text" or "json"
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| {
            ConfigError::invalid_value("logging.level", format!("Invalid log level: {}", self.level))
                .into()
        })
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Structured JSON
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FleetwatchError;
    use crate::overlay::OverlayKind;

    #[test]
    fn test_default_config() {
        let config = AppConfig::new();
        assert_eq!(config.map.default_base_layer, "dark");
        assert_eq!(config.map.zoom, 8.0);
        assert_eq!(config.overlays.len(), 2);
        assert_eq!(config.placement.chunk_size, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r##"
map:
  center: { latitude: -21.0, longitude: -48.0 }
  zoom: 9
  default_base_layer: satellite
  default_overlays: [barrier-lines]
markers:
  barrier_color: "#ffaa00"
placement:
  chunk_size: 100
overlays:
  - id: barrier-lines
    kind: line
    path: data/barriers.geojson
    label_field: name
    style: { color: "#ff8800", weight: 3.0, dash: [6.0, 4.0] }
logging:
  level: debug
  format: json
"##;

        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.map.default_base_layer, "satellite");
        assert_eq!(config.map.center, GeoPoint::new(-21.0, -48.0));
        assert_eq!(config.markers.barrier_color, Color::rgb(0xff, 0xaa, 0x00));
        // Untouched palette entries keep their defaults
        assert_eq!(config.markers.polygon_color, Color::rgb(0x00, 0xc2, 0xff));
        assert_eq!(config.overlays.len(), 1);
        assert_eq!(config.overlays[0].kind, OverlayKind::Line);
        assert_eq!(config.overlays[0].style.opacity, 0.8);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.parse_level().unwrap(), Level::DEBUG);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_unknown_default_overlay() {
        let mut config = AppConfig::new();
        config.map.default_overlays.push("rivers".to_string());
        assert!(matches!(
            config.validate(),
            Err(FleetwatchError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_validation_unknown_base_layer() {
        let mut config = AppConfig::new();
        config.map.default_base_layer = "watercolor".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_duplicate_overlay() {
        let mut config = AppConfig::new();
        config.overlays.push(OverlaySource::city_polygons());
        assert!(matches!(
            config.validate(),
            Err(FleetwatchError::Config(ConfigError::DuplicateOverlayId { .. }))
        ));
    }

    #[test]
    fn test_validation_ranges() {
        let mut config = AppConfig::new();
        config.map.zoom = 25.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::new();
        config.placement.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::new();
        config.markers.normal.opacity = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::new();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_color_rejected() {
        let yaml = r#"
markers:
  barrier_color: "orange"
"#;
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleetwatch.yaml");
        std::fs::write(
            &path,
            "data:\n  positions: positions.json\n",
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(
            config.data.positions.as_deref(),
            Some(dir.path().join("positions.json").as_path())
        );
        assert_eq!(
            config.overlays[0].path,
            dir.path().join("data/city_polygons.geojson")
        );
    }

    #[test]
    fn test_custom_base_layers() {
        let mut config = AppConfig::new();
        config.base_layers = vec![BaseLayerDescriptor::new(
            "local",
            "Local",
            "http://localhost/{z}/{x}/{y}.png",
        )];
        assert!(config.validate().is_err());

        config.map.default_base_layer = "local".to_string();
        assert!(config.validate().is_ok());
    }
}
