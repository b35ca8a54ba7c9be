//! Static geofence overlay layers.
//!
//! Overlays are loaded once at startup from GeoJSON feature collections and
//! never mutated afterwards. Visibility is view state held elsewhere; the
//! registry only answers "what does overlay X look like".

use crate::error::{ConfigError, FleetwatchError, ParseError, Result};
use crate::types::{Color, GeoBounds, GeoPoint};
use geojson::GeoJson;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// GeoJSON feature property bag.
pub type JsonObject = Map<String, JsonValue>;

/// Geometry family of an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    /// Closed areas such as city boundaries
    Polygon,
    /// Barrier polylines
    Line,
}

/// Stroke and fill style of an overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    pub color: Color,

    /// Stroke width in pixels
    #[serde(default = "default_weight")]
    pub weight: f32,

    /// Stroke opacity
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    /// Fill opacity, polygons only
    #[serde(default)]
    pub fill_opacity: Option<f32>,

    /// Dash pattern (dash, gap) in pixels
    #[serde(default)]
    pub dash: Option<Vec<f32>>,
}

fn default_weight() -> f32 {
    2.0
}

fn default_opacity() -> f32 {
    0.8
}

impl OverlayStyle {
    pub fn solid(color: Color, weight: f32) -> Self {
        Self {
            color,
            weight,
            opacity: default_opacity(),
            fill_opacity: None,
            dash: None,
        }
    }

    pub fn with_fill(mut self, fill_opacity: f32) -> Self {
        self.fill_opacity = Some(fill_opacity);
        self
    }

    pub fn with_dash(mut self, dash: f32, gap: f32) -> Self {
        self.dash = Some(vec![dash, gap]);
        self
    }
}

/// One drawable part of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureGeometry {
    /// Outer ring followed by holes
    Polygon(Vec<Vec<GeoPoint>>),
    Line(Vec<GeoPoint>),
}

impl FeatureGeometry {
    fn points(&self) -> Box<dyn Iterator<Item = GeoPoint> + '_> {
        match self {
            FeatureGeometry::Polygon(rings) => Box::new(rings.iter().flatten().copied()),
            FeatureGeometry::Line(points) => Box::new(points.iter().copied()),
        }
    }
}

/// A feature with its resolved tooltip label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayFeature {
    pub parts: Vec<FeatureGeometry>,
    pub label: Option<String>,
}

/// A named geofence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceOverlay {
    pub id: String,
    pub name: String,
    pub kind: OverlayKind,
    pub style: OverlayStyle,
    pub label_field: String,
    pub fallback_label_field: Option<String>,
    pub features: Vec<OverlayFeature>,
}

impl GeofenceOverlay {
    /// Parses a GeoJSON FeatureCollection into an overlay.
    pub fn from_geojson(source: &OverlaySource, content: &str) -> Result<Self> {
        let geojson: GeoJson = content
            .parse()
            .map_err(|e: geojson::Error| ParseError::geojson(&source.id, e.to_string()))?;

        let collection = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            _ => {
                return Err(
                    ParseError::geojson(&source.id, "expected a FeatureCollection").into(),
                )
            }
        };

        let mut features = Vec::with_capacity(collection.features.len());
        for feature in collection.features {
            let Some(geometry) = feature.geometry else {
                continue;
            };
            let parts = convert_geometry(geometry.value);
            if parts.is_empty() {
                debug!(overlay = %source.id, "Skipping feature without polygon or line geometry");
                continue;
            }
            let label = feature_label(
                feature.properties.as_ref(),
                &source.label_field,
                source.fallback_label_field.as_deref(),
            );
            features.push(OverlayFeature { parts, label });
        }

        Ok(Self {
            id: source.id.clone(),
            name: source.name.clone().unwrap_or_else(|| source.id.clone()),
            kind: source.kind,
            style: source.style.clone(),
            label_field: source.label_field.clone(),
            fallback_label_field: source.fallback_label_field.clone(),
            features,
        })
    }

    /// Reads and parses the overlay's GeoJSON file.
    pub fn load(source: &OverlaySource) -> Result<Self> {
        let content = std::fs::read_to_string(&source.path).map_err(|e| {
            ConfigError::load_failed(source.path.display().to_string(), e.to_string())
        })?;
        let overlay = Self::from_geojson(source, &content)?;
        info!(
            overlay = %overlay.id,
            features = overlay.features.len(),
            "Loaded geofence overlay from {}",
            source.path.display()
        );
        Ok(overlay)
    }

    /// Bounding box of all geometry, if any.
    pub fn bounds(&self) -> Option<GeoBounds> {
        GeoBounds::from_points(
            self.features
                .iter()
                .flat_map(|f| f.parts.iter())
                .flat_map(|part| part.points()),
        )
    }
}

fn to_point(position: &[f64]) -> Option<GeoPoint> {
    match position {
        [lon, lat, ..] => Some(GeoPoint::new(*lat, *lon)),
        _ => None,
    }
}

fn to_line(positions: &[Vec<f64>]) -> Vec<GeoPoint> {
    positions.iter().filter_map(|p| to_point(p)).collect()
}

fn convert_geometry(value: geojson::Value) -> Vec<FeatureGeometry> {
    match value {
        geojson::Value::Polygon(rings) => {
            vec![FeatureGeometry::Polygon(rings.iter().map(|r| to_line(r)).collect())]
        }
        geojson::Value::MultiPolygon(polygons) => polygons
            .iter()
            .map(|rings| FeatureGeometry::Polygon(rings.iter().map(|r| to_line(r)).collect()))
            .collect(),
        geojson::Value::LineString(line) => vec![FeatureGeometry::Line(to_line(&line))],
        geojson::Value::MultiLineString(lines) => lines
            .iter()
            .map(|line| FeatureGeometry::Line(to_line(line)))
            .collect(),
        geojson::Value::GeometryCollection(geometries) => geometries
            .into_iter()
            .flat_map(|g| convert_geometry(g.value))
            .collect(),
        _ => Vec::new(),
    }
}

/// Resolves the tooltip label of a feature.
///
/// Tries `label_field`, then `fallback_field`; a property that is missing,
/// null, blank or malformed yields no label rather than an error.
pub fn feature_label(
    properties: Option<&JsonObject>,
    label_field: &str,
    fallback_field: Option<&str>,
) -> Option<String> {
    let properties = properties?;
    std::iter::once(label_field)
        .chain(fallback_field)
        .find_map(|field| match extract_label(properties, field) {
            Ok(label) => label,
            Err(err) => {
                debug!("Dropping overlay label: {}", err);
                None
            }
        })
}

fn extract_label(properties: &JsonObject, field: &str) -> Result<Option<String>> {
    let label = match properties.get(field) {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => Some(s.trim().to_string()),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        Some(JsonValue::Bool(b)) => Some(b.to_string()),
        Some(JsonValue::Array(_)) | Some(JsonValue::Object(_)) => {
            return Err(FleetwatchError::malformed_property(
                field,
                "expected a scalar value",
            ))
        }
    };
    Ok(label.filter(|s| !s.is_empty()))
}

/// Where and how to load one overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySource {
    pub id: String,

    /// Display name for the layer control panel (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,

    pub kind: OverlayKind,

    /// GeoJSON FeatureCollection file
    pub path: PathBuf,

    /// Property used as the feature tooltip
    pub label_field: String,

    /// Property tried when `label_field` is absent or empty
    #[serde(default)]
    pub fallback_label_field: Option<String>,

    pub style: OverlayStyle,
}

impl OverlaySource {
    /// Default city polygon source.
    pub fn city_polygons() -> Self {
        Self {
            id: "city-polygons".to_string(),
            name: Some("City polygons".to_string()),
            kind: OverlayKind::Polygon,
            path: PathBuf::from("data/city_polygons.geojson"),
            label_field: "NM_MUN".to_string(),
            fallback_label_field: Some("name".to_string()),
            style: OverlayStyle::solid(Color::rgb(0x00, 0xc2, 0xff), 2.0).with_fill(0.15),
        }
    }

    /// Default barrier line source.
    pub fn barrier_lines() -> Self {
        Self {
            id: "barrier-lines".to_string(),
            name: Some("Barrier lines".to_string()),
            kind: OverlayKind::Line,
            path: PathBuf::from("data/barrier_lines.geojson"),
            label_field: "name".to_string(),
            fallback_label_field: Some("id".to_string()),
            style: OverlayStyle::solid(Color::rgb(0xff, 0x88, 0x00), 3.0).with_dash(6.0, 4.0),
        }
    }

    /// Resolves a relative path against `base`.
    pub fn resolve_path(&mut self, base: &Path) {
        if self.path.is_relative() {
            self.path = base.join(&self.path);
        }
    }
}

/// Immutable, ordered collection of overlays.
#[derive(Debug, Clone, Default)]
pub struct OverlayRegistry {
    overlays: Vec<GeofenceOverlay>,
}

impl OverlayRegistry {
    /// Builds a registry, rejecting duplicate ids.
    pub fn new(overlays: Vec<GeofenceOverlay>) -> Result<Self> {
        let mut seen = HashSet::new();
        for overlay in &overlays {
            if !seen.insert(overlay.id.as_str()) {
                return Err(ConfigError::DuplicateOverlayId {
                    id: overlay.id.clone(),
                }
                .into());
            }
        }
        Ok(Self { overlays })
    }

    /// Loads every configured source from disk.
    pub fn load(sources: &[OverlaySource]) -> Result<Self> {
        let overlays = sources
            .iter()
            .map(GeofenceOverlay::load)
            .collect::<Result<Vec<_>>>()?;
        Self::new(overlays)
    }

    pub fn get_overlay(&self, id: &str) -> Result<&GeofenceOverlay> {
        self.overlays
            .iter()
            .find(|overlay| overlay.id == id)
            .ok_or_else(|| FleetwatchError::unknown_overlay(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.overlays.iter().any(|overlay| overlay.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeofenceOverlay> {
        self.overlays.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.overlays.iter().map(|overlay| overlay.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }
}
