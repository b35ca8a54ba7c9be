//! Core data model for the fleetwatch map engine.
//!
//! Position records arrive pre-labeled by an upstream geofence job; this
//! module only describes them, it never recomputes membership.

use crate::error::{FleetwatchError, ParseError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::Deref;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// A WGS-84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns true if latitude is within [-90, 90] and longitude within [-180, 180].
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// Axis-aligned geographic bounding box.
///
/// Does not handle boxes crossing the antimeridian; fleets tracked by this
/// dashboard operate within a single region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    /// Creates a degenerate box around a single point.
    pub fn from_point(point: GeoPoint) -> Self {
        Self {
            south: point.latitude,
            west: point.longitude,
            north: point.latitude,
            east: point.longitude,
        }
    }

    /// Builds the smallest box containing every valid point.
    ///
    /// Returns `None` when the iterator yields no valid points.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = GeoPoint>,
    {
        let mut bounds: Option<GeoBounds> = None;
        for point in points.into_iter().filter(GeoPoint::is_valid) {
            match bounds.as_mut() {
                Some(b) => b.extend(point),
                None => bounds = Some(GeoBounds::from_point(point)),
            }
        }
        bounds
    }

    /// Grows the box to include `point`.
    pub fn extend(&mut self, point: GeoPoint) {
        self.south = self.south.min(point.latitude);
        self.north = self.north.max(point.latitude);
        self.west = self.west.min(point.longitude);
        self.east = self.east.max(point.longitude);
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        point.latitude >= self.south
            && point.latitude <= self.north
            && point.longitude >= self.west
            && point.longitude <= self.east
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }
}

/// RGBA color, written in configuration as `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the same color with alpha scaled by `opacity` (clamped to [0, 1]).
    pub fn with_opacity(self, opacity: f32) -> Self {
        let alpha = (self.a as f32 * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a: alpha, ..self }
    }
}

impl FromStr for Color {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidColor {
            value: s.to_string(),
        };
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, alpha))
    }
}

impl TryFrom<String> for Color {
    type Error = ParseError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// A single geotagged vehicle ping, labeled upstream with geofence flags.
///
/// Accepts both the English field names and the upstream export's names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    #[serde(alias = "vehicle_license_plate")]
    pub vehicle_id: String,

    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(alias = "location_latitude")]
    pub latitude: f64,

    #[serde(alias = "location_longitude")]
    pub longitude: f64,

    #[serde(alias = "intersecta_barreira_prancha", default)]
    pub intersects_barrier: bool,

    #[serde(alias = "dentro_poligono_cidade", default)]
    pub inside_polygon: bool,

    /// Authoritative alert flag. May be set for causes other than the two
    /// geofence layers, so it is never re-derived from them.
    #[serde(alias = "posicao_com_alerta", default)]
    pub is_alert: bool,
}

impl PositionRecord {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Checks the coordinate range invariant.
    pub fn validate(&self) -> Result<()> {
        if self.position().is_valid() {
            Ok(())
        } else {
            Err(FleetwatchError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Parses RFC 3339 timestamps, or naive `YYYY-MM-DDTHH:MM:SS[.f]` read as UTC.
pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, ParseError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ParseError::InvalidTimestamp {
            value: raw.to_string(),
        })
}

/// Immutable, cheaply cloneable batch of position records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionBatch {
    records: Arc<[PositionRecord]>,
}

impl PositionBatch {
    pub fn new(records: Vec<PositionRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    /// Parses a flat JSON array of position objects.
    ///
    /// Elements that do not read as a record are logged and skipped; only a
    /// document that is not a JSON array fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let total = values.len();

        let records: Vec<PositionRecord> = values
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(index, "Skipping unreadable position record: {}", e);
                    None
                }
            })
            .collect();

        if records.len() < total {
            warn!(
                kept = records.len(),
                skipped = total - records.len(),
                "Position batch had unreadable records"
            );
        }
        Ok(Self::new(records))
    }

    /// Loads a batch from a JSON file on disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }
}

/// Parses a position batch from a JSON array.
pub fn parse_batch(json: &str) -> Result<PositionBatch> {
    PositionBatch::from_json(json)
}

/// Loads a position batch from a JSON file.
pub fn load_batch<P: AsRef<Path>>(path: P) -> Result<PositionBatch> {
    PositionBatch::load(path)
}

impl Deref for PositionBatch {
    type Target = [PositionRecord];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

impl From<Vec<PositionRecord>> for PositionBatch {
    fn from(records: Vec<PositionRecord>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<PositionRecord> for PositionBatch {
    fn from_iter<I: IntoIterator<Item = PositionRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Stable identifier of a marker placed for a position record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerId(String);

impl MarkerId {
    /// Derives the id from the record identity and its index in the batch.
    pub fn for_record(index: usize, record: &PositionRecord) -> Self {
        Self(format!(
            "{}@{}#{}",
            record.vehicle_id,
            record.timestamp.timestamp_millis(),
            index
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
