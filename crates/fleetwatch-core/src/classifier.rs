//! Marker classification.
//!
//! Maps every position record to exactly one marker style. The record's
//! `is_alert` flag decides the category; the two geofence flags only pick
//! the alert border color.

use crate::config::MarkerPalette;
use crate::types::{Color, PositionRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level marker category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerCategory {
    Normal,
    Alert,
}

/// Style key of a marker, one per visual variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleKey {
    /// Not an alert
    Normal,
    /// Alert crossing a barrier and inside a polygon
    AlertBoth,
    /// Alert crossing a barrier
    AlertBarrier,
    /// Alert inside a city polygon
    AlertPolygon,
    /// Alert raised upstream for another reason
    AlertOther,
}

impl StyleKey {
    /// Picks the style key for a record.
    pub fn for_record(record: &PositionRecord) -> Self {
        if !record.is_alert {
            return StyleKey::Normal;
        }
        match (record.intersects_barrier, record.inside_polygon) {
            (true, true) => StyleKey::AlertBoth,
            (true, false) => StyleKey::AlertBarrier,
            (false, true) => StyleKey::AlertPolygon,
            (false, false) => StyleKey::AlertOther,
        }
    }

    pub fn category(self) -> MarkerCategory {
        match self {
            StyleKey::Normal => MarkerCategory::Normal,
            _ => MarkerCategory::Alert,
        }
    }

    pub fn is_alert(self) -> bool {
        self.category() == MarkerCategory::Alert
    }
}

impl fmt::Display for StyleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StyleKey::Normal => "normal",
            StyleKey::AlertBoth => "alert-both",
            StyleKey::AlertBarrier => "alert-barrier",
            StyleKey::AlertPolygon => "alert-polygon",
            StyleKey::AlertOther => "alert-other",
        };
        f.write_str(name)
    }
}

/// Resolved visual style of one marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub key: StyleKey,
    pub radius: f32,
    pub fill: Color,
    pub border: Color,
    pub border_width: f32,
    pub opacity: f32,
    /// Glow drawn behind alert markers
    pub halo: Option<Color>,
}

impl MarkerStyle {
    pub fn category(&self) -> MarkerCategory {
        self.key.category()
    }

    pub fn is_alert(&self) -> bool {
        self.key.is_alert()
    }
}

/// Classifies a record. Total and deterministic: every record maps to one style.
pub fn classify(record: &PositionRecord, palette: &MarkerPalette) -> MarkerStyle {
    let key = StyleKey::for_record(record);

    if !key.is_alert() {
        return MarkerStyle {
            key,
            radius: palette.normal.radius,
            fill: palette.normal.fill,
            border: palette.normal_border,
            border_width: palette.normal.border_width,
            opacity: palette.normal.opacity,
            halo: None,
        };
    }

    // Barrier wins over polygon when both flags are set
    let border = match key {
        StyleKey::AlertBoth | StyleKey::AlertBarrier => palette.barrier_color,
        StyleKey::AlertPolygon => palette.polygon_color,
        _ => palette.default_alert_color,
    };

    MarkerStyle {
        key,
        radius: palette.alert.radius,
        fill: palette.alert.fill,
        border,
        border_width: palette.alert.border_width,
        opacity: palette.alert.opacity,
        halo: Some(palette.alert_halo),
    }
}

/// Geofence tag shown in an alert tooltip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusTag {
    Barrier,
    Polygon,
}

impl StatusTag {
    pub fn label(self) -> &'static str {
        match self {
            StatusTag::Barrier => "Barrier",
            StatusTag::Polygon => "Polygon",
        }
    }

    pub fn color(self, palette: &MarkerPalette) -> Color {
        match self {
            StatusTag::Barrier => palette.barrier_color,
            StatusTag::Polygon => palette.polygon_color,
        }
    }
}

/// Hover content of a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerTooltip {
    pub vehicle_id: String,
    /// Timestamp as `dd/mm/yyyy HH:MM:SS`
    pub time: String,
    pub tags: Vec<StatusTag>,
}

/// Builds the tooltip of an alert marker. Normal markers have none.
pub fn tooltip_for(record: &PositionRecord) -> Option<MarkerTooltip> {
    if !record.is_alert {
        return None;
    }

    let mut tags = Vec::with_capacity(2);
    if record.intersects_barrier {
        tags.push(StatusTag::Barrier);
    }
    if record.inside_polygon {
        tags.push(StatusTag::Polygon);
    }

    Some(MarkerTooltip {
        vehicle_id: record.vehicle_id.clone(),
        time: record.timestamp.format("%d/%m/%Y %H:%M:%S").to_string(),
        tags,
    })
}
