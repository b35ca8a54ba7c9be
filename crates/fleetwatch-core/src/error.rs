//! Error types for the fleetwatch map engine.
//!
//! Almost every failure in this subsystem is absorbed locally: a missing
//! rendering surface is retried on the next mount, a bad coordinate is left
//! out of the viewport fit, an unknown layer id is ignored. The variants still
//! exist so callers can log them uniformly and tests can assert on them.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Result type alias using FleetwatchError as the error type.
pub type Result<T> = std::result::Result<T, FleetwatchError>;

/// Top-level error type for all fleetwatch operations.
#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum FleetwatchError {
    /// The rendering container was absent at mount time
    #[error("Rendering surface is not available")]
    MissingSurface,

    /// A position record carries an out-of-range coordinate
    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// Toggle request for an overlay that is not registered
    #[error("Unknown overlay id: {id}")]
    UnknownOverlayId { id: String },

    /// Switch request for a base layer that is not in the catalog
    #[error("Unknown base layer id: {id}")]
    UnknownBaseLayerId { id: String },

    /// Label extraction from an overlay feature failed
    #[error("Malformed feature property '{field}': {reason}")]
    MalformedFeatureProperty { field: String, reason: String },

    /// A map session is already live for this widget
    #[error("A map session is already active")]
    SessionAlreadyActive,

    /// The receiving side of the session command queue was dropped
    #[error("Session command channel is closed")]
    ChannelClosed,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Parsing and deserialization errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

impl FleetwatchError {
    /// Creates an unknown overlay error.
    pub fn unknown_overlay(id: impl Into<String>) -> Self {
        Self::UnknownOverlayId { id: id.into() }
    }

    /// Creates an unknown base layer error.
    pub fn unknown_base_layer(id: impl Into<String>) -> Self {
        Self::UnknownBaseLayerId { id: id.into() }
    }

    /// Creates a malformed feature property error.
    pub fn malformed_property(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedFeatureProperty {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the error is absorbed with best-effort degradation
    /// instead of being surfaced to the hosting application.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FleetwatchError::MissingSurface
                | FleetwatchError::InvalidCoordinate { .. }
                | FleetwatchError::UnknownOverlayId { .. }
                | FleetwatchError::UnknownBaseLayerId { .. }
                | FleetwatchError::MalformedFeatureProperty { .. }
        )
    }
}

/// Errors related to parsing input data.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ParseError {
    /// Failed to parse JSON data
    #[error("JSON parse error at line {line}, column {column}: {message}")]
    JsonError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Failed to parse GeoJSON data
    #[error("GeoJSON error in {source_name}: {message}")]
    GeoJsonError {
        source_name: String,
        message: String,
    },

    /// Invalid timestamp format
    #[error("Invalid timestamp: {value}")]
    InvalidTimestamp { value: String },

    /// Invalid color literal
    #[error("Invalid color: {value}")]
    InvalidColor { value: String },
}

impl ParseError {
    /// Creates a JSON parse error.
    pub fn json(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::JsonError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Creates a GeoJSON parse error.
    pub fn geojson(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GeoJsonError {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::json(err.line(), err.column(), err.to_string())
    }
}

impl From<serde_json::Error> for FleetwatchError {
    fn from(err: serde_json::Error) -> Self {
        FleetwatchError::Parse(err.into())
    }
}

/// Errors related to configuration.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Duplicate overlay id
    #[error("Duplicate overlay id: {id}")]
    DuplicateOverlayId { id: String },

    /// Duplicate base layer id
    #[error("Duplicate base layer id: {id}")]
    DuplicateBaseLayerId { id: String },
}

impl ConfigError {
    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a load failed error.
    pub fn load_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LoadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Wrapper for I/O errors to make them serializable.
#[derive(Debug, Error, Serialize, Deserialize)]
#[error("I/O error: {kind:?}: {message}")]
pub struct IoError {
    pub kind: IoErrorKind,
    pub message: String,
}

impl From<io::Error> for IoError {
    fn from(err: io::Error) -> Self {
        Self {
            kind: err.kind().into(),
            message: err.to_string(),
        }
    }
}

impl From<io::Error> for FleetwatchError {
    fn from(err: io::Error) -> Self {
        FleetwatchError::Io(err.into())
    }
}

/// Serializable subset of std::io::ErrorKind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoErrorKind {
    NotFound,
    PermissionDenied,
    InvalidData,
    UnexpectedEof,
    Other,
}

impl From<io::ErrorKind> for IoErrorKind {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => IoErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => IoErrorKind::PermissionDenied,
            io::ErrorKind::InvalidData => IoErrorKind::InvalidData,
            io::ErrorKind::UnexpectedEof => IoErrorKind::UnexpectedEof,
            _ => IoErrorKind::Other,
        }
    }
}
