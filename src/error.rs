//! Error types for loading track sources.

use thiserror::Error;

/// Errors that can occur while loading a track.
///
/// Only container-level failures surface here. A single bad sample is dropped
/// during ingestion and never becomes an error.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The source could not be read.
    #[error("failed to read track source: {0}")]
    Io(#[from] std::io::Error),

    /// The XML container is malformed.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// The document has no `<gpx>` root element.
    #[error("missing required element: gpx")]
    MissingRoot,
}

impl From<quick_xml::Error> for TelemetryError {
    fn from(e: quick_xml::Error) -> Self {
        match e {
            quick_xml::Error::Io(io) => TelemetryError::Io(std::io::Error::new(io.kind(), io.to_string())),
            other => TelemetryError::Xml(other.to_string()),
        }
    }
}

/// Result type for track loading.
pub type Result<T> = std::result::Result<T, TelemetryError>;
