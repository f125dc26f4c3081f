//! # Track Telemetry
//!
//! Continuous, randomly-addressable telemetry timeline for GPS track recordings.
//!
//! This library provides:
//! - GPX ingestion with optional sensor channels (cadence, heart rate, power, temperature)
//! - A single analysis pass deriving distance, smoothed speed, bearing and grade
//! - Point queries by progress, elapsed time, absolute time, distance or position,
//!   answered with an interpolated [`Sonda`] snapshot
//! - Global min/max/mean boundaries per metric for gauge normalization
//!
//! ## Features
//!
//! - **`serde`** - Serialize/Deserialize on all public value types
//! - **`parallel`** - Run the nearest-point scan with rayon
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use track_telemetry::Telemetry;
//!
//! let gpx = r#"<?xml version="1.0"?>
//! <gpx version="1.1" creator="demo">
//!   <trk><trkseg>
//!     <trkpt lat="47.000" lon="8.000"><ele>500</ele><time>2023-06-01T10:00:00Z</time></trkpt>
//!     <trkpt lat="47.001" lon="8.001"><ele>505</ele><time>2023-06-01T10:00:05Z</time></trkpt>
//!     <trkpt lat="47.002" lon="8.002"><ele>510</ele><time>2023-06-01T10:00:10Z</time></trkpt>
//!   </trkseg></trk>
//! </gpx>"#;
//!
//! let telemetry = Telemetry::load_str(gpx).unwrap();
//! assert_eq!(telemetry.len(), 3);
//!
//! let sonda = telemetry.sonda_for_relative_time(5_000).unwrap();
//! assert!((sonda.elevation().value - 505.0).abs() < 1e-6);
//! println!("{:.3} km at {:.1} km/h", sonda.distance().value, sonda.speed().value);
//! ```

use chrono::{DateTime, Utc};

pub mod error;
pub mod extensions;
pub mod geo_utils;
pub mod gpx;
pub mod minmax;
pub mod sonda;
pub mod telemetry;

pub use error::{Result, TelemetryError};
pub use gpx::{TrackRecord, SAMPLE_GPX};
pub use minmax::MinMax;
pub use sonda::{GeoInputValue, InputValue, Sonda};
pub use telemetry::{Boundaries, Telemetry};

// ============================================================================
// Core Types
// ============================================================================

/// A geographic position in degrees.
///
/// # Example
/// ```
/// use track_telemetry::GeoPosition;
/// let zurich = GeoPosition::new(47.3769, 8.5417);
/// assert!(zurich.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPosition {
    /// Create a new position.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    #[inline]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[inline]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Check if the position has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

impl From<GeoPosition> for geo::Point<f64> {
    fn from(p: GeoPosition) -> Self {
        geo::Point::new(p.longitude, p.latitude)
    }
}

impl From<geo::Point<f64>> for GeoPosition {
    fn from(p: geo::Point<f64>) -> Self {
        GeoPosition::new(p.y(), p.x())
    }
}

/// Optional sensor channels carried in a point's extension block.
///
/// Each channel is independently present or absent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorChannels {
    /// Revolutions per minute
    pub cadence: Option<f64>,
    /// Beats per minute
    pub heart_rate: Option<f64>,
    /// Watts
    pub power: Option<f64>,
    /// Degrees Celsius
    pub temperature: Option<f64>,
}

impl SensorChannels {
    /// True when no channel is present.
    pub fn is_empty(&self) -> bool {
        self.cadence.is_none()
            && self.heart_rate.is_none()
            && self.power.is_none()
            && self.temperature.is_none()
    }
}

/// One raw GPS sample as recorded.
///
/// Immutable once built; derived values live in [`Kinematics`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackPoint {
    pub position: GeoPosition,
    /// Meters above reference (0 when the source has none)
    pub elevation: f64,
    pub time: DateTime<Utc>,
    pub channels: SensorChannels,
}

impl TrackPoint {
    /// Create a track point without sensor channels.
    pub fn new(position: GeoPosition, elevation: f64, time: DateTime<Utc>) -> Self {
        Self {
            position,
            elevation,
            time,
            channels: SensorChannels::default(),
        }
    }

    /// Attach sensor channels.
    pub fn with_channels(mut self, channels: SensorChannels) -> Self {
        self.channels = channels;
        self
    }

    /// Build a point from a decoded record.
    ///
    /// Latitude, longitude and time are required; returns `None` if any of them
    /// is missing or unparsable. Elevation defaults to 0.0.
    pub fn from_record(record: &TrackRecord) -> Option<Self> {
        let latitude = record.latitude.as_deref()?.trim().parse::<f64>().ok()?;
        let longitude = record.longitude.as_deref()?.trim().parse::<f64>().ok()?;
        let time = geo_utils::parse_timestamp(record.time.as_deref()?)?;
        let position = GeoPosition::new(latitude, longitude);
        if !position.is_valid() {
            return None;
        }

        let elevation = record
            .elevation
            .as_deref()
            .and_then(|e| e.trim().parse::<f64>().ok())
            .filter(|e| e.is_finite())
            .unwrap_or(0.0);

        Some(Self::new(position, elevation, time).with_channels(record.channels))
    }

    /// Timestamp in milliseconds since the Unix epoch.
    #[inline]
    pub fn millis(&self) -> i64 {
        self.time.timestamp_millis()
    }
}

/// Kinematics derived for one [`TrackPoint`] by the analysis pass.
///
/// The last point of a track keeps the zero defaults for everything but
/// `cumulative_distance`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Kinematics {
    /// Kilometers from the start of the track
    pub cumulative_distance: f64,
    /// Kilometers to the next point
    pub segment_length: f64,
    /// km/h, smoothed over the speed window
    pub speed: f64,
    /// Degrees, 0-360
    pub bearing: f64,
    /// Percent, smoothed over the grade window
    pub grade: f64,
}

/// Configuration for the analysis pass.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalysisConfig {
    /// Lookback window for speed smoothing.
    /// Default: 3000 ms
    pub speed_window_ms: i64,

    /// Lookback window for grade smoothing.
    /// Default: 9000 ms
    pub grade_window_ms: i64,

    /// Maximum number of preceding points inspected by either window.
    /// Default: 10
    pub max_lookback: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            speed_window_ms: 3_000,
            grade_window_ms: 9_000,
            max_lookback: 10,
        }
    }
}
