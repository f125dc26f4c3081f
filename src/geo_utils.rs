//! # Geographic Utilities
//!
//! Geodesy and time helpers used by the analysis pass and the position query.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two positions, in km |
//! | [`bearing`] | Initial compass bearing between two positions |
//! | [`distance_3d`] | Surface distance combined with elevation change, in km |
//! | [`parse_timestamp`] | ISO-8601 timestamp parsing |
//!
//! ## Example
//!
//! ```rust
//! use track_telemetry::{GeoPosition, geo_utils};
//!
//! let a = GeoPosition::new(0.0, 0.0);
//! let b = GeoPosition::new(0.0, 1.0);
//!
//! let km = geo_utils::haversine_distance(&a, &b);
//! assert!((km - 111.19).abs() < 0.01);
//!
//! let heading = geo_utils::bearing(&a, &b);
//! assert!((heading - 90.0).abs() < 1e-9);
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances assume a spherical Earth with radius 6,371 km. All functions expect
//! WGS84 coordinates in degrees.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::GeoPosition;

/// Mean Earth radius used by [`haversine_distance`], in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two positions using the Haversine formula.
///
/// Returns kilometers along the Earth's surface.
///
/// # Example
///
/// ```rust
/// use track_telemetry::{GeoPosition, geo_utils};
///
/// let london = GeoPosition::new(51.5074, -0.1278);
/// let paris = GeoPosition::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343.5).abs() < 1.0);
/// ```
#[inline]
pub fn haversine_distance(a: &GeoPosition, b: &GeoPosition) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi2.cos() * phi1.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Surface distance combined with the elevation delta, in kilometers.
///
/// Elevations are in meters. The horizontal and vertical legs are combined
/// with Pythagoras, which is accurate for the short segments between samples.
pub fn distance_3d(a: &GeoPosition, a_elevation: f64, b: &GeoPosition, b_elevation: f64) -> f64 {
    let horizontal = haversine_distance(a, b);
    let vertical = (b_elevation - a_elevation) / 1000.0;
    (horizontal * horizontal + vertical * vertical).sqrt()
}

// =============================================================================
// Direction Functions
// =============================================================================

/// Initial compass bearing from `from` to `to`, in degrees `[0, 360)`.
///
/// North is 0, east is 90.
pub fn bearing(from: &GeoPosition, to: &GeoPosition) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let d_lambda = (to.longitude - from.longitude).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    let theta = y.atan2(x).to_degrees();

    // theta is in (-180, 180], so 360 - theta is always positive here
    let compass = 360.0 - ((360.0 - theta) % 360.0);
    if compass >= 360.0 {
        0.0
    } else {
        compass
    }
}

// =============================================================================
// Time Functions
// =============================================================================

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 (`2023-06-01T10:00:00Z`, `2023-06-01T12:00:00.250+02:00`).
/// Timestamps without a zone designator are read as UTC.
///
/// # Example
///
/// ```rust
/// use track_telemetry::geo_utils::parse_timestamp;
///
/// let t = parse_timestamp("2023-06-01T10:00:00.500Z").unwrap();
/// assert_eq!(t.timestamp_millis() % 1000, 500);
/// assert!(parse_timestamp("not a time").is_none());
/// ```
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

// =============================================================================
// Unit Tests
// =============================================================================
