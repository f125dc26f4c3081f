//! # Telemetry Timeline
//!
//! An ordered track of [`TrackPoint`]s with derived [`Kinematics`] and
//! per-metric [`MinMax`] boundaries, queryable at any progress, time, distance
//! or position.
//!
//! ## Algorithm
//! 1. Decode the GPX container into raw records; drop records without a usable
//!    latitude, longitude or timestamp
//! 2. One forward pass over the points: cumulative 3D distance, speed smoothed
//!    over a short time lookback, grade smoothed over a longer one, bearing to
//!    the next point, boundary sampling
//! 3. Queries bisect on a monotonic key (time or cumulative distance), pick the
//!    bracketing pair of points and interpolate a [`Sonda`] between them
//!
//! Raw points and derived kinematics are kept in two parallel vectors indexed
//! identically. Both are written once during construction and only read after.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use geo::{Coord, LineString};
use log::{debug, info, warn};

use crate::error::Result;
use crate::geo_utils::{bearing, distance_3d, haversine_distance};
use crate::gpx::{self, TrackRecord, SAMPLE_GPX};
use crate::{AnalysisConfig, GeoPosition, Kinematics, MinMax, Sonda, TrackPoint};

/// Track-wide boundary of every metric.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Boundaries {
    pub elevation: MinMax,
    pub latitude: MinMax,
    pub longitude: MinMax,
    pub speed: MinMax,
    pub bearing: MinMax,
    pub grade: MinMax,
    pub cadence: MinMax,
    pub temperature: MinMax,
    pub heart_rate: MinMax,
    pub power: MinMax,
}

/// A continuous, randomly-addressable telemetry timeline for one track.
///
/// # Example
/// ```
/// use track_telemetry::Telemetry;
///
/// let telemetry = Telemetry::sample();
/// assert!(!telemetry.is_empty());
///
/// // Scrub to the middle of the ride
/// let halfway = telemetry.time_for_progress(50.0).unwrap();
/// let sonda = telemetry.sonda_for_absolute_time(halfway);
/// assert!(!sonda.is_empty());
/// assert!((telemetry.progress_for_time(halfway) - 50.0).abs() < 0.01);
/// ```
#[derive(Debug, Clone)]
pub struct Telemetry {
    points: Vec<TrackPoint>,
    derived: Vec<Kinematics>,
    boundaries: Boundaries,
    center: GeoPosition,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::empty()
    }
}

impl Telemetry {
    // ========================================================================
    // Construction
    // ========================================================================

    /// A track without points. Every query answers with its "no result" value.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Build and analyze a track with the default [`AnalysisConfig`].
    ///
    /// Points are expected in ascending time order; they are not re-sorted.
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self::with_config(points, &AnalysisConfig::default())
    }

    /// Build and analyze a track with an explicit configuration.
    pub fn with_config(points: Vec<TrackPoint>, config: &AnalysisConfig) -> Self {
        let start = Instant::now();
        let (derived, boundaries) = analyze(&points, config);
        let center = GeoPosition::new(
            boundaries.latitude.mean().unwrap_or(0.0),
            boundaries.longitude.mean().unwrap_or(0.0),
        );
        debug!(
            "[Telemetry] Analyzed {} points in {}us",
            points.len(),
            start.elapsed().as_micros()
        );

        Self {
            points,
            derived,
            boundaries,
            center,
        }
    }

    /// Build a track from decoded records, dropping records that lack a
    /// usable latitude, longitude or timestamp.
    pub fn from_records(records: &[TrackRecord], config: &AnalysisConfig) -> Self {
        let points: Vec<TrackPoint> = records
            .iter()
            .enumerate()
            .filter_map(|(i, record)| {
                let point = TrackPoint::from_record(record);
                if point.is_none() {
                    debug!("[Telemetry] Dropping record {}: missing or invalid lat/lon/time", i);
                }
                point
            })
            .collect();
        let dropped = records.len() - points.len();

        let telemetry = Self::with_config(points, config);
        info!(
            "[Telemetry] Loaded {} points ({} dropped), {:.3} km over {}s",
            telemetry.len(),
            dropped,
            telemetry.total_distance(),
            telemetry.duration_millis() / 1000
        );
        telemetry
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load a GPX track from a stream.
    ///
    /// # Errors
    ///
    /// Fails only if the stream cannot be read or the container is malformed.
    /// Bad individual points are dropped.
    pub fn load<R: BufRead>(source: R) -> Result<Self> {
        Self::load_with_config(source, &AnalysisConfig::default())
    }

    /// Load a GPX track from a stream with an explicit configuration.
    pub fn load_with_config<R: BufRead>(source: R, config: &AnalysisConfig) -> Result<Self> {
        let records = gpx::read_records(source)?;
        Ok(Self::from_records(&records, config))
    }

    /// Load a GPX track from a string.
    pub fn load_str(xml: &str) -> Result<Self> {
        Self::load(xml.as_bytes())
    }

    /// Load a GPX track from a file.
    pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::load(BufReader::new(file))
    }

    /// Best-effort load: any failure is logged and yields an empty track.
    pub fn load_or_empty<R: BufRead>(source: R) -> Self {
        match Self::load(source) {
            Ok(telemetry) => telemetry,
            Err(e) => {
                warn!("[Telemetry] Falling back to empty track: {}", e);
                Self::empty()
            }
        }
    }

    /// The bundled demo track ([`SAMPLE_GPX`]).
    pub fn sample() -> Self {
        Self::load_or_empty(SAMPLE_GPX.as_bytes())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Raw points in track order.
    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Option<&TrackPoint> {
        self.points.get(index)
    }

    /// Derived kinematics, indexed like [`points`](Self::points).
    pub fn derived(&self) -> &[Kinematics] {
        &self.derived
    }

    pub fn kinematics(&self, index: usize) -> Option<&Kinematics> {
        self.derived.get(index)
    }

    pub fn boundaries(&self) -> &Boundaries {
        &self.boundaries
    }

    /// Mean latitude and longitude of all points; `(0, 0)` for an empty track.
    pub fn center_geo_position(&self) -> GeoPosition {
        self.center
    }

    pub fn min_time(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.time)
    }

    pub fn max_time(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.time)
    }

    /// Milliseconds between the first and last point.
    pub fn duration_millis(&self) -> i64 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => last.millis() - first.millis(),
            _ => 0,
        }
    }

    /// Kilometers from the first to the last point.
    pub fn total_distance(&self) -> f64 {
        self.derived.last().map(|k| k.cumulative_distance).unwrap_or(0.0)
    }

    /// The track as a polyline (x = longitude, y = latitude) for map widgets.
    pub fn line_string(&self) -> LineString<f64> {
        LineString::new(
            self.points
                .iter()
                .map(|p| Coord { x: p.position.longitude, y: p.position.latitude })
                .collect(),
        )
    }

    // ========================================================================
    // Progress Mapping
    // ========================================================================

    /// Distance in km at `progress` percent of the total distance.
    ///
    /// Global linear mapping between the first and last point, meant for
    /// scrubbing controls. 0 for an empty track.
    pub fn distance_for_progress(&self, progress: f64) -> f64 {
        match self.derived.first() {
            Some(first) => value_for_progress(first.cumulative_distance, self.total_distance(), progress),
            None => 0.0,
        }
    }

    /// Absolute time at `progress` percent of the track's duration.
    pub fn time_for_progress(&self, progress: f64) -> Option<DateTime<Utc>> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        if progress <= 0.0 {
            return Some(first.time);
        }
        if progress >= 100.0 {
            return Some(last.time);
        }
        let millis = value_for_progress(first.millis() as f64, last.millis() as f64, progress).round() as i64;
        Some(first.time + Duration::milliseconds(millis - first.millis()))
    }

    /// Progress (0-100) of `time` along the track's duration.
    pub fn progress_for_time(&self, time: DateTime<Utc>) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => progress_for(
                time.timestamp_millis() as f64,
                first.millis() as f64,
                last.millis() as f64,
            ),
            _ => 0.0,
        }
    }

    /// Progress (0-100) of `distance` km along the track.
    pub fn progress_for_distance(&self, distance: f64) -> f64 {
        match self.derived.first() {
            Some(first) => progress_for(distance, first.cumulative_distance, self.total_distance()),
            None => 0.0,
        }
    }

    // ========================================================================
    // Point Queries
    // ========================================================================

    /// Snapshot at an absolute time.
    ///
    /// Returns [`Sonda::empty`] for tracks with fewer than 2 points.
    pub fn sonda_for_absolute_time(&self, time: DateTime<Utc>) -> Sonda {
        let target = time.timestamp_millis() as f64;
        self.search(target, |i| self.points[i].millis() as f64)
    }

    /// Snapshot at `offset_millis` after the first point.
    ///
    /// `None` for an empty track. Offsets past either end clamp to it.
    pub fn sonda_for_relative_time(&self, offset_millis: i64) -> Option<Sonda> {
        let start = self.points.first()?.millis() as f64;
        Some(self.search(start + offset_millis as f64, |i| self.points[i].millis() as f64))
    }

    /// Snapshot at `distance` km from the start.
    ///
    /// Returns [`Sonda::empty`] for tracks with fewer than 2 points.
    pub fn sonda_for_distance(&self, distance: f64) -> Sonda {
        self.search(distance, |i| self.derived[i].cumulative_distance)
    }

    /// Snapshot at the track point nearest to `position`.
    ///
    /// Scans every point, endpoints included. `None` for tracks with fewer
    /// than 3 points.
    pub fn sonda_for_position(&self, position: &GeoPosition) -> Option<Sonda> {
        if self.points.len() < 3 {
            return None;
        }
        let nearest = self.nearest_index(position)?;
        Some(self.sonda_for_absolute_time(self.points[nearest].time))
    }

    #[cfg(not(feature = "parallel"))]
    fn nearest_index(&self, position: &GeoPosition) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, haversine_distance(position, &p.position)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(i, _)| i)
    }

    #[cfg(feature = "parallel")]
    fn nearest_index(&self, position: &GeoPosition) -> Option<usize> {
        use rayon::prelude::*;

        self.points
            .par_iter()
            .enumerate()
            .map(|(i, p)| (i, haversine_distance(position, &p.position)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(i, _)| i)
    }

    /// Bisect on `key`, pick the bracket around `target` and interpolate.
    ///
    /// Interior targets interpolate inside `(ix, ix + 1)`, the pair that
    /// contains them; targets outside the track clamp to the first or last pair.
    fn search(&self, target: f64, key: impl Fn(usize) -> f64) -> Sonda {
        let n = self.points.len();
        if n < 2 {
            return Sonda::empty();
        }

        let ix = bisect(n, target, &key);
        let last = n - 1;
        let (left, right) = if ix == 0 {
            (0, 1)
        } else if ix == last {
            (last - 1, last)
        } else if target < key(ix) {
            (ix - 1, ix)
        } else {
            (ix, ix + 1)
        };

        let progress = progress_for(target, key(left), key(right));
        Sonda::interpolate(self, left, right, progress, ix)
    }
}

// ============================================================================
// Analysis Pass
// ============================================================================

/// Derive kinematics and boundaries in one forward pass.
///
/// Strictly sequential: each point's cumulative distance builds on the one
/// written for its predecessor.
fn analyze(points: &[TrackPoint], config: &AnalysisConfig) -> (Vec<Kinematics>, Boundaries) {
    let n = points.len();
    let mut derived = vec![Kinematics::default(); n];
    let mut b = Boundaries::default();

    for i in 0..n {
        let point = &points[i];
        b.elevation.sample(point.elevation);
        b.latitude.sample(point.position.latitude);
        b.longitude.sample(point.position.longitude);
        if let Some(v) = point.channels.cadence {
            b.cadence.sample(v);
        }
        if let Some(v) = point.channels.heart_rate {
            b.heart_rate.sample(v);
        }
        if let Some(v) = point.channels.power {
            b.power.sample(v);
        }
        if let Some(v) = point.channels.temperature {
            b.temperature.sample(v);
        }

        if i + 1 < n {
            let next = &points[i + 1];
            let segment = distance_3d(&point.position, point.elevation, &next.position, next.elevation);
            derived[i].segment_length = segment;
            derived[i + 1].cumulative_distance = derived[i].cumulative_distance + segment;
            let next_distance = derived[i + 1].cumulative_distance;

            let from = lookback_start(points, i, config.speed_window_ms, config.max_lookback);
            let elapsed_ms = next.millis() - points[from].millis();
            if elapsed_ms > 0 {
                let hours = elapsed_ms as f64 / 3_600_000.0;
                derived[i].speed = (next_distance - derived[from].cumulative_distance) / hours;
            }

            let from = lookback_start(points, i, config.grade_window_ms, config.max_lookback);
            let run_km = next_distance - derived[from].cumulative_distance;
            if run_km > 0.0 {
                let rise_m = next.elevation - points[from].elevation;
                derived[i].grade = rise_m / (run_km * 1000.0) * 100.0;
            }

            derived[i].bearing = bearing(&point.position, &next.position);
        }

        b.speed.sample(derived[i].speed);
        b.bearing.sample(derived[i].bearing);
        b.grade.sample(derived[i].grade);
    }

    (derived, b)
}

/// Earliest of the `max_lookback` points before `i` that lies within
/// `window_ms` of it, or `i` itself.
fn lookback_start(points: &[TrackPoint], i: usize, window_ms: i64, max_lookback: usize) -> usize {
    let t = points[i].millis();
    let mut start = i;
    for j in (i.saturating_sub(max_lookback)..i).rev() {
        if t - points[j].millis() <= window_ms {
            start = j;
        }
    }
    start
}

// ============================================================================
// Search Helpers
// ============================================================================

/// Last index whose key is <= `target` (0 if the target precedes the track).
fn bisect(len: usize, target: f64, key: &impl Fn(usize) -> f64) -> usize {
    let (mut low, mut high) = (0, len);
    while high - low >= 2 {
        let mid = low + (high - low) / 2;
        if target < key(mid) {
            high = mid;
        } else {
            low = mid;
        }
    }
    low
}

/// Clamp-and-linear position of `value` between `first` and `last`, 0-100.
fn progress_for(value: f64, first: f64, last: f64) -> f64 {
    if value <= first {
        0.0
    } else if value >= last {
        100.0
    } else {
        (value - first) * 100.0 / (last - first)
    }
}

/// Inverse of [`progress_for`].
fn value_for_progress(first: f64, last: f64, progress: f64) -> f64 {
    if progress <= 0.0 {
        first
    } else if progress >= 100.0 {
        last
    } else {
        first + (last - first) * progress / 100.0
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SensorChannels, TelemetryError};
    use chrono::TimeZone;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 1, 10, 0, 0).unwrap()
    }

    fn point(secs: i64, lat: f64, lon: f64, ele: f64) -> TrackPoint {
        TrackPoint::new(GeoPosition::new(lat, lon), ele, t0() + Duration::seconds(secs))
    }

    /// 3 points, 5 s apart, climbing 5 m per step.
    fn three_point_track() -> Telemetry {
        Telemetry::new(vec![
            point(0, 47.0, 8.0, 500.0),
            point(5, 47.001, 8.001, 505.0),
            point(10, 47.002, 8.002, 510.0),
        ])
    }

    /// Straight line north, one point per second, 20 points.
    fn straight_track() -> Telemetry {
        Telemetry::new(
            (0..20)
                .map(|i| point(i, 47.0 + i as f64 * 0.0001, 8.0, 400.0 + (i % 4) as f64))
                .collect(),
        )
    }

    // ---- construction ------------------------------------------------------

    #[test]
    fn test_empty_track() {
        let t = Telemetry::empty();
        assert!(t.is_empty());
        assert_eq!(t.total_distance(), 0.0);
        assert_eq!(t.duration_millis(), 0);
        assert_eq!(t.min_time(), None);
        assert_eq!(t.time_for_progress(50.0), None);
        assert_eq!(t.distance_for_progress(50.0), 0.0);
        assert_eq!(t.progress_for_time(t0()), 0.0);
        assert_eq!(t.progress_for_distance(1.0), 0.0);
        assert_eq!(t.center_geo_position(), GeoPosition::new(0.0, 0.0));
        assert!(t.sonda_for_absolute_time(t0()).is_empty());
        assert!(t.sonda_for_distance(0.5).is_empty());
        assert!(t.sonda_for_relative_time(0).is_none());
        assert!(t.sonda_for_position(&GeoPosition::new(47.0, 8.0)).is_none());
        assert!(t.boundaries().elevation.is_empty());
    }

    #[test]
    fn test_single_point_track() {
        let t = Telemetry::new(vec![point(0, 47.0, 8.0, 500.0)]);
        assert_eq!(t.total_distance(), 0.0);
        assert_eq!(t.derived()[0], Kinematics::default());
        assert!(t.sonda_for_absolute_time(t0()).is_empty());
        assert!(t.sonda_for_relative_time(0).unwrap().is_empty());
        assert_eq!(t.center_geo_position(), GeoPosition::new(47.0, 8.0));
    }

    // ---- analysis pass -----------------------------------------------------

    #[test]
    fn test_cumulative_distance_monotonic() {
        for t in [three_point_track(), straight_track(), Telemetry::sample()] {
            assert_eq!(t.derived()[0].cumulative_distance, 0.0);
            for w in t.derived().windows(2) {
                assert!(w[1].cumulative_distance >= w[0].cumulative_distance);
                assert!(approx_eq(w[0].cumulative_distance + w[0].segment_length, w[1].cumulative_distance, 1e-12));
            }
            assert_eq!(t.total_distance(), t.derived().last().unwrap().cumulative_distance);
        }
    }

    #[test]
    fn test_segments_are_3d() {
        let t = three_point_track();
        let p = t.points();
        let expected = distance_3d(&p[0].position, 500.0, &p[1].position, 505.0);
        assert!(approx_eq(t.derived()[0].segment_length, expected, 1e-12));
        assert!(t.derived()[0].segment_length > haversine_distance(&p[0].position, &p[1].position));
    }

    #[test]
    fn test_last_point_defaults() {
        let t = three_point_track();
        let last = t.derived()[2];
        assert_eq!(last.speed, 0.0);
        assert_eq!(last.bearing, 0.0);
        assert_eq!(last.grade, 0.0);
        assert_eq!(last.segment_length, 0.0);
    }

    #[test]
    fn test_speed_without_lookback() {
        // 5 s spacing is outside the 3 s window: each point measures its own segment
        let t = three_point_track();
        let k = t.derived();
        assert!(approx_eq(k[0].speed, k[0].segment_length / (5.0 / 3600.0), 1e-9));
        assert!(approx_eq(k[1].speed, k[1].segment_length / (5.0 / 3600.0), 1e-9));
    }

    #[test]
    fn test_speed_uses_lookback_window() {
        let t = straight_track();
        let k = t.derived();
        // i = 10: points 7..=9 lie within 3 s, so the window starts at 7
        let expected = (k[11].cumulative_distance - k[7].cumulative_distance) / (4.0 / 3600.0);
        assert!(approx_eq(k[10].speed, expected, 1e-9));
        // i = 1: only point 0 precedes it
        let expected = (k[2].cumulative_distance - k[0].cumulative_distance) / (2.0 / 3600.0);
        assert!(approx_eq(k[1].speed, expected, 1e-9));
    }

    #[test]
    fn test_grade_uses_lookback_window() {
        let t = straight_track();
        let (p, k) = (t.points(), t.derived());
        // i = 12: 9 s window reaches back to point 3
        let rise = p[13].elevation - p[3].elevation;
        let run = k[13].cumulative_distance - k[3].cumulative_distance;
        assert!(approx_eq(k[12].grade, rise / (run * 1000.0) * 100.0, 1e-9));
    }

    #[test]
    fn test_grade_percent() {
        let t = three_point_track();
        let k = t.derived();
        // 5 m up over roughly 135 m
        let expected = 5.0 / (k[0].segment_length * 1000.0) * 100.0;
        assert!(approx_eq(k[0].grade, expected, 1e-9));
        assert!(k[0].grade > 3.0 && k[0].grade < 4.5);
    }

    #[test]
    fn test_lookback_capped_by_point_count() {
        // 100 ms spacing: far more than 10 points fall inside the 3 s window
        let points: Vec<TrackPoint> = (0..30)
            .map(|i| {
                TrackPoint::new(
                    GeoPosition::new(47.0 + i as f64 * 0.00001, 8.0),
                    0.0,
                    t0() + Duration::milliseconds(i * 100),
                )
            })
            .collect();
        assert_eq!(lookback_start(&points, 25, 3_000, 10), 15);
        assert_eq!(lookback_start(&points, 3, 3_000, 10), 0);
        assert_eq!(lookback_start(&points, 0, 3_000, 10), 0);
        assert_eq!(lookback_start(&points, 25, 0, 10), 25);
    }

    #[test]
    fn test_zero_elapsed_time_leaves_speed_zero() {
        let t = Telemetry::new(vec![
            point(0, 47.0, 8.0, 500.0),
            point(0, 47.001, 8.0, 500.0),
            point(0, 47.002, 8.0, 500.0),
        ]);
        assert!(t.derived().iter().all(|k| k.speed == 0.0));
        assert!(t.total_distance() > 0.0);
    }

    #[test]
    fn test_stationary_leaves_grade_zero() {
        let t = Telemetry::new(vec![point(0, 47.0, 8.0, 500.0), point(1, 47.0, 8.0, 500.0), point(2, 47.0, 8.0, 500.0)]);
        assert!(t.derived().iter().all(|k| k.grade == 0.0 && k.speed == 0.0));
    }

    #[test]
    fn test_bearing_due_north() {
        let t = straight_track();
        assert!(approx_eq(t.derived()[0].bearing, 0.0, 1e-6));
    }

    #[test]
    fn test_custom_config() {
        let config = AnalysisConfig { speed_window_ms: 0, grade_window_ms: 0, max_lookback: 10 };
        let t = Telemetry::with_config(straight_track().points().to_vec(), &config);
        let k = t.derived();
        assert!(approx_eq(k[10].speed, k[10].segment_length / (1.0 / 3600.0), 1e-9));
    }

    #[test]
    fn test_boundaries() {
        let t = three_point_track();
        let b = t.boundaries();
        assert_eq!(b.elevation.range(), Some((500.0, 510.0)));
        assert_eq!(b.latitude.range(), Some((47.0, 47.002)));
        assert_eq!(b.speed.count(), 3);
        assert_eq!(b.speed.min(), 0.0);
        assert!(b.cadence.is_empty());
        assert!(b.heart_rate.is_empty());
        for p in t.points() {
            assert!(b.elevation.min() <= p.elevation && p.elevation <= b.elevation.max());
        }
    }

    #[test]
    fn test_channel_boundaries_only_present_values() {
        let hr = |v| SensorChannels { heart_rate: Some(v), ..Default::default() };
        let t = Telemetry::new(vec![
            point(0, 47.0, 8.0, 0.0).with_channels(hr(120.0)),
            point(1, 47.0001, 8.0, 0.0),
            point(2, 47.0002, 8.0, 0.0).with_channels(hr(140.0)),
        ]);
        assert_eq!(t.boundaries().heart_rate.range(), Some((120.0, 140.0)));
        assert_eq!(t.boundaries().heart_rate.count(), 2);
    }

    #[test]
    fn test_center() {
        let t = three_point_track();
        let c = t.center_geo_position();
        assert!(approx_eq(c.latitude, 47.001, 1e-9));
        assert!(approx_eq(c.longitude, 8.001, 1e-9));
    }

    // ---- progress mapping --------------------------------------------------

    #[test]
    fn test_progress_endpoints() {
        let t = three_point_track();
        assert_eq!(t.progress_for_time(t.min_time().unwrap()), 0.0);
        assert_eq!(t.progress_for_time(t.max_time().unwrap()), 100.0);
        assert_eq!(t.progress_for_distance(0.0), 0.0);
        assert_eq!(t.progress_for_distance(t.total_distance()), 100.0);
        assert_eq!(t.progress_for_time(t0() - Duration::seconds(30)), 0.0);
        assert_eq!(t.progress_for_time(t0() + Duration::seconds(30)), 100.0);
        assert_eq!(t.progress_for_distance(99.0), 100.0);
    }

    #[test]
    fn test_progress_clamping() {
        let t = three_point_track();
        assert_eq!(t.time_for_progress(-10.0), t.min_time());
        assert_eq!(t.time_for_progress(250.0), t.max_time());
        assert_eq!(t.distance_for_progress(-1.0), 0.0);
        assert_eq!(t.distance_for_progress(100.0), t.total_distance());
    }

    #[test]
    fn test_progress_round_trip() {
        let t = Telemetry::sample();
        for p in [0.5, 10.0, 33.3, 50.0, 77.7, 99.5] {
            let time = t.time_for_progress(p).unwrap();
            assert!(approx_eq(t.progress_for_time(time), p, 0.01));
            let distance = t.distance_for_progress(p);
            assert!(approx_eq(t.progress_for_distance(distance), p, 1e-9));
        }
    }

    #[test]
    fn test_time_for_progress_is_global_linear() {
        let t = three_point_track();
        assert_eq!(t.time_for_progress(25.0), Some(t0() + Duration::milliseconds(2_500)));
    }

    // ---- search ------------------------------------------------------------

    #[test]
    fn test_bisect() {
        let keys = [0.0, 10.0, 20.0, 30.0, 40.0];
        let key = |i: usize| keys[i];
        assert_eq!(bisect(5, -5.0, &key), 0);
        assert_eq!(bisect(5, 0.0, &key), 0);
        assert_eq!(bisect(5, 15.0, &key), 1);
        assert_eq!(bisect(5, 20.0, &key), 2);
        assert_eq!(bisect(5, 39.9, &key), 3);
        assert_eq!(bisect(5, 40.0, &key), 4);
        assert_eq!(bisect(5, 99.0, &key), 4);
        assert_eq!(bisect(2, 5.0, &key), 0);
    }

    #[test]
    fn test_three_point_scenario() {
        let t = three_point_track();
        let s = t.sonda_for_relative_time(5_000).unwrap();
        let p = t.points();
        let k = t.derived();

        assert!(approx_eq(s.elevation().value, 505.0, 1e-9));
        let expected_distance = distance_3d(&p[0].position, 500.0, &p[1].position, 505.0);
        assert!(approx_eq(s.distance().value, expected_distance, 1e-12));
        assert!(approx_eq(s.elapsed().value, 5_000.0, 1e-9));
        assert_eq!(s.source_index(), Some(1));

        // both segments are nearly identical, so the held speed matches the
        // average over the whole track
        let whole = k[2].cumulative_distance / (10.0 / 3600.0);
        assert!(approx_eq(s.speed().value, whole, 0.01));
    }

    #[test]
    fn test_sonda_between_points() {
        let t = three_point_track();
        let k = t.derived();

        let s = t.sonda_for_absolute_time(t0() + Duration::milliseconds(2_500));
        assert!(approx_eq(s.elevation().value, 502.5, 1e-9));
        assert!(approx_eq(s.distance().value, k[0].segment_length / 2.0, 1e-12));
        assert_eq!(s.time(), t0() + Duration::milliseconds(2_500));
        assert_eq!(s.speed().value, k[0].speed);

        let s = t.sonda_for_absolute_time(t0() + Duration::milliseconds(7_500));
        assert!(approx_eq(s.elevation().value, 507.5, 1e-9));
        assert!(approx_eq(s.position().value.latitude, 47.0015, 1e-9));
        assert_eq!(s.grade().value, k[1].grade);
    }

    #[test]
    fn test_sonda_outside_track_clamps() {
        let t = three_point_track();
        let before = t.sonda_for_absolute_time(t0() - Duration::seconds(60));
        assert!(approx_eq(before.elevation().value, 500.0, 1e-9));
        assert_eq!(before.source_index(), Some(0));

        let after = t.sonda_for_absolute_time(t0() + Duration::seconds(60));
        assert!(approx_eq(after.elevation().value, 510.0, 1e-9));
        assert!(approx_eq(after.distance().value, t.total_distance(), 1e-12));
        assert_eq!(after.source_index(), Some(2));
    }

    #[test]
    fn test_relative_time_extreme_offsets_clamp() {
        let t = three_point_track();
        for offset in [i64::MAX, i64::MAX / 2] {
            let s = t.sonda_for_relative_time(offset).unwrap();
            assert!(approx_eq(s.elevation().value, 510.0, 1e-9));
            assert_eq!(s.time(), t0() + Duration::seconds(10));
            assert_eq!(s.source_index(), Some(2));
        }
        for offset in [i64::MIN + 1, i64::MIN] {
            let s = t.sonda_for_relative_time(offset).unwrap();
            assert!(approx_eq(s.elevation().value, 500.0, 1e-9));
            assert_eq!(s.time(), t0());
            assert_eq!(s.source_index(), Some(0));
        }
    }

    #[test]
    fn test_sonda_at_every_point() {
        let t = Telemetry::sample();
        for (i, p) in t.points().iter().enumerate() {
            let s = t.sonda_for_absolute_time(p.time);
            assert!(approx_eq(s.elevation().value, p.elevation, 1e-9));
            assert!(approx_eq(s.position().value.latitude, p.position.latitude, 1e-9));
            assert!(approx_eq(s.position().value.longitude, p.position.longitude, 1e-9));
            let ix = s.source_index().unwrap();
            assert!(ix + 1 >= i && ix <= i + 1, "point {} resolved to {}", i, ix);
        }
    }

    #[test]
    fn test_sonda_for_distance() {
        let t = three_point_track();
        let k = t.derived();
        let target = k[1].cumulative_distance + k[1].segment_length / 2.0;
        let s = t.sonda_for_distance(target);
        assert!(approx_eq(s.elevation().value, 507.5, 1e-6));
        assert!(approx_eq(s.distance().value, target, 1e-9));
        assert_eq!(s.source_index(), Some(1));
    }

    #[test]
    fn test_sonda_for_position() {
        let t = three_point_track();
        let s = t.sonda_for_position(&GeoPosition::new(47.00102, 8.00099)).unwrap();
        assert_eq!(s.source_index(), Some(1));
        assert!(approx_eq(s.elevation().value, 505.0, 1e-9));

        // endpoints are part of the scan
        let s = t.sonda_for_position(&GeoPosition::new(46.9, 7.9)).unwrap();
        assert_eq!(s.source_index(), Some(0));
    }

    #[test]
    fn test_sonda_for_position_needs_three_points() {
        let t = Telemetry::new(vec![point(0, 47.0, 8.0, 0.0), point(1, 47.001, 8.0, 0.0)]);
        assert!(t.sonda_for_position(&GeoPosition::new(47.0, 8.0)).is_none());
        assert!(!t.sonda_for_absolute_time(t0()).is_empty());
    }

    #[test]
    fn test_sonda_boundaries() {
        let t = Telemetry::sample();
        let s = t.sonda_for_relative_time(60_000).unwrap();
        assert_eq!(s.elevation().boundary, t.boundaries().elevation);
        assert_eq!(s.speed().boundary, t.boundaries().speed);
        assert_eq!(s.elapsed().boundary.range(), Some((0.0, t.duration_millis() as f64)));
        assert_eq!(s.heart_rate().unwrap().boundary, t.boundaries().heart_rate);
        assert!(s.cadence().is_some() && s.power().is_some() && s.temperature().is_some());
    }

    #[test]
    fn test_unordered_timestamps_do_not_panic() {
        let t = Telemetry::new(vec![
            point(10, 47.0, 8.0, 500.0),
            point(0, 47.001, 8.0, 505.0),
            point(5, 47.002, 8.0, 510.0),
            point(5, 47.003, 8.0, 515.0),
        ]);
        assert!(t.total_distance() > 0.0);
        for secs in [-1, 0, 3, 5, 7, 12] {
            let _ = t.sonda_for_absolute_time(t0() + Duration::seconds(secs));
        }
        let _ = t.sonda_for_position(&GeoPosition::new(47.0015, 8.0));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_sonda_serializes() {
        let t = three_point_track();
        let s = t.sonda_for_relative_time(2_500).unwrap();
        let json = serde_json::to_string(&s).unwrap();
        let back: Sonda = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_empty_sonda_serializes() {
        let json = serde_json::to_string(&Sonda::empty()).unwrap();
        let back: Sonda = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Sonda::empty());
        assert!(back.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_boundaries_without_channels_serialize() {
        let t = three_point_track();
        assert!(t.boundaries().heart_rate.is_empty());
        let json = serde_json::to_string(t.boundaries()).unwrap();
        let back: Boundaries = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, t.boundaries());
    }

    // ---- loading -----------------------------------------------------------

    #[test]
    fn test_load_drops_bad_records() {
        let gpx = r#"<gpx version="1.1"><trk><trkseg>
            <trkpt lat="47.000" lon="8.000"><ele>500</ele><time>2023-06-01T10:00:00Z</time></trkpt>
            <trkpt lat="bogus" lon="8.001"><time>2023-06-01T10:00:02Z</time></trkpt>
            <trkpt lat="47.001" lon="8.001"><ele>n/a</ele><time>2023-06-01T10:00:05Z</time></trkpt>
            <trkpt lat="47.002" lon="8.002"><ele>510</ele></trkpt>
            <trkpt lat="47.002" lon="8.002"><ele>510</ele><time>2023-06-01T10:00:10Z</time></trkpt>
        </trkseg></trk></gpx>"#;
        let t = Telemetry::load_str(gpx).unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.points()[1].elevation, 0.0);
        assert_eq!(t.duration_millis(), 10_000);
    }

    #[test]
    fn test_load_malformed_container() {
        assert!(Telemetry::load_str("<gpx><trk></gpx>").is_err());
        assert!(Telemetry::load_or_empty("<gpx><trk></gpx>".as_bytes()).is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Telemetry::load_path("/nonexistent/track.gpx").unwrap_err();
        assert!(matches!(err, TelemetryError::Io(_)));
    }

    #[test]
    fn test_sample_track() {
        let t = Telemetry::sample();
        assert_eq!(t.len(), 200);
        assert!(t.total_distance() > 2.0);
        assert_eq!(t.duration_millis(), 199 * 2_000);
        assert!(!t.boundaries().heart_rate.is_empty());
        assert!(!t.boundaries().power.is_empty());
        assert_eq!(t.line_string().0.len(), 200);
    }
}
