//! Interpolated telemetry snapshots.
//!
//! A [`Sonda`] is what every point query of [`Telemetry`] returns: the value of
//! each metric at the query point, paired with the metric's global boundary so a
//! gauge can place the value without looking at the rest of the track.

use chrono::{DateTime, Duration, Utc};

use crate::{GeoPosition, MinMax, Telemetry};

/// A metric value paired with its track-wide boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputValue {
    pub value: f64,
    pub boundary: MinMax,
}

impl InputValue {
    pub fn new(value: f64, boundary: MinMax) -> Self {
        Self { value, boundary }
    }

    /// Position of the value inside its boundary, 0.0-1.0.
    pub fn normalized(&self) -> f64 {
        self.boundary.normalize(self.value)
    }
}

/// A position paired with the track's latitude and longitude boundaries.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoInputValue {
    pub value: GeoPosition,
    pub latitude: MinMax,
    pub longitude: MinMax,
}

/// Snapshot of all metrics at one point of the track.
///
/// Built only by the [`Telemetry`] queries or as the [`empty`](Sonda::empty)
/// sentinel, and never changed afterwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sonda {
    time: DateTime<Utc>,
    elapsed: InputValue,
    elevation: InputValue,
    grade: InputValue,
    distance: InputValue,
    speed: InputValue,
    bearing: InputValue,
    position: GeoInputValue,
    cadence: Option<InputValue>,
    heart_rate: Option<InputValue>,
    power: Option<InputValue>,
    temperature: Option<InputValue>,
    source_index: Option<usize>,
}

impl Sonda {
    /// The "no result" sentinel returned for degenerate tracks.
    pub fn empty() -> Self {
        let zero = InputValue::new(0.0, MinMax::extreme());
        Self {
            time: DateTime::<Utc>::default(),
            elapsed: zero,
            elevation: zero,
            grade: zero,
            distance: zero,
            speed: zero,
            bearing: zero,
            position: GeoInputValue {
                value: GeoPosition::default(),
                latitude: MinMax::extreme(),
                longitude: MinMax::extreme(),
            },
            cadence: None,
            heart_rate: None,
            power: None,
            temperature: None,
            source_index: None,
        }
    }

    /// Interpolate between `track[left]` and `track[right]` at `progress` (0-100).
    ///
    /// Speed, bearing and grade hold the left point's values. Distance advances
    /// only along the left point's own segment. Sensor channels are blended only
    /// when both ends carry them.
    pub(crate) fn interpolate(
        track: &Telemetry,
        left: usize,
        right: usize,
        progress: f64,
        source_index: usize,
    ) -> Self {
        let points = track.points();
        let (a, b) = (&points[left], &points[right]);
        let ka = &track.derived()[left];
        let bounds = track.boundaries();

        let start_ms = points.first().map(|p| p.millis()).unwrap_or_default();
        let millis = lerp(a.millis() as f64, b.millis() as f64, progress).round() as i64;
        let time = a.time + Duration::milliseconds(millis - a.millis());

        let position = GeoPosition::new(
            lerp(a.position.latitude, b.position.latitude, progress),
            lerp(a.position.longitude, b.position.longitude, progress),
        );

        let blend = |x: Option<f64>, y: Option<f64>, boundary: MinMax| match (x, y) {
            (Some(x), Some(y)) => Some(InputValue::new(lerp(x, y, progress), boundary)),
            _ => None,
        };

        Self {
            time,
            elapsed: InputValue::new(
                (millis - start_ms) as f64,
                MinMax::spanning(0.0, track.duration_millis() as f64),
            ),
            elevation: InputValue::new(lerp(a.elevation, b.elevation, progress), bounds.elevation),
            grade: InputValue::new(ka.grade, bounds.grade),
            distance: InputValue::new(
                ka.cumulative_distance + progress / 100.0 * ka.segment_length,
                MinMax::spanning(0.0, track.total_distance()),
            ),
            speed: InputValue::new(ka.speed, bounds.speed),
            bearing: InputValue::new(ka.bearing, bounds.bearing),
            position: GeoInputValue {
                value: position,
                latitude: bounds.latitude,
                longitude: bounds.longitude,
            },
            cadence: blend(a.channels.cadence, b.channels.cadence, bounds.cadence),
            heart_rate: blend(a.channels.heart_rate, b.channels.heart_rate, bounds.heart_rate),
            power: blend(a.channels.power, b.channels.power, bounds.power),
            temperature: blend(a.channels.temperature, b.channels.temperature, bounds.temperature),
            source_index: Some(source_index),
        }
    }

    /// True for the "no result" sentinel.
    pub fn is_empty(&self) -> bool {
        self.source_index.is_none()
    }

    /// Index of the track point the search settled on.
    pub fn source_index(&self) -> Option<usize> {
        self.source_index
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Milliseconds since the start of the track, bounded by `[0, duration]`.
    pub fn elapsed(&self) -> InputValue {
        self.elapsed
    }

    /// Meters.
    pub fn elevation(&self) -> InputValue {
        self.elevation
    }

    /// Percent.
    pub fn grade(&self) -> InputValue {
        self.grade
    }

    /// Kilometers from the start, bounded by `[0, total distance]`.
    pub fn distance(&self) -> InputValue {
        self.distance
    }

    /// km/h.
    pub fn speed(&self) -> InputValue {
        self.speed
    }

    /// Degrees.
    pub fn bearing(&self) -> InputValue {
        self.bearing
    }

    pub fn position(&self) -> GeoInputValue {
        self.position
    }

    pub fn cadence(&self) -> Option<InputValue> {
        self.cadence
    }

    pub fn heart_rate(&self) -> Option<InputValue> {
        self.heart_rate
    }

    pub fn power(&self) -> Option<InputValue> {
        self.power
    }

    pub fn temperature(&self) -> Option<InputValue> {
        self.temperature
    }
}

/// Linear blend of `a` toward `b` at `progress` percent.
#[inline]
fn lerp(a: f64, b: f64, progress: f64) -> f64 {
    a + (b - a) * progress / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SensorChannels, TrackPoint};
    use chrono::TimeZone;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn point(secs: i64, lat: f64, lon: f64, ele: f64, channels: SensorChannels) -> TrackPoint {
        let t0 = Utc.with_ymd_and_hms(2023, 6, 1, 10, 0, 0).unwrap();
        TrackPoint::new(GeoPosition::new(lat, lon), ele, t0 + Duration::seconds(secs)).with_channels(channels)
    }

    fn pair() -> Telemetry {
        let hr_only = SensorChannels { heart_rate: Some(100.0), cadence: Some(80.0), ..Default::default() };
        let hr_power = SensorChannels { heart_rate: Some(120.0), power: Some(200.0), ..Default::default() };
        Telemetry::new(vec![
            point(0, 47.0, 8.0, 500.0, hr_only),
            point(10, 47.001, 8.001, 520.0, hr_power),
        ])
    }

    #[test]
    fn test_empty_sentinel() {
        let s = Sonda::empty();
        assert!(s.is_empty());
        assert_eq!(s.source_index(), None);
        assert!(s.cadence().is_none());
        assert!(s.elevation().boundary.is_empty());
    }

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(10.0, 20.0, 0.0), 10.0);
        assert_eq!(lerp(10.0, 20.0, 100.0), 20.0);
        assert!(approx_eq(lerp(10.0, 20.0, 25.0), 12.5, 1e-12));
    }

    #[test]
    fn test_interpolate_midpoint() {
        let track = pair();
        let s = Sonda::interpolate(&track, 0, 1, 50.0, 0);

        assert!(!s.is_empty());
        assert_eq!(s.source_index(), Some(0));
        assert!(approx_eq(s.elevation().value, 510.0, 1e-9));
        assert!(approx_eq(s.position().value.latitude, 47.0005, 1e-9));
        assert!(approx_eq(s.position().value.longitude, 8.0005, 1e-9));
        assert!(approx_eq(s.elapsed().value, 5_000.0, 1e-9));
        assert_eq!(s.elapsed().boundary.range(), Some((0.0, 10_000.0)));
        assert_eq!(s.time(), track.points()[0].time + Duration::seconds(5));
    }

    #[test]
    fn test_interpolate_holds_left_kinematics() {
        let track = pair();
        let left = *track.kinematics(0).unwrap();
        let s = Sonda::interpolate(&track, 0, 1, 50.0, 0);
        assert_eq!(s.speed().value, left.speed);
        assert_eq!(s.bearing().value, left.bearing);
        assert_eq!(s.grade().value, left.grade);
        assert!(approx_eq(s.distance().value, left.segment_length / 2.0, 1e-12));
    }

    #[test]
    fn test_channels_need_both_ends() {
        let track = pair();
        let s = Sonda::interpolate(&track, 0, 1, 50.0, 0);
        assert!(approx_eq(s.heart_rate().unwrap().value, 110.0, 1e-9));
        assert!(s.cadence().is_none());
        assert!(s.power().is_none());
        assert!(s.temperature().is_none());
    }

    #[test]
    fn test_values_carry_boundaries() {
        let track = pair();
        let s = Sonda::interpolate(&track, 0, 1, 0.0, 0);
        assert_eq!(s.elevation().boundary.range(), Some((500.0, 520.0)));
        assert_eq!(s.heart_rate().unwrap().boundary.range(), Some((100.0, 120.0)));
        assert!(approx_eq(s.elevation().normalized(), 0.0, 1e-12));
    }
}
