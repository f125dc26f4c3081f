//! Running min/max/mean accumulator for one telemetry channel.
//!
//! Every metric of a [`Telemetry`](crate::Telemetry) keeps one [`MinMax`] so that
//! gauges can normalize an interpolated value against the whole track.

/// Running boundary of one numeric channel.
///
/// Starts in the [`extreme`](MinMax::extreme) state (`min = +inf`, `max = -inf`)
/// so that the first [`sample`](MinMax::sample) initializes both ends.
///
/// # Example
/// ```
/// use track_telemetry::MinMax;
///
/// let mut speed = MinMax::extreme();
/// speed.sample(12.0);
/// speed.sample(30.0);
/// speed.sample(21.0);
///
/// assert_eq!(speed.range(), Some((12.0, 30.0)));
/// assert_eq!(speed.mean(), Some(21.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "MinMaxRepr", into = "MinMaxRepr")
)]
pub struct MinMax {
    min: f64,
    max: f64,
    sum: f64,
    count: u64,
}

/// Wire form of [`MinMax`]. The empty state has no range instead of the
/// infinite sentinels, which JSON cannot carry.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct MinMaxRepr {
    range: Option<(f64, f64)>,
    sum: f64,
    count: u64,
}

#[cfg(feature = "serde")]
impl From<MinMax> for MinMaxRepr {
    fn from(m: MinMax) -> Self {
        Self {
            range: m.range(),
            sum: m.sum,
            count: m.count,
        }
    }
}

#[cfg(feature = "serde")]
impl From<MinMaxRepr> for MinMax {
    fn from(repr: MinMaxRepr) -> Self {
        match repr.range {
            Some((min, max)) if repr.count > 0 => Self {
                min,
                max,
                sum: repr.sum,
                count: repr.count,
            },
            _ => Self::extreme(),
        }
    }
}

impl Default for MinMax {
    fn default() -> Self {
        Self::extreme()
    }
}

impl MinMax {
    /// Neutral starting state: nothing sampled yet.
    pub const fn extreme() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }

    /// Boundary spanning exactly `[min, max]`, counted as two samples.
    pub fn spanning(min: f64, max: f64) -> Self {
        let mut boundary = Self::extreme();
        boundary.sample(min);
        boundary.sample(max);
        boundary
    }

    /// Fold one value into the boundary.
    pub fn sample(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    /// Smallest value seen (`+inf` before the first sample).
    #[inline]
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest value seen (`-inf` before the first sample).
    #[inline]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Arithmetic mean of all samples, `None` if nothing was sampled.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    /// Number of samples folded in.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// `(min, max)` for display normalization, `None` if nothing was sampled.
    pub fn range(&self) -> Option<(f64, f64)> {
        if self.is_empty() {
            None
        } else {
            Some((self.min, self.max))
        }
    }

    /// Position of `value` inside the boundary as a 0.0-1.0 fraction.
    ///
    /// Values outside the range are clamped. A degenerate boundary (empty, or
    /// `min == max`) yields 0.0.
    pub fn normalize(&self, value: f64) -> f64 {
        match self.range() {
            Some((min, max)) if max > min => ((value - min) / (max - min)).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}
