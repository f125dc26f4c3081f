//! Sensor channels from a track point's `<extensions>` block.
//!
//! Devices write sensor data under vendor namespaces (Garmin's
//! `TrackPointExtension`, Strava's bare `<power>`, ...). The decoder hands every
//! leaf element found inside `<extensions>` to [`apply_element`], which matches
//! on the local name only, so namespace prefixes do not matter.
//!
//! | Channel | Recognized local names |
//! |---------|------------------------|
//! | cadence | `cad`, `cadence`, `RunCadence` |
//! | heart rate | `hr`, `heartrate`, `HeartRateBpm` |
//! | power | `power`, `watts`, `PowerInWatts` |
//! | temperature | `atemp`, `temp`, `temperature` |

use crate::SensorChannels;

/// Which channel an element feeds, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Cadence,
    HeartRate,
    Power,
    Temperature,
}

fn channel_for(local_name: &str) -> Option<Channel> {
    match local_name.to_ascii_lowercase().as_str() {
        "cad" | "cadence" | "runcadence" => Some(Channel::Cadence),
        "hr" | "heartrate" | "heartratebpm" => Some(Channel::HeartRate),
        "power" | "watts" | "powerinwatts" => Some(Channel::Power),
        "atemp" | "temp" | "temperature" => Some(Channel::Temperature),
        _ => None,
    }
}

/// Fold one extension leaf element into `channels`.
///
/// Unknown element names are ignored. A value that does not parse as a finite
/// number leaves the channel absent rather than failing the point. The first
/// value seen for a channel wins.
///
/// # Example
/// ```
/// use track_telemetry::{SensorChannels, extensions};
///
/// let mut channels = SensorChannels::default();
/// extensions::apply_element(&mut channels, "hr", "142");
/// extensions::apply_element(&mut channels, "cad", "n/a");
///
/// assert_eq!(channels.heart_rate, Some(142.0));
/// assert_eq!(channels.cadence, None);
/// ```
pub fn apply_element(channels: &mut SensorChannels, local_name: &str, text: &str) {
    let Some(channel) = channel_for(local_name) else {
        return;
    };
    let Some(value) = text.trim().parse::<f64>().ok().filter(|v| v.is_finite()) else {
        return;
    };

    let slot = match channel {
        Channel::Cadence => &mut channels.cadence,
        Channel::HeartRate => &mut channels.heart_rate,
        Channel::Power => &mut channels.power,
        Channel::Temperature => &mut channels.temperature,
    };
    if slot.is_none() {
        *slot = Some(value);
    }
}
