//! Scrub through a GPS track and print the interpolated telemetry.
//!
//! Run with: cargo run --example scrub_track [path/to/track.gpx]

use track_telemetry::{InputValue, Telemetry};

fn main() {
    let telemetry = match std::env::args().nth(1) {
        Some(path) => match Telemetry::load_path(&path) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("Could not load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => Telemetry::sample(),
    };

    println!("Track Telemetry\n");
    println!(
        "Points: {}, distance: {:.2} km, duration: {}s",
        telemetry.len(),
        telemetry.total_distance(),
        telemetry.duration_millis() / 1000
    );
    let center = telemetry.center_geo_position();
    println!("Center: {:.5}, {:.5}\n", center.latitude, center.longitude);

    println!(" progress |  elapsed |   dist km |  ele m | km/h | grade % | bearing |  hr");
    for step in 0..=10 {
        let progress = step as f64 * 10.0;
        let Some(time) = telemetry.time_for_progress(progress) else {
            println!("   (empty track)");
            break;
        };
        let sonda = telemetry.sonda_for_absolute_time(time);
        if sonda.is_empty() {
            println!("   (not enough points)");
            break;
        }
        println!(
            " {:>7.0}% | {:>7.0}s | {:>9.3} | {:>6.1} | {:>4.1} | {:>7.1} | {:>7.0} | {}",
            progress,
            sonda.elapsed().value / 1000.0,
            sonda.distance().value,
            sonda.elevation().value,
            sonda.speed().value,
            sonda.grade().value,
            sonda.bearing().value,
            gauge(sonda.heart_rate()),
        );
    }

    let start = telemetry.points().first().map(|p| p.position);
    if let Some(sonda) = start.and_then(|p| telemetry.sonda_for_position(&p)) {
        println!("\nNearest to start: point #{:?}", sonda.source_index());
    }
}

/// Value with its position inside the track-wide range.
fn gauge(value: Option<InputValue>) -> String {
    match value {
        Some(v) => format!("{:.0} ({:.0}%)", v.value, v.normalized() * 100.0),
        None => "-".to_string(),
    }
}
