//! GPX decoding into raw track records.
//!
//! Streams the document with quick-xml and collects one [`TrackRecord`] per
//! `<trkpt>` found under `<trk>/<trkseg>`. Values are kept as text; turning a
//! record into a [`TrackPoint`](crate::TrackPoint) (and dropping bad ones) is
//! the caller's job.

use std::io::BufRead;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Result, TelemetryError};
use crate::{extensions, SensorChannels};

/// Demo track bundled with the crate, used by [`Telemetry::sample`](crate::Telemetry::sample).
pub const SAMPLE_GPX: &str = include_str!("../resources/sample.gpx");

/// One `<trkpt>` as found in the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackRecord {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub elevation: Option<String>,
    pub time: Option<String>,
    pub channels: SensorChannels,
}

/// Decode all track point records from a GPX string.
pub fn read_records_str(xml: &str) -> Result<Vec<TrackRecord>> {
    read_records(xml.as_bytes())
}

/// Decode all track point records from a GPX stream.
///
/// # Errors
///
/// Returns an error if the source cannot be read, the XML is malformed, or the
/// root element is not `<gpx>`. Individual records are never validated here.
pub fn read_records<R: BufRead>(source: R) -> Result<Vec<TrackRecord>> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut current: Option<TrackRecord> = None;
    let mut records = Vec::new();
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let name = local_name(e);
                if path.is_empty() {
                    check_root(&name)?;
                    saw_root = true;
                }
                if name == "trkpt" && in_segment(&path) {
                    current = Some(record_from_attributes(e));
                }
                path.push(name);
                text.clear();
            }
            Event::Empty(ref e) => {
                let name = local_name(e);
                if path.is_empty() {
                    check_root(&name)?;
                    saw_root = true;
                }
                if name == "trkpt" && in_segment(&path) {
                    records.push(record_from_attributes(e));
                }
            }
            Event::Text(ref t) => {
                if current.is_some() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                let name = path.pop().unwrap_or_default();
                if name == "trkpt" {
                    if let Some(record) = current.take() {
                        records.push(record);
                    }
                } else if let Some(record) = current.as_mut() {
                    if path.iter().any(|p| p == "extensions") {
                        extensions::apply_element(&mut record.channels, &name, &text);
                    } else if path.last().map(String::as_str) == Some("trkpt") {
                        match name.as_str() {
                            "ele" => record.elevation = Some(text.clone()),
                            "time" => record.time = Some(text.clone()),
                            _ => {}
                        }
                    }
                }
                text.clear();
            }
            Event::Eof => {
                if let Some(open) = path.last() {
                    return Err(TelemetryError::Xml(format!(
                        "unexpected end of document inside <{}>",
                        open
                    )));
                }
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(TelemetryError::MissingRoot);
    }
    debug!("[Gpx] Decoded {} track point records", records.len());
    Ok(records)
}

fn check_root(name: &str) -> Result<()> {
    if name == "gpx" {
        Ok(())
    } else {
        Err(TelemetryError::MissingRoot)
    }
}

/// True when the open elements end in `trk/trkseg`.
fn in_segment(path: &[String]) -> bool {
    matches!(path, [.., trk, seg] if trk == "trk" && seg == "trkseg")
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn get_attribute_opt(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name.as_bytes())
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn record_from_attributes(e: &BytesStart) -> TrackRecord {
    TrackRecord {
        latitude: get_attribute_opt(e, "lat"),
        longitude: get_attribute_opt(e, "lon"),
        ..TrackRecord::default()
    }
}
