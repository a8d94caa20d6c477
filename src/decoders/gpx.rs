// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GPS Exchange Format decoder.
//!
//! GPX has no native duration or sport. Duration spans the first to the
//! last timestamped point; distance is the great-circle length of each
//! segment (gaps between segments are not bridged).

use super::xml::{self, XmlNode};
use super::{DecodeError, DecoderOptions, WorkoutDecoder};
use crate::models::workout::seconds_to_minutes;
use crate::models::{CanonicalWorkout, FileType, FormatDetails, Sport};
use chrono::{DateTime, Utc};
use geo::{Distance, Haversine, Point};

const ROOT: &str = "gpx";

pub struct GpxDecoder {
    options: DecoderOptions,
}

impl GpxDecoder {
    pub fn new(options: DecoderOptions) -> Self {
        Self { options }
    }
}

#[derive(Default)]
struct Accumulator {
    creator: Option<String>,
    metadata_name: Option<String>,
    track_name: Option<String>,
    track_type: Option<String>,
    track_count: usize,
    segment_count: usize,
    point_count: usize,
    timed_points: usize,
    first_time: Option<DateTime<Utc>>,
    last_time: Option<DateTime<Utc>>,
    previous: Option<Point<f64>>,
    distance_meters: f64,
}

impl Accumulator {
    fn add_point(&mut self, point: Point<f64>) {
        if let Some(prev) = self.previous {
            self.distance_meters += Haversine.distance(prev, point);
        }
        self.previous = Some(point);
        self.point_count += 1;
    }

    fn add_time(&mut self, time: DateTime<Utc>) {
        if self.first_time.is_none() {
            self.first_time = Some(time);
        }
        self.last_time = Some(time);
        self.timed_points += 1;
    }
}

impl WorkoutDecoder for GpxDecoder {
    fn file_type(&self) -> FileType {
        FileType::Gpx
    }

    fn decode(&self, bytes: &[u8]) -> Result<CanonicalWorkout, DecodeError> {
        let mut acc = Accumulator::default();

        xml::walk(bytes, FileType::Gpx, ROOT, |node| {
            match node {
                XmlNode::Open(el) if el.depth() == 1 => {
                    acc.creator = el.attr("creator").map(str::to_string);
                }
                XmlNode::Open(el) => match el.name() {
                    "trk" => acc.track_count += 1,
                    "trkseg" => {
                        acc.segment_count += 1;
                        acc.previous = None;
                    }
                    "trkpt" => {
                        let lat = coordinate(el.attr("lat"), "lat", 90.0)?;
                        let lon = coordinate(el.attr("lon"), "lon", 180.0)?;
                        acc.add_point(Point::new(lon, lat));
                    }
                    _ => {}
                },
                XmlNode::Text(el, text) => {
                    if el.ends_with(&["trkpt", "time"]) {
                        let time = xml::parse_timestamp(text).ok_or_else(|| {
                            DecodeError::malformed(FileType::Gpx, "invalid point timestamp")
                        })?;
                        acc.add_time(time);
                    } else if el.ends_with(&["trk", "name"]) && acc.track_name.is_none() {
                        acc.track_name = Some(text.to_string());
                    } else if el.ends_with(&["trk", "type"]) && acc.track_type.is_none() {
                        acc.track_type = Some(text.to_string());
                    } else if el.ends_with(&["metadata", "name"]) {
                        acc.metadata_name = Some(text.to_string());
                    }
                }
                XmlNode::Close(_) => {}
            }
            Ok(())
        })?;

        if acc.point_count == 0 {
            return Err(DecodeError::missing(FileType::Gpx, "no track points"));
        }
        let (first, last) = match (acc.first_time, acc.last_time) {
            (Some(first), Some(last)) if acc.timed_points >= 2 => (first, last),
            _ => {
                return Err(DecodeError::missing(
                    FileType::Gpx,
                    "fewer than two timestamped track points",
                ))
            }
        };

        let elapsed_seconds = (last - first).num_milliseconds() as f64 / 1000.0;
        let sport = acc
            .track_type
            .as_deref()
            .and_then(Sport::from_label)
            .unwrap_or(self.options.default_sport);

        tracing::debug!(
            points = acc.point_count,
            segments = acc.segment_count,
            seconds = elapsed_seconds,
            meters = acc.distance_meters,
            "Decoded GPX track"
        );

        Ok(CanonicalWorkout {
            sport,
            date: first.date_naive(),
            started_at: Some(first),
            title: acc.track_name.or(acc.metadata_name),
            duration_minutes: seconds_to_minutes(elapsed_seconds),
            distance_meters: Some((acc.distance_meters * 10.0).round() / 10.0),
            source_format: FileType::Gpx,
            metadata: FormatDetails::Gpx {
                creator: acc.creator,
                track_count: acc.track_count,
                segment_count: acc.segment_count,
                point_count: acc.point_count,
            },
        })
    }
}

fn coordinate(value: Option<&str>, name: &str, limit: f64) -> Result<f64, DecodeError> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && v.abs() <= limit)
        .ok_or_else(|| {
            DecodeError::malformed(FileType::Gpx, format!("track point has invalid {}", name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    // One degree of latitude is ~111.2 km on the haversine sphere.
    const TRACK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="StravaGPX" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata><name>Meta name</name><time>2025-05-10T06:00:00Z</time></metadata>
  <trk>
    <name>Sunrise loop</name>
    <type>cycling</type>
    <trkseg>
      <trkpt lat="37.000" lon="-122.000"><ele>10</ele><time>2025-05-10T06:00:00Z</time></trkpt>
      <trkpt lat="37.010" lon="-122.000"><time>2025-05-10T06:10:00Z</time></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="38.000" lon="-122.000"><time>2025-05-10T06:20:00Z</time></trkpt>
      <trkpt lat="38.010" lon="-122.000"><time>2025-05-10T06:45:30Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    fn decode(doc: &str) -> Result<CanonicalWorkout, DecodeError> {
        GpxDecoder::new(DecoderOptions::default()).decode(doc.as_bytes())
    }

    #[test]
    fn test_duration_spans_first_to_last_point() {
        let workout = decode(TRACK).unwrap();
        assert_eq!(workout.duration_minutes, 45.5);
        assert_eq!(workout.sport, Sport::Bike);
        assert_eq!(workout.title.as_deref(), Some("Sunrise loop"));
        assert_eq!(workout.date.to_string(), "2025-05-10");
    }

    #[test]
    fn test_distance_does_not_bridge_segments() {
        let workout = decode(TRACK).unwrap();
        let meters = workout.distance_meters.unwrap();
        // Two 0.01° hops (~1.11 km each); the 1° gap between segments is ignored.
        assert!((meters - 2224.0).abs() < 5.0, "got {}", meters);
        assert_eq!(
            workout.metadata,
            FormatDetails::Gpx {
                creator: Some("StravaGPX".to_string()),
                track_count: 1,
                segment_count: 2,
                point_count: 4,
            }
        );
    }

    #[test]
    fn test_missing_type_uses_configured_sport() {
        let doc = TRACK.replace("<type>cycling</type>", "");
        let options = DecoderOptions {
            default_sport: Sport::Walk,
        };
        let workout = GpxDecoder::new(options).decode(doc.as_bytes()).unwrap();
        assert_eq!(workout.sport, Sport::Walk);
    }

    #[test]
    fn test_single_timestamp_is_missing_data() {
        let doc = r#"<gpx><trk><trkseg>
            <trkpt lat="1" lon="1"><time>2025-05-10T06:00:00Z</time></trkpt>
            <trkpt lat="1.1" lon="1"></trkpt>
            </trkseg></trk></gpx>"#;
        let err = decode(doc).unwrap_err();
        assert!(matches!(err, DecodeError::MissingData { .. }));
    }

    #[test]
    fn test_no_points_is_missing_data() {
        let err = decode("<gpx><trk><trkseg/></trk></gpx>").unwrap_err();
        assert_eq!(
            err.to_string(),
            "GPX file contains no workout data: no track points"
        );
    }

    #[test]
    fn test_out_of_range_latitude_is_malformed() {
        let doc = TRACK.replace(r#"lat="37.000""#, r#"lat="97.000""#);
        let err = decode(&doc).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn test_metadata_name_used_when_track_unnamed() {
        let doc = TRACK.replace("<name>Sunrise loop</name>", "");
        let workout = decode(&doc).unwrap();
        assert_eq!(workout.title.as_deref(), Some("Meta name"));
    }

    #[test]
    fn test_date_comes_from_points_not_metadata() {
        let doc = TRACK.replace(
            "<metadata><name>Meta name</name><time>2025-05-10T06:00:00Z</time>",
            "<metadata><name>Meta name</name><time>exported later</time>",
        );
        let workout = decode(&doc).unwrap();
        assert_eq!(workout.date.to_string(), "2025-05-10");
    }
}
