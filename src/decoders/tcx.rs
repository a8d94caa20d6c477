// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Training Center XML decoder.
//!
//! Totals come from the lap summaries the device wrote, not from the
//! trackpoints, so the session matches what the watch reported.

use super::xml::{self, XmlNode};
use super::{DecodeError, DecoderOptions, WorkoutDecoder};
use crate::models::workout::seconds_to_minutes;
use crate::models::{CanonicalWorkout, FileType, FormatDetails, Sport};
use chrono::{DateTime, Utc};

const ROOT: &str = "TrainingCenterDatabase";

pub struct TcxDecoder {
    options: DecoderOptions,
}

impl TcxDecoder {
    pub fn new(options: DecoderOptions) -> Self {
        Self { options }
    }
}

#[derive(Default)]
struct Accumulator {
    activity_count: usize,
    in_activity: bool,
    sport_label: Option<String>,
    id_time: Option<DateTime<Utc>>,
    first_lap_start: Option<DateTime<Utc>>,
    first_trackpoint_time: Option<DateTime<Utc>>,
    notes: Option<String>,
    device_name: Option<String>,
    lap_count: usize,
    trackpoint_count: usize,
    total_seconds: f64,
    total_distance: Option<f64>,
}

impl WorkoutDecoder for TcxDecoder {
    fn file_type(&self) -> FileType {
        FileType::Tcx
    }

    fn decode(&self, bytes: &[u8]) -> Result<CanonicalWorkout, DecodeError> {
        let mut acc = Accumulator::default();

        xml::walk(bytes, FileType::Tcx, ROOT, |node| {
            match node {
                XmlNode::Open(el) => {
                    if el.ends_with(&["Activities", "Activity"]) {
                        acc.activity_count += 1;
                        // Only the first activity in a multi-activity export counts.
                        acc.in_activity = acc.activity_count == 1;
                        if acc.in_activity {
                            acc.sport_label = el.attr("Sport").map(str::to_string);
                        }
                    } else if acc.in_activity && el.ends_with(&["Activity", "Lap"]) {
                        acc.lap_count += 1;
                        if acc.first_lap_start.is_none() {
                            acc.first_lap_start = el.attr("StartTime").and_then(xml::parse_timestamp);
                        }
                    } else if acc.in_activity && el.name() == "Trackpoint" {
                        acc.trackpoint_count += 1;
                    }
                }
                XmlNode::Text(el, text) if acc.in_activity => {
                    if el.ends_with(&["Activity", "Id"]) {
                        acc.id_time = xml::parse_timestamp(text);
                    } else if el.ends_with(&["Activity", "Notes"]) {
                        acc.notes = Some(text.to_string());
                    } else if el.ends_with(&["Activity", "Creator", "Name"]) {
                        acc.device_name = Some(text.to_string());
                    } else if el.ends_with(&["Lap", "TotalTimeSeconds"]) {
                        acc.total_seconds += parse_number(text, "TotalTimeSeconds")?;
                    } else if el.ends_with(&["Lap", "DistanceMeters"]) {
                        let meters = parse_number(text, "DistanceMeters")?;
                        *acc.total_distance.get_or_insert(0.0) += meters;
                    } else if el.ends_with(&["Trackpoint", "Time"])
                        && acc.first_trackpoint_time.is_none()
                    {
                        acc.first_trackpoint_time = xml::parse_timestamp(text);
                    }
                }
                XmlNode::Close(el) => {
                    if el.ends_with(&["Activities", "Activity"]) {
                        acc.in_activity = false;
                    }
                }
                XmlNode::Text(..) => {}
            }
            Ok(())
        })?;

        if acc.activity_count == 0 {
            return Err(DecodeError::missing(FileType::Tcx, "no activities found"));
        }
        if acc.lap_count == 0 {
            return Err(DecodeError::missing(FileType::Tcx, "activity has no laps"));
        }

        let started_at = acc
            .id_time
            .or(acc.first_lap_start)
            .or(acc.first_trackpoint_time)
            .ok_or_else(|| DecodeError::missing(FileType::Tcx, "no start timestamp"))?;

        let sport = acc
            .sport_label
            .as_deref()
            .and_then(Sport::from_label)
            .unwrap_or(self.options.default_sport);

        let title = acc
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        tracing::debug!(
            laps = acc.lap_count,
            trackpoints = acc.trackpoint_count,
            seconds = acc.total_seconds,
            "Decoded TCX activity"
        );

        Ok(CanonicalWorkout {
            sport,
            date: started_at.date_naive(),
            started_at: Some(started_at),
            title,
            duration_minutes: seconds_to_minutes(acc.total_seconds),
            distance_meters: acc.total_distance,
            source_format: FileType::Tcx,
            metadata: FormatDetails::Tcx {
                activity_count: acc.activity_count,
                lap_count: acc.lap_count,
                trackpoint_count: acc.trackpoint_count,
                device_name: acc.device_name,
            },
        })
    }
}

fn parse_number(text: &str, field: &str) -> Result<f64, DecodeError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DecodeError::malformed(FileType::Tcx, format!("invalid {} value", field)))
}
