// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Canonical workout representation shared by all file decoders.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum FileType {
    /// Training Center XML (activity → lap → trackpoint)
    Tcx,
    /// GPS Exchange Format (track → segment → point)
    Gpx,
    /// Flexible and Interoperable Data Transfer binary
    Fit,
}

impl FileType {
    pub const ALL: [FileType; 3] = [FileType::Tcx, FileType::Gpx, FileType::Fit];

    /// Wire tag and canonical extension.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Tcx => "tcx",
            FileType::Gpx => "gpx",
            FileType::Fit => "fit",
        }
    }

    /// Match a file extension (without the dot, any case).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == ext)
    }

    /// Match a declared content type. Generic types never resolve a format.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/vnd.garmin.tcx+xml" => Some(FileType::Tcx),
            "application/gpx+xml" => Some(FileType::Gpx),
            "application/vnd.ant.fit" => Some(FileType::Fit),
            _ => None,
        }
    }

    /// Human-readable format name used in decode error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            FileType::Tcx => "TCX",
            FileType::Gpx => "GPX",
            FileType::Fit => "FIT",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sports understood by the training platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Sport {
    Run,
    Bike,
    Swim,
    Walk,
    Hike,
    Row,
    Strength,
    Other,
}

impl Sport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::Run => "run",
            Sport::Bike => "bike",
            Sport::Swim => "swim",
            Sport::Walk => "walk",
            Sport::Hike => "hike",
            Sport::Row => "row",
            Sport::Strength => "strength",
            Sport::Other => "other",
        }
    }

    /// Map the free-form sport labels used by XML formats
    /// ("Running", "Biking", "cycling", "trail_running", ...).
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase().replace(['_', '-', ' '], "");
        let sport = match label.as_str() {
            "run" | "running" | "trailrunning" | "trailrun" | "treadmill" => Sport::Run,
            "bike" | "biking" | "cycling" | "ride" | "roadbiking" | "mountainbiking"
            | "virtualride" => Sport::Bike,
            "swim" | "swimming" | "openwaterswimming" | "lapswimming" => Sport::Swim,
            "walk" | "walking" => Sport::Walk,
            "hike" | "hiking" => Sport::Hike,
            "row" | "rowing" | "indoorrowing" => Sport::Row,
            "strength" | "strengthtraining" | "training" => Sport::Strength,
            "other" => Sport::Other,
            _ => return None,
        };
        Some(sport)
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sport::from_label(s).ok_or_else(|| format!("unknown sport '{}'", s))
    }
}

/// Which FIT summary message supplied the canonical totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalsSource {
    Session,
    Activity,
}

/// Decoder-specific facts kept alongside the canonical fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum FormatDetails {
    Tcx {
        activity_count: usize,
        lap_count: usize,
        trackpoint_count: usize,
        device_name: Option<String>,
    },
    Gpx {
        creator: Option<String>,
        track_count: usize,
        segment_count: usize,
        point_count: usize,
    },
    Fit {
        manufacturer: Option<u16>,
        product: Option<u16>,
        serial_number: Option<u32>,
        session_count: usize,
        lap_count: usize,
        record_count: usize,
        totals_source: TotalsSource,
        skipped_messages: usize,
    },
}

/// Format-independent workout produced by any decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalWorkout {
    pub sport: Sport,
    /// Calendar date (UTC) of the workout start
    pub date: NaiveDate,
    /// Start instant when the file carries one
    pub started_at: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub duration_minutes: f64,
    pub distance_meters: Option<f64>,
    pub source_format: FileType,
    pub metadata: FormatDetails,
}

/// Convert seconds to minutes rounded to hundredths.
pub fn seconds_to_minutes(seconds: f64) -> f64 {
    (seconds / 60.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_extension_is_case_insensitive() {
        assert_eq!(FileType::from_extension("TCX"), Some(FileType::Tcx));
        assert_eq!(FileType::from_extension("gpx"), Some(FileType::Gpx));
        assert_eq!(FileType::from_extension("Fit"), Some(FileType::Fit));
        assert_eq!(FileType::from_extension("bin"), None);
    }

    #[test]
    fn test_file_type_from_content_type() {
        assert_eq!(
            FileType::from_content_type("application/gpx+xml; charset=utf-8"),
            Some(FileType::Gpx)
        );
        assert_eq!(FileType::from_content_type("application/octet-stream"), None);
        assert_eq!(FileType::from_content_type("text/xml"), None);
    }

    #[test]
    fn test_sport_labels() {
        assert_eq!(Sport::from_label("Running"), Some(Sport::Run));
        assert_eq!(Sport::from_label("Biking"), Some(Sport::Bike));
        assert_eq!(Sport::from_label("trail_running"), Some(Sport::Run));
        assert_eq!(Sport::from_label("Other"), Some(Sport::Other));
        assert_eq!(Sport::from_label("quidditch"), None);
    }

    #[test]
    fn test_seconds_to_minutes_rounds_to_hundredths() {
        assert_eq!(seconds_to_minutes(2520.0), 42.0);
        assert_eq!(seconds_to_minutes(61.0), 1.02);
    }

    #[test]
    fn test_format_details_serializes_with_tag() {
        let details = FormatDetails::Gpx {
            creator: None,
            track_count: 1,
            segment_count: 2,
            point_count: 3,
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["format"], "gpx");
        assert_eq!(json["segment_count"], 2);
    }
}
