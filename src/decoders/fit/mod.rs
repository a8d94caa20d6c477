// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FIT (binary device file) decoder.
//!
//! Totals come from the highest-level summary available: the `session`
//! message(s) when present, otherwise the `activity` message. Laps are
//! counted for metadata only and never contribute to the totals.

pub mod crc;
pub mod profile;
mod reader;

use super::{DecodeError, DecoderOptions, WorkoutDecoder};
use crate::models::workout::seconds_to_minutes;
use crate::models::{CanonicalWorkout, FileType, FormatDetails, TotalsSource};
use chrono::{DateTime, Utc};
use profile::{field, mesg};
use reader::Message;

/// Message types the decoder reads; everything else is skipped.
const WANTED: &[u16] = &[
    mesg::FILE_ID,
    mesg::SPORT,
    mesg::SESSION,
    mesg::LAP,
    mesg::RECORD,
    mesg::ACTIVITY,
];

pub struct FitDecoder {
    options: DecoderOptions,
}

impl FitDecoder {
    pub fn new(options: DecoderOptions) -> Self {
        Self { options }
    }
}

struct Totals {
    seconds: f64,
    meters: Option<f64>,
    source: TotalsSource,
}

impl WorkoutDecoder for FitDecoder {
    fn file_type(&self) -> FileType {
        FileType::Fit
    }

    fn decode(&self, bytes: &[u8]) -> Result<CanonicalWorkout, DecodeError> {
        let (header, data) = reader::read_header(bytes)?;
        let index = reader::index_records(data)?;
        let decoded = reader::decode_messages(data, &index, WANTED);

        let of_type = |global: u16| decoded.messages.iter().filter(move |m| m.global == global);

        let file_id = of_type(mesg::FILE_ID).next();
        if let Some(file_type) = file_id.and_then(|m| m.unsigned(field::file_id::TYPE)) {
            if file_type != profile::FILE_TYPE_ACTIVITY {
                return Err(DecodeError::missing(
                    FileType::Fit,
                    format!("file type {} is not an activity", file_type),
                ));
            }
        }

        let sessions: Vec<&Message> = of_type(mesg::SESSION).collect();
        let activity = of_type(mesg::ACTIVITY).next();
        let records: Vec<&Message> = of_type(mesg::RECORD).collect();
        let lap_count = of_type(mesg::LAP).count();

        let totals = if !sessions.is_empty() {
            session_totals(&sessions)?
        } else if let Some(activity) = activity {
            activity_totals(activity, &records)?
        } else {
            return Err(DecodeError::missing(
                FileType::Fit,
                "no session or activity summary message",
            ));
        };

        let started_at = start_time(&sessions, &records, activity, file_id).ok_or_else(|| {
            DecodeError::missing(FileType::Fit, "no timestamp to date the workout")
        })?;

        let sport = sessions
            .first()
            .and_then(|s| s.unsigned(field::summary::SPORT))
            .or_else(|| of_type(mesg::SPORT).find_map(|m| m.unsigned(field::sport::SPORT)))
            .and_then(profile::sport_from_code)
            .unwrap_or(self.options.default_sport);

        tracing::debug!(
            protocol = header.protocol_version,
            profile = header.profile_version,
            messages = decoded.messages.len(),
            skipped = decoded.skipped,
            sessions = sessions.len(),
            laps = lap_count,
            "Decoded FIT file"
        );

        Ok(CanonicalWorkout {
            sport,
            date: started_at.date_naive(),
            started_at: Some(started_at),
            title: None,
            duration_minutes: seconds_to_minutes(totals.seconds),
            distance_meters: totals.meters,
            source_format: FileType::Fit,
            metadata: FormatDetails::Fit {
                manufacturer: file_id
                    .and_then(|m| m.unsigned(field::file_id::MANUFACTURER))
                    .and_then(|v| u16::try_from(v).ok()),
                product: file_id
                    .and_then(|m| m.unsigned(field::file_id::PRODUCT))
                    .and_then(|v| u16::try_from(v).ok()),
                serial_number: file_id
                    .and_then(|m| m.unsigned(field::file_id::SERIAL_NUMBER))
                    .and_then(|v| u32::try_from(v).ok()),
                session_count: sessions.len(),
                lap_count,
                record_count: records.len(),
                totals_source: totals.source,
                skipped_messages: decoded.skipped,
            },
        })
    }
}

/// Sum over all sessions (multisport files carry one per leg).
fn session_totals(sessions: &[&Message]) -> Result<Totals, DecodeError> {
    let mut seconds = 0.0;
    let mut meters: Option<f64> = None;

    for session in sessions {
        let time = session
            .unsigned(field::summary::TOTAL_TIMER_TIME)
            .or_else(|| session.unsigned(field::summary::TOTAL_ELAPSED_TIME))
            .ok_or_else(|| {
                DecodeError::missing(FileType::Fit, "session message has no total time")
            })?;
        seconds += time as f64 / profile::TIME_SCALE;

        if let Some(distance) = session.unsigned(field::summary::TOTAL_DISTANCE) {
            *meters.get_or_insert(0.0) += distance as f64 / profile::DISTANCE_SCALE;
        }
    }

    Ok(Totals {
        seconds,
        meters,
        source: TotalsSource::Session,
    })
}

/// The activity message has no distance; use the furthest cumulative
/// record distance instead.
fn activity_totals(activity: &Message, records: &[&Message]) -> Result<Totals, DecodeError> {
    let time = activity
        .unsigned(field::activity::TOTAL_TIMER_TIME)
        .ok_or_else(|| {
            DecodeError::missing(FileType::Fit, "activity message has no total timer time")
        })?;

    let meters = records
        .iter()
        .filter_map(|r| r.unsigned(field::record::DISTANCE))
        .max()
        .map(|d| d as f64 / profile::DISTANCE_SCALE);

    Ok(Totals {
        seconds: time as f64 / profile::TIME_SCALE,
        meters,
        source: TotalsSource::Activity,
    })
}

fn start_time(
    sessions: &[&Message],
    records: &[&Message],
    activity: Option<&Message>,
    file_id: Option<&Message>,
) -> Option<DateTime<Utc>> {
    sessions
        .iter()
        .filter_map(|s| s.unsigned(field::summary::START_TIME))
        .min()
        .or_else(|| records.iter().find_map(|r| r.timestamp.map(u64::from)))
        .or_else(|| activity.and_then(|a| a.timestamp.map(u64::from)))
        .or_else(|| file_id.and_then(|f| f.unsigned(field::file_id::TIME_CREATED)))
        .and_then(profile::to_datetime)
}
