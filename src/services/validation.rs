// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Domain checks on a decoded workout.

use crate::models::CanonicalWorkout;
use chrono::{DateTime, Days, NaiveDate, Utc};

/// Longest plausible single workout.
const MAX_DURATION_MINUTES: f64 = 48.0 * 60.0;

/// Earliest plausible workout date (predates consumer GPS devices).
fn earliest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// A decoded workout that fails a domain invariant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkoutValidationError {
    #[error("duration must be positive (got {0} minutes)")]
    NonPositiveDuration(f64),

    #[error("duration of {0} minutes exceeds the 48 hour limit")]
    DurationTooLong(f64),

    #[error("distance must be a non-negative number (got {0})")]
    InvalidDistance(f64),

    #[error("workout date {0} is before 1990-01-01")]
    DateTooEarly(NaiveDate),

    #[error("workout date {0} is in the future")]
    DateInFuture(NaiveDate),
}

/// Check a decoded workout against domain invariants.
///
/// `now` anchors the future-date check; one day of slack absorbs timezone
/// differences between the device and the server.
pub fn validate_workout(
    workout: &CanonicalWorkout,
    now: DateTime<Utc>,
) -> Result<(), WorkoutValidationError> {
    let duration = workout.duration_minutes;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(WorkoutValidationError::NonPositiveDuration(duration));
    }
    if duration > MAX_DURATION_MINUTES {
        return Err(WorkoutValidationError::DurationTooLong(duration));
    }

    if let Some(distance) = workout.distance_meters {
        if !distance.is_finite() || distance < 0.0 {
            return Err(WorkoutValidationError::InvalidDistance(distance));
        }
    }

    if workout.date < earliest_date() {
        return Err(WorkoutValidationError::DateTooEarly(workout.date));
    }
    let latest = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap_or(NaiveDate::MAX);
    if workout.date > latest {
        return Err(WorkoutValidationError::DateInFuture(workout.date));
    }

    Ok(())
}
