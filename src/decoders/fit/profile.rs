// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The subset of the FIT global profile the decoder understands.

use crate::models::Sport;
use chrono::{DateTime, Utc};

/// Seconds between the Unix epoch and the FIT epoch (1989-12-31T00:00:00Z).
pub const FIT_EPOCH_OFFSET: i64 = 631_065_600;

/// Global message numbers.
pub mod mesg {
    pub const FILE_ID: u16 = 0;
    pub const SPORT: u16 = 12;
    pub const SESSION: u16 = 18;
    pub const LAP: u16 = 19;
    pub const RECORD: u16 = 20;
    pub const ACTIVITY: u16 = 34;
}

/// Field numbers, per message.
pub mod field {
    pub const TIMESTAMP: u8 = 253;

    pub mod file_id {
        pub const TYPE: u8 = 0;
        pub const MANUFACTURER: u8 = 1;
        pub const PRODUCT: u8 = 2;
        pub const SERIAL_NUMBER: u8 = 3;
        pub const TIME_CREATED: u8 = 4;
    }

    pub mod sport {
        pub const SPORT: u8 = 0;
    }

    /// Shared by session and lap messages.
    pub mod summary {
        pub const START_TIME: u8 = 2;
        pub const SPORT: u8 = 5;
        pub const TOTAL_ELAPSED_TIME: u8 = 7;
        pub const TOTAL_TIMER_TIME: u8 = 8;
        pub const TOTAL_DISTANCE: u8 = 9;
    }

    pub mod record {
        pub const DISTANCE: u8 = 5;
    }

    pub mod activity {
        pub const TOTAL_TIMER_TIME: u8 = 0;
    }
}

/// `file_id.type` value for activity files.
pub const FILE_TYPE_ACTIVITY: u64 = 4;

/// Scale of `total_*_time` fields (milliseconds).
pub const TIME_SCALE: f64 = 1000.0;
/// Scale of distance fields (centimeters).
pub const DISTANCE_SCALE: f64 = 100.0;

/// Map a FIT `sport` enum value. Generic and unmapped codes return `None`.
pub fn sport_from_code(code: u64) -> Option<Sport> {
    let sport = match code {
        1 => Sport::Run,
        2 => Sport::Bike,
        5 => Sport::Swim,
        10 => Sport::Strength,
        11 => Sport::Walk,
        15 => Sport::Row,
        17 => Sport::Hike,
        _ => return None,
    };
    Some(sport)
}

/// Convert a FIT timestamp (seconds since the FIT epoch) to UTC.
pub fn to_datetime(fit_seconds: u64) -> Option<DateTime<Utc>> {
    let unix = i64::try_from(fit_seconds).ok()? + FIT_EPOCH_OFFSET;
    DateTime::from_timestamp(unix, 0)
}

/// Base type number (low five bits of the base type byte) and its
/// element size in bytes.
pub fn base_type_size(base_type: u8) -> Option<usize> {
    let size = match base_type & 0x1F {
        0 | 1 | 2 | 7 | 10 | 13 => 1,
        3 | 4 | 11 => 2,
        5 | 6 | 8 | 12 => 4,
        9 | 14 | 15 | 16 => 8,
        _ => return None,
    };
    Some(size)
}
