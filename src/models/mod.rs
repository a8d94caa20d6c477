// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod session;
pub mod staging;
pub mod workout;

pub use session::{Session, SessionStatus};
pub use staging::{IngestStatus, StagingRecord, TransitionError};
pub use workout::{CanonicalWorkout, FileType, FormatDetails, Sport, TotalsSource};
