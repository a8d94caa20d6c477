// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout file decoders.
//!
//! Each supported format has one decoder implementing [`WorkoutDecoder`];
//! [`decode`] dispatches on the resolved [`FileType`].

pub mod fit;
pub mod gpx;
pub mod tcx;
mod xml;

use crate::models::{CanonicalWorkout, FileType, Sport};

pub use fit::FitDecoder;
pub use gpx::GpxDecoder;
pub use tcx::TcxDecoder;

/// Settings shared by all decoders.
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    /// Sport used when a file does not name a recognizable one
    pub default_sport: Sport,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            default_sport: Sport::Run,
        }
    }
}

/// Decoder failure with a human-readable reason.
///
/// Messages never include parser internals such as byte buffers or
/// library error types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("not a valid {format} file: {reason}")]
    NotSupportedFormat {
        format: &'static str,
        reason: String,
    },

    #[error("malformed {format} file: {reason}")]
    Malformed {
        format: &'static str,
        reason: String,
    },

    #[error("{format} file contains no workout data: {reason}")]
    MissingData {
        format: &'static str,
        reason: String,
    },
}

impl DecodeError {
    pub(crate) fn not_supported(file_type: FileType, reason: impl Into<String>) -> Self {
        DecodeError::NotSupportedFormat {
            format: file_type.display_name(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(file_type: FileType, reason: impl Into<String>) -> Self {
        DecodeError::Malformed {
            format: file_type.display_name(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(file_type: FileType, reason: impl Into<String>) -> Self {
        DecodeError::MissingData {
            format: file_type.display_name(),
            reason: reason.into(),
        }
    }
}

/// Converts raw file bytes into a [`CanonicalWorkout`].
pub trait WorkoutDecoder {
    fn file_type(&self) -> FileType;

    fn decode(&self, bytes: &[u8]) -> Result<CanonicalWorkout, DecodeError>;
}

/// Decode `bytes` with the decoder for `file_type`.
pub fn decode(
    file_type: FileType,
    bytes: &[u8],
    options: DecoderOptions,
) -> Result<CanonicalWorkout, DecodeError> {
    match file_type {
        FileType::Tcx => TcxDecoder::new(options).decode(bytes),
        FileType::Gpx => GpxDecoder::new(options).decode(bytes),
        FileType::Fit => FitDecoder::new(options).decode(bytes),
    }
}
