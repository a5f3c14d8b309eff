use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{MAX_BATCH_SIZE, MIN_BATCH_SIZE};

/// Fatal errors of a comparison run. No partial ranking is ever returned alongside one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComparisonError {
    #[error("validation failed for {field}: {message}")]
    Validation { field: String, message: String },
    #[error(
        "insufficient data: {remaining} video(s) left after excluding {excluded}, at least {MIN_BATCH_SIZE} required"
    )]
    InsufficientData { remaining: usize, excluded: usize },
}

impl ComparisonError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ComparisonError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn batch_size(actual: usize) -> Self {
        Self::validation(
            "videos",
            format!(
                "batch must contain between {MIN_BATCH_SIZE} and {MAX_BATCH_SIZE} videos, got {actual}"
            ),
        )
    }

    /// Name of the offending field for validation errors.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            ComparisonError::Validation { field, .. } => Some(field),
            ComparisonError::InsufficientData { .. } => None,
        }
    }
}

/// Non-fatal condition recorded on a video's analysis. Scoring used a documented default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialSignalWarning {
    /// No comments: the sentiment profile is the "no data" state.
    NoComments,
    /// Analyzer reported no confidence: the configured default was used.
    MissingConfidence,
    /// Difficulty is unknown and does not count towards completeness.
    UnknownDifficulty,
    /// Subject is unknown and was admitted only because the policy allows it.
    UnknownSubject,
}

impl fmt::Display for PartialSignalWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialSignalWarning::NoComments => write!(f, "no_comments"),
            PartialSignalWarning::MissingConfidence => write!(f, "missing_confidence"),
            PartialSignalWarning::UnknownDifficulty => write!(f, "unknown_difficulty"),
            PartialSignalWarning::UnknownSubject => write!(f, "unknown_subject"),
        }
    }
}
