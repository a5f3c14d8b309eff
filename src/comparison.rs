//! Comparison-and-recommendation core.
//!
//! Control flow of one run:
//! 1. validate the batch and exclude videos whose upstream analysis is missing
//! 2. [`domain`] gate over the remaining descriptors (synchronous, all-or-nothing)
//! 3. [`metrics`], [`sentiment`] and [`quality`] per video, independently
//! 4. [`ranker`] over the complete set of per-video records
//!
//! [`engine::ComparisonEngine`] wires the steps together.

pub mod domain;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod quality;
pub mod ranker;
pub mod sentiment;

pub use domain::{DomainVerdict, SubjectConflict, check_compatibility};
pub use engine::ComparisonEngine;
pub use error::{ComparisonError, PartialSignalWarning};
pub use metrics::{BatchStats, normalize_batch};
pub use quality::{descriptor_completeness, score_content_quality};
pub use ranker::{Ranking, ScoreBreakdown, rank_records};
pub use sentiment::aggregate_sentiment;

/// Smallest comparable batch.
pub const MIN_BATCH_SIZE: usize = 2;
/// Largest accepted batch.
pub const MAX_BATCH_SIZE: usize = 10;
