//! Composite scoring and ranking of a compatible batch.
//!
//! ```text
//! composite = content_quality_w * quality.score
//!           + sentiment_w       * (overall_score + 1) / 2
//!           + engagement_w      * min(engagement_rate, cap) / cap
//!           + reach_w           * relative_views
//! ```
//!
//! Composites are rounded to [`COMPOSITE_PRECISION`] so that mathematically
//! equal scores tie. Ordering is total: composite desc, then quality,
//! sentiment, relative views (all desc), then video id ascending.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::Serialize;

use super::error::ComparisonError;
use super::{MAX_BATCH_SIZE, MIN_BATCH_SIZE};
use crate::config::{QualityConfig, RankingWeights};
use crate::types::{RankedVideo, Recommendation, VideoAnalysisRecord};

pub const FACTOR_CONTENT_QUALITY: &str = "content_quality";
pub const FACTOR_SENTIMENT: &str = "sentiment";
pub const FACTOR_ENGAGEMENT: &str = "engagement";
pub const FACTOR_REACH: &str = "reach";

/// Decimal places kept in a composite score.
pub const COMPOSITE_PRECISION: i32 = 9;

/// Weighted contribution of each factor to one video's composite score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub content_quality: f64,
    pub sentiment: f64,
    pub engagement: f64,
    pub reach: f64,
}

impl ScoreBreakdown {
    /// Compute the weighted terms for one record.
    ///
    /// More likes never lower the total. More views only raise it while the
    /// engagement rate stays at or above the cap: below it, extra views dilute
    /// the engagement term faster than reach grows.
    #[must_use]
    pub fn compute(
        record: &VideoAnalysisRecord,
        weights: &RankingWeights,
        quality: &QualityConfig,
    ) -> Self {
        Self {
            content_quality: weights.content_quality * record.content_quality.score,
            sentiment: weights.sentiment * record.sentiment.normalized_score(),
            engagement: weights.engagement
                * quality.clamp_engagement(record.normalized_metrics.engagement_rate),
            reach: weights.reach * record.normalized_metrics.relative_views.clamp(0.0, 1.0),
        }
    }

    /// Composite score: the sum of all contributions.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.content_quality + self.sentiment + self.engagement + self.reach
    }

    /// `(factor name, contribution)` pairs in a fixed order.
    #[must_use]
    pub fn factors(&self) -> [(&'static str, f64); 4] {
        [
            (FACTOR_CONTENT_QUALITY, self.content_quality),
            (FACTOR_SENTIMENT, self.sentiment),
            (FACTOR_ENGAGEMENT, self.engagement),
            (FACTOR_REACH, self.reach),
        ]
    }

    #[must_use]
    pub fn explanation(&self) -> BTreeMap<String, f64> {
        self.factors()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }
}

/// Ranked videos plus the summary of why the winner won.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub ranked_videos: Vec<RankedVideo>,
    pub recommendation: Option<Recommendation>,
}

struct Scored<'a> {
    record: &'a VideoAnalysisRecord,
    breakdown: ScoreBreakdown,
    composite: f64,
}

/// Rank a complete, domain-compatible batch.
///
/// # Errors
/// [`ComparisonError::Validation`] when the batch size is outside
/// [`MIN_BATCH_SIZE`]..=[`MAX_BATCH_SIZE`], an id is blank or repeated, or a
/// record carries a non-finite signal.
pub fn rank_records(
    records: &[VideoAnalysisRecord],
    weights: &RankingWeights,
    quality: &QualityConfig,
) -> Result<Ranking, ComparisonError> {
    validate_records(records)?;

    let mut scored: Vec<Scored<'_>> = records
        .iter()
        .map(|record| {
            let breakdown = ScoreBreakdown::compute(record, weights, quality);
            let composite = round_composite(breakdown.total());
            tracing::debug!(
                video_id = %record.video_id,
                composite,
                content_quality = breakdown.content_quality,
                sentiment = breakdown.sentiment,
                engagement = breakdown.engagement,
                reach = breakdown.reach,
                "scored video"
            );
            Scored {
                record,
                breakdown,
                composite,
            }
        })
        .collect();

    scored.sort_by(compare_scored);

    let recommendation = summarize(&scored);
    let ranked_videos = scored
        .into_iter()
        .enumerate()
        .map(|(position, entry)| RankedVideo {
            rank: position + 1,
            video_id: entry.record.video_id.clone(),
            composite_score: entry.composite,
            rank_explanation: entry.breakdown.explanation(),
            warnings: entry.record.warnings.clone(),
        })
        .collect();

    Ok(Ranking {
        ranked_videos,
        recommendation,
    })
}

fn validate_records(records: &[VideoAnalysisRecord]) -> Result<(), ComparisonError> {
    if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&records.len()) {
        return Err(ComparisonError::batch_size(records.len()));
    }

    let mut seen = FxHashSet::default();
    for (index, record) in records.iter().enumerate() {
        if record.video_id.is_blank() {
            return Err(ComparisonError::validation(
                "video_id",
                format!("record {index} has an empty video id"),
            ));
        }
        if !seen.insert(record.video_id.as_str()) {
            return Err(ComparisonError::validation(
                "video_id",
                format!("duplicate video id {}", record.video_id),
            ));
        }

        let signals = [
            ("content_quality.score", record.content_quality.score),
            ("sentiment.overall_score", record.sentiment.overall_score),
            (
                "normalized_metrics.engagement_rate",
                record.normalized_metrics.engagement_rate,
            ),
            (
                "normalized_metrics.relative_views",
                record.normalized_metrics.relative_views,
            ),
        ];
        if let Some((field, value)) = signals.into_iter().find(|(_, value)| !value.is_finite()) {
            return Err(ComparisonError::validation(
                field,
                format!("video {} has a non-finite value ({value})", record.video_id),
            ));
        }
    }
    Ok(())
}

fn round_composite(value: f64) -> f64 {
    let scale = 10_f64.powi(COMPOSITE_PRECISION);
    (value * scale).round() / scale
}

fn compare_scored(a: &Scored<'_>, b: &Scored<'_>) -> Ordering {
    b.composite
        .total_cmp(&a.composite)
        .then_with(|| {
            b.record
                .content_quality
                .score
                .total_cmp(&a.record.content_quality.score)
        })
        .then_with(|| {
            b.record
                .sentiment
                .overall_score
                .total_cmp(&a.record.sentiment.overall_score)
        })
        .then_with(|| {
            b.record
                .normalized_metrics
                .relative_views
                .total_cmp(&a.record.normalized_metrics.relative_views)
        })
        .then_with(|| a.record.video_id.cmp(&b.record.video_id))
}

fn summarize(scored: &[Scored<'_>]) -> Option<Recommendation> {
    let top = scored.first()?;
    let Some(runner_up) = scored.get(1) else {
        return Some(Recommendation {
            video_id: top.record.video_id.clone(),
            runner_up: None,
            margin: 0.0,
            leading_factors: Vec::new(),
        });
    };

    let mut leads: Vec<(&'static str, f64)> = top
        .breakdown
        .factors()
        .into_iter()
        .zip(runner_up.breakdown.factors())
        .map(|((name, ours), (_, theirs))| (name, ours - theirs))
        .filter(|(_, lead)| *lead > 0.0)
        .collect();
    leads.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    Some(Recommendation {
        video_id: top.record.video_id.clone(),
        runner_up: Some(runner_up.record.video_id.clone()),
        margin: top.composite - runner_up.composite,
        leading_factors: leads.into_iter().map(|(name, _)| name.to_string()).collect(),
    })
}
