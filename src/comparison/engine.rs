//! Single entry point of the comparison core.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, info, info_span, warn};

use super::domain::check_compatibility;
use super::error::{ComparisonError, PartialSignalWarning};
use super::metrics::normalize_batch;
use super::quality::score_content_quality;
use super::ranker::rank_records;
use super::sentiment::aggregate_sentiment;
use super::{MAX_BATCH_SIZE, MIN_BATCH_SIZE};
use crate::config::{ConfigError, EngineConfig};
use crate::observability::metrics::EngineMetrics;
use crate::types::{
    CommentSentiment, ComparisonResult, ContentDescriptor, DomainConflict, ExcludedVideo,
    NormalizedMetrics, RawMetrics, VideoAnalysisRecord, VideoId, VideoInput,
};

/// Compares a batch of already-resolved video inputs and recommends one.
///
/// The engine holds no state between runs; every derived value is computed
/// from the batch passed to [`ComparisonEngine::compare`].
#[derive(Debug, Clone)]
pub struct ComparisonEngine {
    config: EngineConfig,
    metrics: Option<Arc<EngineMetrics>>,
}

/// A video that survived exclusion, borrowed from the caller's input.
struct Eligible<'a> {
    video_id: &'a VideoId,
    descriptor: &'a ContentDescriptor,
    metrics: RawMetrics,
    comments: &'a [CommentSentiment],
}

impl Default for ComparisonEngine {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            metrics: None,
        }
    }
}

impl ComparisonEngine {
    /// Create an engine after validating the configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a weight group does not sum to 1 or a value is out of range.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            metrics: None,
        })
    }

    /// Record run outcomes into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one comparison.
    ///
    /// Domain incompatibility is returned as a normal result with
    /// `domain_compatible == false` and no ranking.
    ///
    /// # Errors
    /// - [`ComparisonError::Validation`] when the batch has fewer than 2 or more
    ///   than 10 videos, an id is blank or repeated, or a signal is out of range.
    /// - [`ComparisonError::InsufficientData`] when fewer than 2 videos remain
    ///   after excluding those with missing upstream analysis.
    pub fn compare(&self, inputs: &[VideoInput]) -> Result<ComparisonResult, ComparisonError> {
        let span = info_span!("compare_videos", batch_size = inputs.len());
        let _entered = span.enter();
        let started = Instant::now();

        let outcome = self.run(inputs);

        if let Some(metrics) = &self.metrics {
            match &outcome {
                Ok(result) => metrics.record_comparison(
                    started.elapsed(),
                    result.domain_compatible,
                    result.excluded.len(),
                ),
                Err(ComparisonError::InsufficientData { excluded, .. }) => {
                    metrics.record_failure(started.elapsed(), *excluded);
                }
                Err(ComparisonError::Validation { .. }) => {
                    metrics.record_failure(started.elapsed(), 0);
                }
            }
        }

        if let Err(error) = &outcome {
            warn!(error = %error, "comparison failed");
        }
        outcome
    }

    fn run(&self, inputs: &[VideoInput]) -> Result<ComparisonResult, ComparisonError> {
        validate_batch(inputs)?;

        let (eligible, excluded) = partition_inputs(inputs);
        if eligible.len() < MIN_BATCH_SIZE {
            return Err(ComparisonError::InsufficientData {
                remaining: eligible.len(),
                excluded: excluded.len(),
            });
        }
        validate_signals(&eligible)?;

        let descriptors: Vec<&ContentDescriptor> =
            eligible.iter().map(|video| video.descriptor).collect();
        let verdict = check_compatibility(&descriptors, &self.config.domain);
        if !verdict.compatible {
            let domain_conflicts = verdict
                .conflicts
                .iter()
                .map(|conflict| DomainConflict {
                    first: eligible[conflict.first_index].video_id.clone(),
                    first_subject: conflict.first_subject.clone(),
                    second: eligible[conflict.second_index].video_id.clone(),
                    second_subject: conflict.second_subject.clone(),
                })
                .collect();
            info!(
                videos = eligible.len(),
                excluded = excluded.len(),
                "batch is not domain compatible; ranking skipped"
            );
            return Ok(ComparisonResult {
                domain_compatible: false,
                incompatible_reason: verdict.reason,
                domain_conflicts,
                ranked_videos: Vec::new(),
                recommendation: None,
                analyses: Vec::new(),
                excluded,
            });
        }

        let raw: Vec<RawMetrics> = eligible.iter().map(|video| video.metrics).collect();
        let normalized = normalize_batch(&raw);

        // 動画ごとの解析は互いに独立しているので並列に計算する
        let records: Vec<VideoAnalysisRecord> = eligible
            .par_iter()
            .zip(normalized.par_iter())
            .map(|(video, metrics)| self.analyse(video, *metrics))
            .collect();

        let ranking = rank_records(&records, &self.config.ranking, &self.config.quality)?;

        if let Some(recommendation) = &ranking.recommendation {
            info!(
                recommended = %recommendation.video_id,
                margin = recommendation.margin,
                videos = records.len(),
                excluded = excluded.len(),
                "comparison completed"
            );
        }

        Ok(ComparisonResult {
            domain_compatible: true,
            incompatible_reason: None,
            domain_conflicts: Vec::new(),
            ranked_videos: ranking.ranked_videos,
            recommendation: ranking.recommendation,
            analyses: records,
            excluded,
        })
    }

    fn analyse(&self, video: &Eligible<'_>, normalized: NormalizedMetrics) -> VideoAnalysisRecord {
        let sentiment = aggregate_sentiment(video.comments);
        let content_quality =
            score_content_quality(video.descriptor, &normalized, &self.config.quality);
        let warnings = partial_signals(video.descriptor, video.comments);

        if warnings.is_empty() {
            debug!(
                video_id = %video.video_id,
                quality = content_quality.score,
                sentiment = sentiment.overall_score,
                engagement_rate = normalized.engagement_rate,
                "analysed video"
            );
        } else {
            let labels: Vec<String> = warnings.iter().map(ToString::to_string).collect();
            warn!(
                video_id = %video.video_id,
                warnings = %labels.join(","),
                "scoring with partial signals"
            );
        }

        VideoAnalysisRecord {
            video_id: video.video_id.clone(),
            descriptor: video.descriptor.clone(),
            raw_metrics: video.metrics,
            normalized_metrics: normalized,
            sentiment,
            content_quality,
            warnings,
        }
    }
}

fn validate_batch(inputs: &[VideoInput]) -> Result<(), ComparisonError> {
    if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&inputs.len()) {
        return Err(ComparisonError::batch_size(inputs.len()));
    }

    let mut seen = FxHashSet::default();
    for (index, input) in inputs.iter().enumerate() {
        if input.video_id.is_blank() {
            return Err(ComparisonError::validation(
                "video_id",
                format!("video at position {index} has an empty id"),
            ));
        }
        if !seen.insert(input.video_id.as_str()) {
            return Err(ComparisonError::validation(
                "video_id",
                format!("video id {} appears more than once", input.video_id),
            ));
        }
    }
    Ok(())
}

fn partition_inputs(inputs: &[VideoInput]) -> (Vec<Eligible<'_>>, Vec<ExcludedVideo>) {
    let mut eligible = Vec::with_capacity(inputs.len());
    let mut excluded = Vec::new();

    for (index, input) in inputs.iter().enumerate() {
        match (&input.descriptor, input.metrics) {
            (Some(descriptor), Some(metrics)) => eligible.push(Eligible {
                video_id: &input.video_id,
                descriptor,
                metrics,
                comments: &input.comments,
            }),
            (descriptor, metrics) => {
                let missing = match (descriptor.is_none(), metrics.is_none()) {
                    (true, true) => "content descriptor and metrics unavailable",
                    (true, false) => "content descriptor unavailable",
                    _ => "metrics unavailable",
                };
                let reason = match input.upstream_error.as_deref() {
                    Some(detail) if !detail.trim().is_empty() => format!("{missing}: {detail}"),
                    _ => missing.to_string(),
                };
                warn!(video_id = %input.video_id, index, reason = %reason, "excluding video");
                excluded.push(ExcludedVideo {
                    index,
                    video_id: input.video_id.clone(),
                    reason,
                });
            }
        }
    }

    (eligible, excluded)
}

fn validate_signals(eligible: &[Eligible<'_>]) -> Result<(), ComparisonError> {
    for video in eligible {
        if let Some(confidence) = video.descriptor.confidence {
            if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
                return Err(ComparisonError::validation(
                    "descriptor.confidence",
                    format!(
                        "video {} reports confidence {confidence}, expected a value in [0, 1]",
                        video.video_id
                    ),
                ));
            }
        }
        if let Some(comment) = video
            .comments
            .iter()
            .find(|comment| !comment.score.is_finite() || !(-1.0..=1.0).contains(&comment.score))
        {
            return Err(ComparisonError::validation(
                "comments.score",
                format!(
                    "video {} has a comment score of {}, expected a value in [-1, 1]",
                    video.video_id, comment.score
                ),
            ));
        }
    }
    Ok(())
}

fn partial_signals(
    descriptor: &ContentDescriptor,
    comments: &[CommentSentiment],
) -> Vec<PartialSignalWarning> {
    let mut warnings = Vec::new();
    if comments.is_empty() {
        warnings.push(PartialSignalWarning::NoComments);
    }
    if descriptor.confidence.is_none() {
        warnings.push(PartialSignalWarning::MissingConfidence);
    }
    if !descriptor.difficulty.is_known() {
        warnings.push(PartialSignalWarning::UnknownDifficulty);
    }
    if descriptor.subject_key().is_none() {
        warnings.push(PartialSignalWarning::UnknownSubject);
    }
    warnings
}
