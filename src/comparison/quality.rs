//! Content-quality scoring.
//!
//! `score = completeness_weight * completeness
//!        + confidence_weight * confidence
//!        + engagement_weight * min(engagement_rate, cap) / cap`
//!
//! The result is a pure function of the descriptor, the normalized metrics and
//! the [`QualityConfig`]; absent signals fall back to documented defaults.

use crate::config::QualityConfig;
use crate::types::{ContentDescriptor, ContentQualityScore, NormalizedMetrics};

const DESCRIPTOR_FIELDS: f64 = 6.0;

/// Fraction of the six descriptor fields that carry a usable value.
///
/// Counted fields: subject, subtopic, difficulty, audience, non-empty
/// prerequisites and non-empty key concepts.
#[must_use]
pub fn descriptor_completeness(descriptor: &ContentDescriptor) -> f64 {
    let populated = [
        descriptor.subject_key().is_some(),
        descriptor.subtopic_key().is_some(),
        descriptor.difficulty.is_known(),
        descriptor.has_audience(),
        descriptor.has_prerequisites(),
        descriptor.has_key_concepts(),
    ]
    .into_iter()
    .filter(|present| *present)
    .count();

    populated as f64 / DESCRIPTOR_FIELDS
}

/// Score one video's content quality in [0, 1].
#[must_use]
pub fn score_content_quality(
    descriptor: &ContentDescriptor,
    metrics: &NormalizedMetrics,
    config: &QualityConfig,
) -> ContentQualityScore {
    let completeness = descriptor_completeness(descriptor);
    let confidence = descriptor
        .confidence
        .filter(|value| value.is_finite())
        .unwrap_or(config.default_confidence)
        .clamp(0.0, 1.0);
    let engagement = config.clamp_engagement(metrics.engagement_rate);

    let score = (config.completeness_weight * completeness
        + config.confidence_weight * confidence
        + config.engagement_weight * engagement)
        .clamp(0.0, 1.0);

    ContentQualityScore {
        score,
        completeness,
        confidence,
        engagement,
        descriptor: descriptor.clone(),
    }
}
