//! Data model shared by the comparison engine and its collaborators.
//!
//! Inputs (`VideoInput`, `ContentDescriptor`, `RawMetrics`, `CommentSentiment`)
//! are produced upstream and never mutated here. Everything else is derived
//! within a single comparison run and is only meaningful inside that run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::comparison::PartialSignalWarning;

/// Opaque, stable identifier of a video. Unique within one comparison run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VideoId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Difficulty level reported by the content analyzer.
///
/// Serialized in snake case; deserialized leniently, so analyzer labels such
/// as "Beginner" or "EXPERT" land on the right level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    #[default]
    Unknown,
}

impl From<String> for Difficulty {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl Difficulty {
    /// Lenient parse used for analyzer output ("Beginner", "INTERMEDIATE", "beginner/intermediate" ...).
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "beginner" | "basic" | "introductory" | "easy" => Difficulty::Beginner,
            "intermediate" | "medium" => Difficulty::Intermediate,
            "advanced" | "expert" | "hard" => Difficulty::Advanced,
            _ => Difficulty::Unknown,
        }
    }

    #[must_use]
    pub fn is_known(self) -> bool {
        !matches!(self, Difficulty::Unknown)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Beginner => write!(f, "beginner"),
            Difficulty::Intermediate => write!(f, "intermediate"),
            Difficulty::Advanced => write!(f, "advanced"),
            Difficulty::Unknown => write!(f, "unknown"),
        }
    }
}

/// Structured content descriptor produced once per video by the content analyzer.
///
/// Every AI-derived attribute is optional. Consumers must handle the absent
/// case explicitly; `None`, an empty string and the literal "unknown" are all
/// treated as "no signal".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ContentDescriptor {
    pub subject: Option<String>,
    pub subtopic: Option<String>,
    pub difficulty: Difficulty,
    pub audience: Option<String>,
    pub prerequisites: Vec<String>,
    pub key_concepts: Vec<String>,
    /// Analyzer confidence in [0, 1], when reported.
    pub confidence: Option<f64>,
}

impl ContentDescriptor {
    /// Normalized subject key (trimmed, lower-cased), or `None` when unknown.
    #[must_use]
    pub fn subject_key(&self) -> Option<String> {
        known_text(self.subject.as_deref())
    }

    /// Normalized subtopic key, or `None` when unknown.
    #[must_use]
    pub fn subtopic_key(&self) -> Option<String> {
        known_text(self.subtopic.as_deref())
    }

    #[must_use]
    pub fn has_audience(&self) -> bool {
        known_text(self.audience.as_deref()).is_some()
    }

    #[must_use]
    pub fn has_prerequisites(&self) -> bool {
        self.prerequisites.iter().any(|p| !p.trim().is_empty())
    }

    #[must_use]
    pub fn has_key_concepts(&self) -> bool {
        self.key_concepts.iter().any(|c| !c.trim().is_empty())
    }
}

/// Lower-cased, trimmed text, treating blank and "unknown" as absent.
pub(crate) fn known_text(value: Option<&str>) -> Option<String> {
    let normalized = value?.trim().to_lowercase();
    if normalized.is_empty() || normalized == "unknown" {
        None
    } else {
        Some(normalized)
    }
}

/// Raw performance counters at fetch time. Zero is a valid value, not missing data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetrics {
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
}

impl RawMetrics {
    #[must_use]
    pub fn new(views: u64, likes: u64, comments: u64) -> Self {
        Self {
            views,
            likes,
            comments,
        }
    }
}

/// Sentiment label assigned to a single comment by the sentiment extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "positive"),
            SentimentLabel::Negative => write!(f, "negative"),
            SentimentLabel::Neutral => write!(f, "neutral"),
        }
    }
}

/// Pre-computed sentiment of one comment; `score` is in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommentSentiment {
    pub label: SentimentLabel,
    pub score: f64,
}

impl CommentSentiment {
    #[must_use]
    pub fn new(label: SentimentLabel, score: f64) -> Self {
        Self { label, score }
    }
}

/// Per-video input handed to the engine with every upstream call already resolved.
///
/// `descriptor` or `metrics` being `None` means the upstream analysis for that
/// video failed; the engine excludes such videos before the domain gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInput {
    pub video_id: VideoId,
    #[serde(default)]
    pub descriptor: Option<ContentDescriptor>,
    #[serde(default)]
    pub metrics: Option<RawMetrics>,
    #[serde(default)]
    pub comments: Vec<CommentSentiment>,
    /// Upstream failure detail, carried into the exclusion reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_error: Option<String>,
}

impl VideoInput {
    #[must_use]
    pub fn new(
        video_id: impl Into<VideoId>,
        descriptor: ContentDescriptor,
        metrics: RawMetrics,
        comments: Vec<CommentSentiment>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            descriptor: Some(descriptor),
            metrics: Some(metrics),
            comments,
            upstream_error: None,
        }
    }
}

/// Batch-relative engagement measures. Not portable across comparison runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMetrics {
    /// `(likes + comments) / max(views, 1)`; unbounded, clamp before scoring.
    pub engagement_rate: f64,
    /// `views / max views in batch`, in [0, 1].
    pub relative_views: f64,
    /// `likes / max likes in batch`, in [0, 1].
    pub relative_likes: f64,
    /// `comments / max comments in batch`, in [0, 1].
    pub relative_comments: f64,
    pub like_rate: f64,
    pub comment_rate: f64,
    /// Value divided by the batch mean; 0 when the mean is 0.
    pub views_vs_mean: f64,
    pub likes_vs_mean: f64,
    pub comments_vs_mean: f64,
}

/// Aggregated comment sentiment of one video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentProfile {
    pub positive_ratio: f64,
    pub negative_ratio: f64,
    pub neutral_ratio: f64,
    /// Mean per-comment score in [-1, 1]; 0 when there is no data.
    pub overall_score: f64,
    /// `positive_ratio - negative_ratio`.
    pub net_sentiment: f64,
    pub sample_size: usize,
}

impl SentimentProfile {
    /// `true` for the distinguishable "no comments" state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sample_size == 0
    }

    /// Overall score rescaled from [-1, 1] to [0, 1].
    #[must_use]
    pub fn normalized_score(&self) -> f64 {
        ((self.overall_score + 1.0) / 2.0).clamp(0.0, 1.0)
    }
}

/// Content-quality score in [0, 1] with the components it was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentQualityScore {
    pub score: f64,
    /// Fraction of populated descriptor fields.
    pub completeness: f64,
    /// Confidence actually used (reported or the configured default).
    pub confidence: f64,
    /// Clamped engagement contribution in [0, 1].
    pub engagement: f64,
    #[serde(skip)]
    pub descriptor: ContentDescriptor,
}

/// Everything the ranker knows about one video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoAnalysisRecord {
    pub video_id: VideoId,
    pub descriptor: ContentDescriptor,
    pub raw_metrics: RawMetrics,
    pub normalized_metrics: NormalizedMetrics,
    pub sentiment: SentimentProfile,
    pub content_quality: ContentQualityScore,
    pub warnings: Vec<PartialSignalWarning>,
}

/// One entry of the final ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedVideo {
    /// 1-based position.
    pub rank: usize,
    pub video_id: VideoId,
    pub composite_score: f64,
    /// Factor name → weighted contribution to `composite_score`.
    pub rank_explanation: BTreeMap<String, f64>,
    pub warnings: Vec<PartialSignalWarning>,
}

/// Video removed before the domain gate because its upstream analysis was unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedVideo {
    /// Position in the original input sequence.
    pub index: usize,
    pub video_id: VideoId,
    pub reason: String,
}

/// Two videos whose subjects are neither identical nor declared related.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainConflict {
    pub first: VideoId,
    pub first_subject: Option<String>,
    pub second: VideoId,
    pub second_subject: Option<String>,
}

/// Why the top video was recommended over the runner-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub video_id: VideoId,
    pub runner_up: Option<VideoId>,
    /// Composite score lead over the runner-up.
    pub margin: f64,
    /// Factors on which the recommended video out-scored the runner-up, biggest lead first.
    pub leading_factors: Vec<String>,
}

/// Output of one comparison run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub domain_compatible: bool,
    pub incompatible_reason: Option<String>,
    /// Offending subject pairs; empty when compatible.
    pub domain_conflicts: Vec<DomainConflict>,
    /// Strictly ordered by composite score descending; empty when incompatible.
    pub ranked_videos: Vec<RankedVideo>,
    pub recommendation: Option<Recommendation>,
    /// Per-video analysis in input order; empty when incompatible.
    pub analyses: Vec<VideoAnalysisRecord>,
    pub excluded: Vec<ExcludedVideo>,
}

impl ComparisonResult {
    /// The top-ranked video, if the batch was compatible.
    #[must_use]
    pub fn recommended(&self) -> Option<&RankedVideo> {
        self.ranked_videos.first()
    }
}
