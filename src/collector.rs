//! Upstream collection of per-video inputs.
//!
//! The comparison core never performs I/O. This module resolves every
//! external call (details fetch, content analysis, comment sentiment) ahead of
//! time and hands the engine plain [`VideoInput`] values. Per-video failures
//! are recorded on the input, so the engine can exclude that video with a
//! reason instead of failing the whole run.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{CommentSentiment, ContentDescriptor, RawMetrics, VideoId, VideoInput};

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("video not found")]
    NotFound,
    #[error("provider quota exceeded")]
    QuotaExceeded,
    #[error("provider call failed: {0}")]
    Failed(String),
}

/// Title and description handed to the content analyzer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub channel: Option<String>,
}

/// A top-level comment as fetched, before sentiment extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedComment {
    pub text: String,
    pub likes: u64,
}

/// Everything the details provider returns for one video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub metadata: VideoMetadata,
    pub metrics: RawMetrics,
    pub comments: Vec<FetchedComment>,
}

/// Video metadata and statistics, keyed by id.
#[async_trait]
pub trait VideoDetailsProvider: Send + Sync {
    async fn fetch(&self, video_id: &VideoId) -> Result<VideoDetails, ProviderError>;
}

/// Content analysis keyed by `(id, metadata)`.
#[async_trait]
pub trait ContentAnalysisProvider: Send + Sync {
    async fn analyse(
        &self,
        video_id: &VideoId,
        metadata: &VideoMetadata,
    ) -> Result<ContentDescriptor, ProviderError>;
}

/// Sentiment extraction over a batch of comment texts.
///
/// Implementations return one result per comment, in order.
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    async fn classify(&self, comments: &[String]) -> Result<Vec<CommentSentiment>, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Most-liked comments analysed per video.
    pub max_comments: usize,
    /// Comments per sentiment request.
    pub sentiment_batch_size: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_comments: 100,
            sentiment_batch_size: 20,
        }
    }
}

/// Resolves the collaborators for a list of ids, one video concurrently per id.
#[derive(Clone)]
pub struct InputCollector {
    details: Arc<dyn VideoDetailsProvider>,
    analysis: Arc<dyn ContentAnalysisProvider>,
    sentiment: Arc<dyn SentimentProvider>,
    config: CollectorConfig,
}

impl InputCollector {
    #[must_use]
    pub fn new(
        details: Arc<dyn VideoDetailsProvider>,
        analysis: Arc<dyn ContentAnalysisProvider>,
        sentiment: Arc<dyn SentimentProvider>,
    ) -> Self {
        Self {
            details,
            analysis,
            sentiment,
            config: CollectorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Collect inputs for `video_ids`, preserving their order.
    ///
    /// Never fails as a whole: a video whose fetch or analysis failed comes back
    /// with the missing part set to `None` and `upstream_error` filled in.
    pub async fn collect(&self, video_ids: &[VideoId]) -> Vec<VideoInput> {
        join_all(video_ids.iter().map(|video_id| self.collect_one(video_id))).await
    }

    async fn collect_one(&self, video_id: &VideoId) -> VideoInput {
        let details = match self.details.fetch(video_id).await {
            Ok(details) => details,
            Err(error) => {
                warn!(video_id = %video_id, error = %error, "failed to fetch video details");
                return VideoInput {
                    video_id: video_id.clone(),
                    descriptor: None,
                    metrics: None,
                    comments: Vec::new(),
                    upstream_error: Some(format!("details fetch failed: {error}")),
                };
            }
        };

        let descriptor = match self.analysis.analyse(video_id, &details.metadata).await {
            Ok(descriptor) => descriptor,
            Err(error) => {
                warn!(video_id = %video_id, error = %error, "content analysis failed");
                // 解析に失敗した動画は除外されるのでコメント解析は行わない
                return VideoInput {
                    video_id: video_id.clone(),
                    descriptor: None,
                    metrics: Some(details.metrics),
                    comments: Vec::new(),
                    upstream_error: Some(format!("content analysis failed: {error}")),
                };
            }
        };

        let comments = self.classify_comments(video_id, details.comments).await;

        VideoInput {
            video_id: video_id.clone(),
            descriptor: Some(descriptor),
            metrics: Some(details.metrics),
            comments,
            upstream_error: None,
        }
    }

    async fn classify_comments(
        &self,
        video_id: &VideoId,
        mut comments: Vec<FetchedComment>,
    ) -> Vec<CommentSentiment> {
        comments.sort_by(|a, b| b.likes.cmp(&a.likes));
        let texts: Vec<String> = comments
            .into_iter()
            .take(self.config.max_comments)
            .map(|comment| comment.text)
            .collect();

        let mut results = Vec::with_capacity(texts.len());
        for (batch_index, batch) in texts
            .chunks(self.config.sentiment_batch_size.max(1))
            .enumerate()
        {
            match self.sentiment.classify(batch).await {
                Ok(mut classified) => {
                    classified.truncate(batch.len());
                    results.extend(classified);
                }
                Err(error) => {
                    warn!(
                        video_id = %video_id,
                        batch_index,
                        batch_len = batch.len(),
                        error = %error,
                        "dropping sentiment batch"
                    );
                }
            }
        }

        debug!(
            video_id = %video_id,
            analysed = results.len(),
            "comment sentiment collected"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SentimentLabel;

    struct FixedDetails;

    #[async_trait]
    impl VideoDetailsProvider for FixedDetails {
        async fn fetch(&self, video_id: &VideoId) -> Result<VideoDetails, ProviderError> {
            if video_id.as_str() == "missing" {
                return Err(ProviderError::NotFound);
            }
            Ok(VideoDetails {
                metadata: VideoMetadata {
                    title: format!("title {video_id}"),
                    description: String::new(),
                    channel: None,
                },
                metrics: RawMetrics::new(100, 10, 3),
                comments: (0..3)
                    .map(|i| FetchedComment {
                        text: format!("comment {i}"),
                        likes: i,
                    })
                    .collect(),
            })
        }
    }

    struct SubjectAnalysis;

    #[async_trait]
    impl ContentAnalysisProvider for SubjectAnalysis {
        async fn analyse(
            &self,
            _video_id: &VideoId,
            _metadata: &VideoMetadata,
        ) -> Result<ContentDescriptor, ProviderError> {
            Ok(ContentDescriptor {
                subject: Some("calculus".to_string()),
                ..ContentDescriptor::default()
            })
        }
    }

    struct AllPositive;

    #[async_trait]
    impl SentimentProvider for AllPositive {
        async fn classify(
            &self,
            comments: &[String],
        ) -> Result<Vec<CommentSentiment>, ProviderError> {
            Ok(comments
                .iter()
                .map(|_| CommentSentiment::new(SentimentLabel::Positive, 1.0))
                .collect())
        }
    }

    fn collector() -> InputCollector {
        InputCollector::new(
            Arc::new(FixedDetails),
            Arc::new(SubjectAnalysis),
            Arc::new(AllPositive),
        )
    }

    #[tokio::test]
    async fn collects_inputs_in_order() {
        let ids = vec![VideoId::new("a"), VideoId::new("missing"), VideoId::new("b")];
        let inputs = collector().collect(&ids).await;

        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs[0].video_id.as_str(), "a");
        assert_eq!(inputs[0].comments.len(), 3);
        assert!(inputs[0].descriptor.is_some());

        assert!(inputs[1].descriptor.is_none());
        assert!(inputs[1].metrics.is_none());
        assert_eq!(
            inputs[1].upstream_error.as_deref(),
            Some("details fetch failed: video not found")
        );
        assert_eq!(inputs[2].video_id.as_str(), "b");
    }

    #[tokio::test]
    async fn caps_analysed_comments() {
        let collector = collector().with_config(CollectorConfig {
            max_comments: 2,
            sentiment_batch_size: 1,
        });
        let inputs = collector.collect(&[VideoId::new("a")]).await;
        assert_eq!(inputs[0].comments.len(), 2);
    }
}
