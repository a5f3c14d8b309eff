//! Batch-relative metric normalization.
//!
//! Raw counts of videos with very different audience sizes are not comparable;
//! every measure here is relative to the other videos of the same batch.
//! Batch statistics are a pure reduction over the batch, so the order of the
//! input does not change any video's normalized metrics.

use serde::Serialize;

use crate::types::{NormalizedMetrics, RawMetrics};

/// Maxima and means of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BatchStats {
    pub max_views: u64,
    pub max_likes: u64,
    pub max_comments: u64,
    pub mean_views: f64,
    pub mean_likes: f64,
    pub mean_comments: f64,
}

impl BatchStats {
    /// Reduce a batch to its statistics. An empty batch yields all zeros.
    #[must_use]
    pub fn from_metrics(batch: &[RawMetrics]) -> Self {
        if batch.is_empty() {
            return Self::default();
        }

        let mut stats = Self::default();
        let (mut views, mut likes, mut comments) = (0_u128, 0_u128, 0_u128);
        for metrics in batch {
            stats.max_views = stats.max_views.max(metrics.views);
            stats.max_likes = stats.max_likes.max(metrics.likes);
            stats.max_comments = stats.max_comments.max(metrics.comments);
            views += u128::from(metrics.views);
            likes += u128::from(metrics.likes);
            comments += u128::from(metrics.comments);
        }

        let count = batch.len() as f64;
        stats.mean_views = views as f64 / count;
        stats.mean_likes = likes as f64 / count;
        stats.mean_comments = comments as f64 / count;
        stats
    }

    /// Normalize one video's counters against this batch.
    #[must_use]
    pub fn normalize(&self, metrics: &RawMetrics) -> NormalizedMetrics {
        let views = metrics.views as f64;
        let likes = metrics.likes as f64;
        let comments = metrics.comments as f64;
        // 再生回数 0 でもゼロ除算しない
        let denominator = metrics.views.max(1) as f64;

        NormalizedMetrics {
            engagement_rate: (likes + comments) / denominator,
            relative_views: share_of_max(metrics.views, self.max_views),
            relative_likes: share_of_max(metrics.likes, self.max_likes),
            relative_comments: share_of_max(metrics.comments, self.max_comments),
            like_rate: likes / denominator,
            comment_rate: comments / denominator,
            views_vs_mean: ratio_to_mean(views, self.mean_views),
            likes_vs_mean: ratio_to_mean(likes, self.mean_likes),
            comments_vs_mean: ratio_to_mean(comments, self.mean_comments),
        }
    }
}

/// Normalize every video of the batch, preserving input order.
#[must_use]
pub fn normalize_batch(batch: &[RawMetrics]) -> Vec<NormalizedMetrics> {
    let stats = BatchStats::from_metrics(batch);
    batch.iter().map(|metrics| stats.normalize(metrics)).collect()
}

fn share_of_max(value: u64, max: u64) -> f64 {
    if max == 0 {
        0.0
    } else {
        (value as f64 / max as f64).clamp(0.0, 1.0)
    }
}

fn ratio_to_mean(value: f64, mean: f64) -> f64 {
    if mean > 0.0 { value / mean } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn engagement_rate_uses_views_as_denominator() {
        let normalized = normalize_batch(&[RawMetrics::new(10_000, 800, 200)]);
        assert!((normalized[0].engagement_rate - 0.1).abs() < EPS);
        assert!((normalized[0].like_rate - 0.08).abs() < EPS);
        assert!((normalized[0].comment_rate - 0.02).abs() < EPS);
    }

    #[test]
    fn zero_views_do_not_divide_by_zero() {
        let normalized = normalize_batch(&[RawMetrics::new(0, 3, 2), RawMetrics::new(0, 0, 0)]);
        assert!((normalized[0].engagement_rate - 5.0).abs() < EPS);
        assert!(normalized[0].engagement_rate.is_finite());
        assert!(normalized[1].engagement_rate.abs() < EPS);
        assert!(normalized[0].relative_views.abs() < EPS);
        assert!(normalized[1].relative_views.abs() < EPS);
    }

    #[test]
    fn relative_values_are_shares_of_batch_max() {
        let normalized = normalize_batch(&[
            RawMetrics::new(50_000, 4_000, 500),
            RawMetrics::new(5_000, 600, 80),
        ]);

        assert!((normalized[0].relative_views - 1.0).abs() < EPS);
        assert!((normalized[1].relative_views - 0.1).abs() < EPS);
        assert!((normalized[0].relative_likes - 1.0).abs() < EPS);
        assert!((normalized[1].relative_likes - 0.15).abs() < EPS);
        assert!((normalized[1].relative_comments - 0.16).abs() < EPS);
    }

    #[test]
    fn all_zero_batch_normalizes_to_zero() {
        let normalized = normalize_batch(&[RawMetrics::default(), RawMetrics::default()]);
        for metrics in normalized {
            assert_eq!(metrics, NormalizedMetrics::default());
        }
    }

    #[test]
    fn ratio_to_mean_reflects_batch_average() {
        let normalized = normalize_batch(&[
            RawMetrics::new(300, 30, 3),
            RawMetrics::new(100, 10, 1),
        ]);
        assert!((normalized[0].views_vs_mean - 1.5).abs() < EPS);
        assert!((normalized[1].likes_vs_mean - 0.5).abs() < EPS);
        assert!((normalized[1].comments_vs_mean - 0.5).abs() < EPS);
    }

    #[test]
    fn normalization_is_independent_of_input_order() {
        let a = RawMetrics::new(12_000, 900, 40);
        let b = RawMetrics::new(3_000, 450, 90);
        let c = RawMetrics::new(48_000, 1_200, 30);

        let forward = normalize_batch(&[a, b, c]);
        let reversed = normalize_batch(&[c, b, a]);

        assert_eq!(forward[0], reversed[2]);
        assert_eq!(forward[1], reversed[1]);
        assert_eq!(forward[2], reversed[0]);
    }

    #[test]
    fn large_counts_do_not_overflow_the_mean() {
        let stats = BatchStats::from_metrics(&[
            RawMetrics::new(u64::MAX, u64::MAX, u64::MAX),
            RawMetrics::new(u64::MAX, 0, 0),
        ]);
        assert_eq!(stats.max_views, u64::MAX);
        assert!(stats.mean_views.is_finite());
        assert!(stats.mean_views > 0.0);
    }

    #[test]
    fn empty_batch_yields_no_metrics() {
        assert!(normalize_batch(&[]).is_empty());
        assert_eq!(BatchStats::from_metrics(&[]), BatchStats::default());
    }
}
