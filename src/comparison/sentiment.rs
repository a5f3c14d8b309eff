//! Per-video comment sentiment aggregation.

use crate::types::{CommentSentiment, SentimentLabel, SentimentProfile};

/// Collapse per-comment sentiment into one profile.
///
/// An empty input yields the zeroed "no data" profile (`sample_size == 0`),
/// which is distinguishable from a genuinely neutral audience. Ratios always
/// sum to 1 when there is at least one comment.
#[must_use]
pub fn aggregate_sentiment(comments: &[CommentSentiment]) -> SentimentProfile {
    if comments.is_empty() {
        return SentimentProfile::default();
    }

    let (mut positive, mut negative, mut neutral) = (0_usize, 0_usize, 0_usize);
    let mut score_sum = 0.0;
    for comment in comments {
        match comment.label {
            SentimentLabel::Positive => positive += 1,
            SentimentLabel::Negative => negative += 1,
            SentimentLabel::Neutral => neutral += 1,
        }
        score_sum += comment.score.clamp(-1.0, 1.0);
    }

    let total = comments.len() as f64;
    let positive_ratio = positive as f64 / total;
    let negative_ratio = negative as f64 / total;

    SentimentProfile {
        positive_ratio,
        negative_ratio,
        neutral_ratio: neutral as f64 / total,
        overall_score: (score_sum / total).clamp(-1.0, 1.0),
        net_sentiment: positive_ratio - negative_ratio,
        sample_size: comments.len(),
    }
}
