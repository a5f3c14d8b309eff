/// 10本の動画バッチに対する比較エンジンのベンチマーク。
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use edu_video_ranker::analyzer::decode_comment_batch;
use edu_video_ranker::comparison::normalize_batch;
use edu_video_ranker::types::{
    CommentSentiment, ContentDescriptor, Difficulty, RawMetrics, SentimentLabel, VideoInput,
};
use edu_video_ranker::ComparisonEngine;

fn synthetic_batch(videos: usize, comments: usize) -> Vec<VideoInput> {
    (0..videos)
        .map(|i| {
            let scale = (i as u64 + 1) * 1_000;
            let descriptor = ContentDescriptor {
                subject: Some(if i % 2 == 0 { "mathematics" } else { "calculus" }.to_string()),
                subtopic: Some("integration".to_string()),
                difficulty: Difficulty::Intermediate,
                audience: Some("undergraduates".to_string()),
                prerequisites: vec!["algebra".to_string()],
                key_concepts: vec!["riemann sum".to_string(), "antiderivative".to_string()],
                confidence: Some(0.5 + (i % 5) as f64 / 10.0),
            };
            let comments = (0..comments)
                .map(|j| match (i + j) % 3 {
                    0 => CommentSentiment::new(SentimentLabel::Positive, 0.6),
                    1 => CommentSentiment::new(SentimentLabel::Negative, -0.3),
                    _ => CommentSentiment::new(SentimentLabel::Neutral, 0.0),
                })
                .collect();
            VideoInput::new(
                format!("video-{i:02}"),
                descriptor,
                RawMetrics::new(scale * 10, scale / 2 + i as u64 * 7, scale / 20),
                comments,
            )
        })
        .collect()
}

fn bench_compare(c: &mut Criterion) {
    let engine = ComparisonEngine::default();
    let batch = synthetic_batch(10, 100);

    c.bench_function("compare_10_videos_100_comments", |b| {
        b.iter(|| {
            let result = engine.compare(black_box(&batch)).ok();
            black_box(result.map(|r| r.ranked_videos.len()));
        });
    });
}

fn bench_normalize(c: &mut Criterion) {
    let metrics: Vec<RawMetrics> = synthetic_batch(10, 0)
        .into_iter()
        .filter_map(|input| input.metrics)
        .collect();

    c.bench_function("normalize_batch_10", |b| {
        b.iter(|| black_box(normalize_batch(black_box(&metrics)).len()));
    });
}

fn bench_decode_sentiment(c: &mut Criterion) {
    let entries: Vec<String> = (0..20)
        .map(|i| {
            format!(
                r#"{{"text": "comment {i}", "sentiment": "{}", "confidence": "medium"}}"#,
                if i % 2 == 0 { "positive" } else { "negative" }
            )
        })
        .collect();
    let response = format!("```json\n{{\"results\": [{}]}}\n```", entries.join(","));

    c.bench_function("decode_sentiment_batch_20", |b| {
        b.iter(|| black_box(decode_comment_batch(black_box(&response), 20).map(|r| r.len())));
    });
}

criterion_group!(benches, bench_compare, bench_normalize, bench_decode_sentiment);
criterion_main!(benches);
