//! Lenient decoding of content-analyzer and sentiment-extractor responses.
//!
//! Upstream language models are asked for "JSON only" but regularly wrap the
//! object in markdown fences or surround it with prose. Decoding strips the
//! fences, takes the outermost `{...}` span and parses that.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::{CommentSentiment, ContentDescriptor, Difficulty, SentimentLabel, known_text};

static JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("compile json object pattern"));

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("response does not contain a JSON object")]
    NoJsonObject,
    #[error("malformed JSON in response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Descriptor fields as emitted upstream. Key names of both prompt styles are accepted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DescriptorWire {
    subject: Option<String>,
    subtopic: Option<String>,
    #[serde(alias = "difficulty_level")]
    difficulty: Option<String>,
    #[serde(alias = "target_audience")]
    audience: Option<String>,
    prerequisites: Vec<Value>,
    #[serde(alias = "concepts", alias = "keyConcepts")]
    key_concepts: Vec<Value>,
    confidence: Option<f64>,
}

impl DescriptorWire {
    fn merge(self, other: DescriptorWire) -> DescriptorWire {
        DescriptorWire {
            subject: self.subject.or(other.subject),
            subtopic: self.subtopic.or(other.subtopic),
            difficulty: self.difficulty.or(other.difficulty),
            audience: self.audience.or(other.audience),
            prerequisites: if self.prerequisites.is_empty() {
                other.prerequisites
            } else {
                self.prerequisites
            },
            key_concepts: if self.key_concepts.is_empty() {
                other.key_concepts
            } else {
                self.key_concepts
            },
            confidence: self.confidence.or(other.confidence),
        }
    }

    fn into_descriptor(self) -> ContentDescriptor {
        ContentDescriptor {
            subject: clean_text(self.subject),
            subtopic: clean_text(self.subtopic),
            difficulty: self
                .difficulty
                .as_deref()
                .map_or(Difficulty::Unknown, Difficulty::parse_lenient),
            audience: clean_text(self.audience),
            prerequisites: clean_list(self.prerequisites),
            key_concepts: clean_list(self.key_concepts),
            confidence: self
                .confidence
                .filter(|value| value.is_finite())
                .map(|value| value.clamp(0.0, 1.0)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SentimentBatchWire {
    results: Vec<SentimentWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SentimentWire {
    sentiment: Option<String>,
    confidence: Option<String>,
}

/// Locate the JSON object inside a model response.
///
/// # Errors
/// [`DecodeError::NoJsonObject`] when no `{...}` span is present.
pub fn extract_json_object(response: &str) -> Result<&str, DecodeError> {
    let body = strip_fences(response.trim());
    JSON_OBJECT
        .find(body)
        .map(|found| found.as_str())
        .ok_or(DecodeError::NoJsonObject)
}

/// Decode one content-analysis response into a descriptor.
///
/// Blank strings and the literal "Unknown" become absent fields.
///
/// # Errors
/// Returns [`DecodeError`] when the response holds no parseable JSON object.
pub fn decode_descriptor(response: &str) -> Result<ContentDescriptor, DecodeError> {
    decode_wire(response).map(DescriptorWire::into_descriptor)
}

/// Decode and merge several partial responses (subject, difficulty, concepts ...).
///
/// Parts that fail to decode are skipped; the first part to provide a field wins.
///
/// # Errors
/// Returns the last decode error when no part could be decoded at all.
pub fn decode_descriptor_parts<S: AsRef<str>>(
    responses: &[S],
) -> Result<ContentDescriptor, DecodeError> {
    let mut merged: Option<DescriptorWire> = None;
    let mut last_error = DecodeError::NoJsonObject;

    for response in responses {
        match decode_wire(response.as_ref()) {
            Ok(wire) => {
                merged = Some(match merged {
                    Some(current) => current.merge(wire),
                    None => wire,
                });
            }
            Err(error) => {
                tracing::debug!(error = %error, "skipping undecodable analysis part");
                last_error = error;
            }
        }
    }

    merged
        .map(DescriptorWire::into_descriptor)
        .ok_or(last_error)
}

/// Decode a batch sentiment response for `expected` comments.
///
/// Results beyond `expected` are ignored. Labels map to a signed score from the
/// reported confidence (high 1.0, medium 0.6, low 0.3); unrecognised labels
/// count as neutral with score 0.
///
/// # Errors
/// Returns [`DecodeError`] when the response has no JSON object or no `results` array.
pub fn decode_comment_batch(
    response: &str,
    expected: usize,
) -> Result<Vec<CommentSentiment>, DecodeError> {
    let json = extract_json_object(response)?;
    let batch: SentimentBatchWire = serde_json::from_str(json)?;
    Ok(batch
        .results
        .into_iter()
        .take(expected)
        .map(|result| to_comment_sentiment(&result))
        .collect())
}

fn decode_wire(response: &str) -> Result<DescriptorWire, DecodeError> {
    let json = extract_json_object(response)?;
    Ok(serde_json::from_str(json)?)
}

fn strip_fences(response: &str) -> &str {
    let inner = if let Some((_, rest)) = response.split_once("```json") {
        rest
    } else if let Some((_, rest)) = response.split_once("```") {
        rest
    } else {
        return response;
    };
    inner.split_once("```").map_or(inner, |(body, _)| body)
}

fn to_comment_sentiment(result: &SentimentWire) -> CommentSentiment {
    let label = match result.sentiment.as_deref().map(|s| s.trim().to_lowercase()) {
        Some(s) if s == "positive" => SentimentLabel::Positive,
        Some(s) if s == "negative" => SentimentLabel::Negative,
        _ => SentimentLabel::Neutral,
    };
    let magnitude = match result
        .confidence
        .as_deref()
        .map(|c| c.trim().to_lowercase())
        .as_deref()
    {
        Some("high") => 1.0,
        Some("medium") => 0.6,
        _ => 0.3,
    };
    let score = match label {
        SentimentLabel::Positive => magnitude,
        SentimentLabel::Negative => -magnitude,
        SentimentLabel::Neutral => 0.0,
    };
    CommentSentiment::new(label, score)
}

fn clean_text(value: Option<String>) -> Option<String> {
    known_text(value.as_deref())?;
    value.map(|text| text.trim().to_string())
}

fn clean_list(values: Vec<Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::String(text) => Some(text),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("{\"subject\": \"calculus\"}")]
    #[case("```json\n{\"subject\": \"calculus\"}\n```")]
    #[case("```\n{\"subject\": \"calculus\"}\n```")]
    #[case("Sure! Here is the analysis: {\"subject\": \"calculus\"} Hope that helps.")]
    fn extracts_object_from_wrapped_responses(#[case] response: &str) {
        let descriptor = decode_descriptor(response).expect("should decode");
        assert_eq!(descriptor.subject.as_deref(), Some("calculus"));
    }

    #[test]
    fn missing_object_is_an_error() {
        assert!(matches!(
            decode_descriptor("I could not analyse this video."),
            Err(DecodeError::NoJsonObject)
        ));
        assert!(matches!(
            decode_descriptor("{subject: calculus}"),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn accepts_upstream_key_names() {
        let descriptor = decode_descriptor(
            r#"{
                "subject": "Physics",
                "subtopic": "Kinematics",
                "difficulty_level": "Intermediate",
                "target_audience": "first-year students",
                "prerequisites": ["algebra", " ", 3],
                "concepts": ["velocity", "acceleration"]
            }"#,
        )
        .expect("should decode");

        assert_eq!(descriptor.subject.as_deref(), Some("Physics"));
        assert_eq!(descriptor.difficulty, Difficulty::Intermediate);
        assert_eq!(descriptor.audience.as_deref(), Some("first-year students"));
        assert_eq!(descriptor.prerequisites, vec!["algebra", "3"]);
        assert_eq!(descriptor.key_concepts, vec!["velocity", "acceleration"]);
        assert_eq!(descriptor.confidence, None);
    }

    #[test]
    fn unknown_values_become_absent() {
        let descriptor = decode_descriptor(
            r#"{"subject": "Unknown", "subtopic": "", "difficulty_level": "Unknown", "target_audience": "unknown"}"#,
        )
        .expect("should decode");

        assert_eq!(descriptor.subject, None);
        assert_eq!(descriptor.subtopic, None);
        assert_eq!(descriptor.difficulty, Difficulty::Unknown);
        assert_eq!(descriptor.audience, None);
    }

    #[test]
    fn merges_partial_responses() {
        let parts = [
            r#"{"subject": "Mathematics", "subtopic": "Linear Algebra"}"#,
            "the model refused",
            r#"```json
{"difficulty_level": "beginner", "target_audience": "engineers", "prerequisites": []}
```"#,
            r#"{"concepts": ["matrix", "eigenvalue"]}"#,
        ];
        let descriptor = decode_descriptor_parts(&parts).expect("should merge");

        assert_eq!(descriptor.subject.as_deref(), Some("Mathematics"));
        assert_eq!(descriptor.subtopic.as_deref(), Some("Linear Algebra"));
        assert_eq!(descriptor.difficulty, Difficulty::Beginner);
        assert_eq!(descriptor.audience.as_deref(), Some("engineers"));
        assert!(descriptor.prerequisites.is_empty());
        assert_eq!(descriptor.key_concepts, vec!["matrix", "eigenvalue"]);
    }

    #[test]
    fn merge_fails_only_when_nothing_decodes() {
        let parts = ["no json here", "still nothing"];
        assert!(decode_descriptor_parts(&parts).is_err());
    }

    #[test]
    fn decodes_comment_batch_with_confidence_scores() {
        let response = r#"```json
{"results": [
  {"text": "great", "sentiment": "positive", "confidence": "high"},
  {"text": "meh", "sentiment": "Negative", "confidence": "medium"},
  {"text": "ok", "sentiment": "negative"},
  {"text": "?", "sentiment": "mixed", "confidence": "high"},
  {"text": "extra", "sentiment": "positive", "confidence": "high"}
]}
```"#;
        let comments = decode_comment_batch(response, 4).expect("should decode");

        assert_eq!(
            comments,
            vec![
                CommentSentiment::new(SentimentLabel::Positive, 1.0),
                CommentSentiment::new(SentimentLabel::Negative, -0.6),
                CommentSentiment::new(SentimentLabel::Negative, -0.3),
                CommentSentiment::new(SentimentLabel::Neutral, 0.0),
            ]
        );
    }

    #[test]
    fn comment_batch_without_results_is_an_error() {
        assert!(matches!(
            decode_comment_batch(r#"{"summary": "mostly positive"}"#, 3),
            Err(DecodeError::Json(_))
        ));
    }
}
