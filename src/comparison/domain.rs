//! Domain compatibility gate.
//!
//! A batch is comparable only when every pair of videos is related: the same
//! normalized subject, a relation declared in the [`SubjectTaxonomy`], or (with
//! subtopic bridging) one video's subtopic related to the other's subject.
//! A single unrelated video makes the whole batch incompatible; videos are
//! never dropped silently.
//!
//! [`SubjectTaxonomy`]: crate::config::SubjectTaxonomy

use serde::Serialize;

use crate::config::{DomainConfig, UnknownSubjectPolicy};
use crate::types::ContentDescriptor;

/// Two descriptors (by position) that failed the compatibility predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectConflict {
    pub first_index: usize,
    pub first_subject: Option<String>,
    pub second_index: usize,
    pub second_subject: Option<String>,
}

/// Outcome of the gate. Incompatibility is an expected verdict, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainVerdict {
    pub compatible: bool,
    /// Human-readable explanation when incompatible.
    pub reason: Option<String>,
    /// Offending pairs in `(i, j)`, `i < j` order.
    pub conflicts: Vec<SubjectConflict>,
}

impl DomainVerdict {
    fn compatible() -> Self {
        Self {
            compatible: true,
            reason: None,
            conflicts: Vec::new(),
        }
    }
}

struct SubjectSignal {
    subject: Option<String>,
    subtopic: Option<String>,
}

/// Decide whether the descriptors belong to one related educational domain.
///
/// Deterministic: the same descriptor sequence always yields the same verdict,
/// and the verdict itself does not depend on the order of the descriptors.
#[must_use]
pub fn check_compatibility(
    descriptors: &[&ContentDescriptor],
    config: &DomainConfig,
) -> DomainVerdict {
    let signals: Vec<SubjectSignal> = descriptors
        .iter()
        .map(|descriptor| SubjectSignal {
            subject: descriptor.subject_key(),
            subtopic: descriptor.subtopic_key(),
        })
        .collect();

    let mut conflicts = Vec::new();
    for i in 0..signals.len() {
        for j in (i + 1)..signals.len() {
            if !pair_related(&signals[i], &signals[j], config) {
                conflicts.push(SubjectConflict {
                    first_index: i,
                    first_subject: signals[i].subject.clone(),
                    second_index: j,
                    second_subject: signals[j].subject.clone(),
                });
            }
        }
    }

    if conflicts.is_empty() {
        tracing::debug!(videos = signals.len(), "domain gate passed");
        return DomainVerdict::compatible();
    }

    let reason = describe_conflicts(&conflicts);
    tracing::warn!(
        videos = signals.len(),
        conflicts = conflicts.len(),
        reason = %reason,
        "domain gate rejected batch"
    );

    DomainVerdict {
        compatible: false,
        reason: Some(reason),
        conflicts,
    }
}

fn pair_related(a: &SubjectSignal, b: &SubjectSignal, config: &DomainConfig) -> bool {
    let (Some(subject_a), Some(subject_b)) = (a.subject.as_deref(), b.subject.as_deref()) else {
        // 科目が不明な場合はポリシーに従う
        return config.unknown_subject_policy == UnknownSubjectPolicy::CompatibleWithAny;
    };

    let taxonomy = &config.related_subjects;
    if taxonomy.related(subject_a, subject_b) {
        return true;
    }

    config.subtopic_bridging
        && (a
            .subtopic
            .as_deref()
            .is_some_and(|topic| taxonomy.related(topic, subject_b))
            || b
                .subtopic
                .as_deref()
                .is_some_and(|topic| taxonomy.related(topic, subject_a)))
}

fn describe_conflicts(conflicts: &[SubjectConflict]) -> String {
    let pairs: Vec<String> = conflicts
        .iter()
        .map(|conflict| {
            format!(
                "video {} ({}) and video {} ({})",
                conflict.first_index + 1,
                subject_label(conflict.first_subject.as_deref()),
                conflict.second_index + 1,
                subject_label(conflict.second_subject.as_deref()),
            )
        })
        .collect();
    format!(
        "videos are not from related educational domains: {}",
        pairs.join("; ")
    )
}

fn subject_label(subject: Option<&str>) -> &str {
    subject.unwrap_or("unknown subject")
}
