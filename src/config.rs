use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

/// Tolerance for "weights sum to 1".
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// Path of a YAML file holding a full [`EngineConfig`].
pub const CONFIG_PATH_ENV: &str = "RANKER_CONFIG";

/// Every tunable of the comparison engine, injected rather than hard-coded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EngineConfig {
    pub domain: DomainConfig,
    pub quality: QualityConfig,
    pub ranking: RankingWeights,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("{group} weights must sum to 1.0 (got {sum:.4})")]
    Weights { group: &'static str, sum: f64 },
    #[error("failed to read engine config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse engine config at {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl EngineConfig {
    /// `RANKER_CONFIG` が設定されていれば YAML から、なければ環境変数から読み込む。
    ///
    /// # Errors
    /// ファイルの読み込み・パース・検証に失敗した場合は [`ConfigError`] を返す。
    pub fn load() -> Result<Self, ConfigError> {
        match env::var(CONFIG_PATH_ENV) {
            Ok(raw) if !raw.trim().is_empty() => Self::from_yaml_path(Path::new(raw.trim())),
            _ => Self::from_env(),
        }
    }

    /// Start from the defaults and override individual values from the environment.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a variable does not parse or the result fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let quality = QualityConfig {
            completeness_weight: parse_f64(
                "RANKER_QUALITY_COMPLETENESS_WEIGHT",
                defaults.quality.completeness_weight,
            )?,
            confidence_weight: parse_f64(
                "RANKER_QUALITY_CONFIDENCE_WEIGHT",
                defaults.quality.confidence_weight,
            )?,
            engagement_weight: parse_f64(
                "RANKER_QUALITY_ENGAGEMENT_WEIGHT",
                defaults.quality.engagement_weight,
            )?,
            engagement_cap: parse_f64("RANKER_ENGAGEMENT_CAP", defaults.quality.engagement_cap)?,
            default_confidence: parse_f64(
                "RANKER_DEFAULT_CONFIDENCE",
                defaults.quality.default_confidence,
            )?,
        };

        let ranking = RankingWeights {
            content_quality: parse_f64(
                "RANKER_WEIGHT_CONTENT_QUALITY",
                defaults.ranking.content_quality,
            )?,
            sentiment: parse_f64("RANKER_WEIGHT_SENTIMENT", defaults.ranking.sentiment)?,
            engagement: parse_f64("RANKER_WEIGHT_ENGAGEMENT", defaults.ranking.engagement)?,
            reach: parse_f64("RANKER_WEIGHT_REACH", defaults.ranking.reach)?,
        };

        let unknown_subject_policy = match env::var("RANKER_UNKNOWN_SUBJECT_POLICY") {
            Ok(raw) => raw
                .parse::<UnknownSubjectPolicy>()
                .map_err(|message: String| ConfigError::Invalid {
                    name: "RANKER_UNKNOWN_SUBJECT_POLICY",
                    source: anyhow::anyhow!(message),
                })?,
            Err(_) => defaults.domain.unknown_subject_policy,
        };
        let subtopic_bridging =
            parse_bool("RANKER_SUBTOPIC_BRIDGING", defaults.domain.subtopic_bridging)?;

        let config = Self {
            domain: DomainConfig {
                related_subjects: defaults.domain.related_subjects,
                unknown_subject_policy,
                subtopic_bridging,
            },
            quality,
            ranking,
        };
        config.validate()?;
        Ok(config)
    }

    /// Read a full YAML document. Missing sections fall back to defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`], [`ConfigError::Deserialize`] or a validation error.
    pub fn from_yaml_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Deserialize {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        tracing::info!(path = %path.display(), "loaded engine config from YAML");
        Ok(config)
    }

    /// Check that every weight group is non-negative and sums to 1.
    ///
    /// # Errors
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.quality.validate()?;
        self.ranking.validate()
    }
}

/// How a video with no usable subject is treated by the domain gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSubjectPolicy {
    /// No signal means no basis for comparison.
    #[default]
    Incompatible,
    /// Unknown subjects are compatible with anything.
    CompatibleWithAny,
}

impl FromStr for UnknownSubjectPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "incompatible" => Ok(UnknownSubjectPolicy::Incompatible),
            "compatible_with_any" | "compatible" | "any" => {
                Ok(UnknownSubjectPolicy::CompatibleWithAny)
            }
            _ => Err(format!("unknown subject policy: {s}")),
        }
    }
}

/// Domain compatibility settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct DomainConfig {
    pub related_subjects: SubjectTaxonomy,
    pub unknown_subject_policy: UnknownSubjectPolicy,
    /// Also match one video's subtopic against another's subject.
    pub subtopic_bridging: bool,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            related_subjects: SubjectTaxonomy::default(),
            unknown_subject_policy: UnknownSubjectPolicy::Incompatible,
            subtopic_bridging: false,
        }
    }
}

/// Symmetric "related subject" relation over normalized subject keys.
///
/// Serialized as a map from subject to its related subjects; a relation
/// declared in one direction holds in both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Vec<String>>", into = "BTreeMap<String, Vec<String>>")]
pub struct SubjectTaxonomy {
    relations: BTreeMap<String, BTreeSet<String>>,
}

impl SubjectTaxonomy {
    /// An empty taxonomy: only identical subjects are compatible.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            relations: BTreeMap::new(),
        }
    }

    /// Build from `(subject, related subjects)` groups.
    pub fn from_groups<I, S, R>(groups: I) -> Self
    where
        I: IntoIterator<Item = (S, R)>,
        S: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        let mut taxonomy = Self::empty();
        for (subject, related) in groups {
            for other in related {
                taxonomy.relate(subject.as_ref(), other.as_ref());
            }
        }
        taxonomy
    }

    /// Declare `a` and `b` related (both directions).
    pub fn relate(&mut self, a: &str, b: &str) {
        let a = normalize_subject(a);
        let b = normalize_subject(b);
        if a.is_empty() || b.is_empty() || a == b {
            return;
        }
        self.relations.entry(a.clone()).or_default().insert(b.clone());
        self.relations.entry(b).or_default().insert(a);
    }

    /// Same subject, or declared related.
    #[must_use]
    pub fn related(&self, a: &str, b: &str) -> bool {
        let a = normalize_subject(a);
        let b = normalize_subject(b);
        a == b || self.relations.get(&a).is_some_and(|set| set.contains(&b))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

impl Default for SubjectTaxonomy {
    fn default() -> Self {
        Self::from_groups([
            (
                "machine learning",
                vec!["computer science", "artificial intelligence", "data science"],
            ),
            (
                "computer science",
                vec!["artificial intelligence", "data science"],
            ),
            ("artificial intelligence", vec!["data science"]),
            (
                "mathematics",
                vec!["statistics", "algebra", "calculus", "linear algebra"],
            ),
            ("statistics", vec!["data science", "probability"]),
            ("physics", vec!["mathematics", "engineering"]),
            ("chemistry", vec!["biochemistry", "chemical engineering"]),
        ])
    }
}

impl From<BTreeMap<String, Vec<String>>> for SubjectTaxonomy {
    fn from(groups: BTreeMap<String, Vec<String>>) -> Self {
        Self::from_groups(groups)
    }
}

impl From<SubjectTaxonomy> for BTreeMap<String, Vec<String>> {
    fn from(taxonomy: SubjectTaxonomy) -> Self {
        taxonomy
            .relations
            .into_iter()
            .map(|(subject, related)| (subject, related.into_iter().collect()))
            .collect()
    }
}

pub(crate) fn normalize_subject(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Weights and clamp of the content-quality scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct QualityConfig {
    pub completeness_weight: f64,
    pub confidence_weight: f64,
    pub engagement_weight: f64,
    /// Engagement rate at which the engagement contribution saturates.
    pub engagement_cap: f64,
    /// Confidence used when the analyzer reported none.
    pub default_confidence: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            completeness_weight: 0.40,
            confidence_weight: 0.30,
            engagement_weight: 0.30,
            engagement_cap: 0.10,
            default_confidence: 0.5,
        }
    }
}

impl QualityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_weight("quality.completeness_weight", self.completeness_weight)?;
        check_weight("quality.confidence_weight", self.confidence_weight)?;
        check_weight("quality.engagement_weight", self.engagement_weight)?;
        check_sum(
            "quality",
            self.completeness_weight + self.confidence_weight + self.engagement_weight,
        )?;
        if !self.engagement_cap.is_finite() || self.engagement_cap <= 0.0 {
            return Err(ConfigError::Invalid {
                name: "quality.engagement_cap",
                source: anyhow::anyhow!("must be a positive number, got {}", self.engagement_cap),
            });
        }
        if !(0.0..=1.0).contains(&self.default_confidence) {
            return Err(ConfigError::Invalid {
                name: "quality.default_confidence",
                source: anyhow::anyhow!("must be within [0, 1], got {}", self.default_confidence),
            });
        }
        Ok(())
    }

    /// `min(rate, cap) / cap`, in [0, 1].
    #[must_use]
    pub fn clamp_engagement(&self, engagement_rate: f64) -> f64 {
        if !engagement_rate.is_finite() || engagement_rate <= 0.0 {
            return 0.0;
        }
        engagement_rate.min(self.engagement_cap) / self.engagement_cap
    }
}

/// Weights of the composite ranking score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RankingWeights {
    pub content_quality: f64,
    pub sentiment: f64,
    pub engagement: f64,
    /// Weight of batch-relative views.
    pub reach: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            content_quality: 0.35,
            sentiment: 0.25,
            engagement: 0.25,
            reach: 0.15,
        }
    }
}

impl RankingWeights {
    fn validate(&self) -> Result<(), ConfigError> {
        check_weight("ranking.content_quality", self.content_quality)?;
        check_weight("ranking.sentiment", self.sentiment)?;
        check_weight("ranking.engagement", self.engagement)?;
        check_weight("ranking.reach", self.reach)?;
        check_sum(
            "ranking",
            self.content_quality + self.sentiment + self.engagement + self.reach,
        )
    }
}

fn check_weight(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("weight must be a non-negative number, got {value}"),
        })
    }
}

fn check_sum(group: &'static str, sum: f64) -> Result<(), ConfigError> {
    if (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE {
        Ok(())
    } else {
        Err(ConfigError::Weights { group, sum })
    }
}

fn parse_f64(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<f64>()
        .map_err(|error| ConfigError::Invalid {
            name,
            source: anyhow::Error::new(error),
        })
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_KEYS: &[&str] = &[
        "RANKER_CONFIG",
        "RANKER_QUALITY_COMPLETENESS_WEIGHT",
        "RANKER_QUALITY_CONFIDENCE_WEIGHT",
        "RANKER_QUALITY_ENGAGEMENT_WEIGHT",
        "RANKER_ENGAGEMENT_CAP",
        "RANKER_DEFAULT_CONFIDENCE",
        "RANKER_WEIGHT_CONTENT_QUALITY",
        "RANKER_WEIGHT_SENTIMENT",
        "RANKER_WEIGHT_ENGAGEMENT",
        "RANKER_WEIGHT_REACH",
        "RANKER_UNKNOWN_SUBJECT_POLICY",
        "RANKER_SUBTOPIC_BRIDGING",
    ];

    fn set_env(name: &str, value: &str) {
        // SAFETY: tests hold ENV_MUTEX and assign valid UTF-8 values.
        unsafe {
            env::set_var(name, value);
        }
    }

    fn reset_env() {
        for key in ENV_KEYS {
            // SAFETY: tests hold ENV_MUTEX and clean up deterministic keys.
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().expect("defaults should validate");
        assert_eq!(
            config.domain.unknown_subject_policy,
            UnknownSubjectPolicy::Incompatible
        );
        assert!(!config.domain.subtopic_bridging);
    }

    #[test]
    fn from_env_uses_defaults_when_unset() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();

        let config = EngineConfig::from_env().expect("config should load");

        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn from_env_overrides_values() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("RANKER_WEIGHT_CONTENT_QUALITY", "0.4");
        set_env("RANKER_WEIGHT_SENTIMENT", "0.2");
        set_env("RANKER_WEIGHT_ENGAGEMENT", "0.2");
        set_env("RANKER_WEIGHT_REACH", "0.2");
        set_env("RANKER_ENGAGEMENT_CAP", "0.05");
        set_env("RANKER_UNKNOWN_SUBJECT_POLICY", "compatible_with_any");
        set_env("RANKER_SUBTOPIC_BRIDGING", "yes");

        let config = EngineConfig::from_env().expect("config should load");
        reset_env();

        assert!((config.ranking.content_quality - 0.4).abs() < f64::EPSILON);
        assert!((config.ranking.reach - 0.2).abs() < f64::EPSILON);
        assert!((config.quality.engagement_cap - 0.05).abs() < f64::EPSILON);
        assert_eq!(
            config.domain.unknown_subject_policy,
            UnknownSubjectPolicy::CompatibleWithAny
        );
        assert!(config.domain.subtopic_bridging);
    }

    #[test]
    fn from_env_rejects_weights_not_summing_to_one() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("RANKER_WEIGHT_REACH", "0.5");

        let error = EngineConfig::from_env().expect_err("weights should be rejected");
        reset_env();

        assert!(matches!(error, ConfigError::Weights { group: "ranking", .. }));
    }

    #[test]
    fn from_env_rejects_unparseable_number() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("RANKER_ENGAGEMENT_CAP", "lots");

        let error = EngineConfig::from_env().expect_err("cap should be rejected");
        reset_env();

        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "RANKER_ENGAGEMENT_CAP",
                ..
            }
        ));
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut config = EngineConfig::default();
        config.ranking.sentiment = -0.25;
        config.ranking.content_quality = 0.85;

        let error = config.validate().expect_err("negative weight should fail");
        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "ranking.sentiment",
                ..
            }
        ));
    }

    #[test]
    fn zero_engagement_cap_is_rejected() {
        let mut config = EngineConfig::default();
        config.quality.engagement_cap = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn taxonomy_is_symmetric_and_normalized() {
        let taxonomy = SubjectTaxonomy::default();
        assert!(taxonomy.related("Machine Learning", "data science"));
        assert!(taxonomy.related("data science", "machine learning"));
        assert!(taxonomy.related("  Calculus ", "mathematics"));
        assert!(taxonomy.related("calculus", "calculus"));
        assert!(!taxonomy.related("calculus", "statistics"));
        assert!(!taxonomy.related("organic chemistry", "music theory"));
    }

    #[test]
    fn taxonomy_round_trips_through_yaml_map() {
        let yaml = "music theory:\n  - Composition\n";
        let taxonomy: SubjectTaxonomy = serde_yaml::from_str(yaml).expect("yaml should parse");
        assert!(taxonomy.related("composition", "music theory"));
        assert_eq!(taxonomy.len(), 2);
    }

    #[test]
    fn clamp_engagement_saturates_at_cap() {
        let quality = QualityConfig::default();
        assert!((quality.clamp_engagement(0.05) - 0.5).abs() < 1e-12);
        assert!((quality.clamp_engagement(0.5) - 1.0).abs() < 1e-12);
        assert!(quality.clamp_engagement(0.0).abs() < 1e-12);
        assert!(quality.clamp_engagement(f64::NAN).abs() < 1e-12);
    }

    #[test]
    fn unknown_subject_policy_parses() {
        assert_eq!(
            "Incompatible".parse::<UnknownSubjectPolicy>(),
            Ok(UnknownSubjectPolicy::Incompatible)
        );
        assert_eq!(
            "any".parse::<UnknownSubjectPolicy>(),
            Ok(UnknownSubjectPolicy::CompatibleWithAny)
        );
        assert!("sometimes".parse::<UnknownSubjectPolicy>().is_err());
    }
}
