/// Prometheusメトリクス定義。
use std::sync::Arc;
use std::time::Duration;

use prometheus::{
    Counter, Histogram, Registry, register_counter_with_registry,
    register_histogram_with_registry,
};

/// 比較エンジンのメトリクスコレクター。
#[derive(Debug, Clone)]
pub struct EngineMetrics {
    // カウンター
    pub comparisons_total: Counter,
    pub domain_incompatible_total: Counter,
    pub videos_excluded_total: Counter,
    pub comparison_failures_total: Counter,

    // ヒストグラム
    pub comparison_duration: Histogram,
}

impl EngineMetrics {
    /// 指定したレジストリにメトリクスを登録する。
    ///
    /// # Errors
    /// 同名のメトリクスが既に登録されている場合はエラーを返す。
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            comparisons_total: register_counter_with_registry!(
                "ranker_comparisons_total",
                "Total number of comparison runs that produced a result",
                registry
            )?,
            domain_incompatible_total: register_counter_with_registry!(
                "ranker_domain_incompatible_total",
                "Comparison runs rejected by the domain compatibility gate",
                registry
            )?,
            videos_excluded_total: register_counter_with_registry!(
                "ranker_videos_excluded_total",
                "Videos excluded because their upstream analysis was unavailable",
                registry
            )?,
            comparison_failures_total: register_counter_with_registry!(
                "ranker_comparison_failures_total",
                "Comparison runs aborted with a validation or insufficient-data error",
                registry
            )?,
            comparison_duration: register_histogram_with_registry!(
                "ranker_comparison_duration_seconds",
                "Duration of one comparison run",
                registry
            )?,
        })
    }

    /// 成功した比較（互換・非互換の両方）を記録する。
    pub fn record_comparison(&self, elapsed: Duration, domain_compatible: bool, excluded: usize) {
        self.comparisons_total.inc();
        if !domain_compatible {
            self.domain_incompatible_total.inc();
        }
        self.record_excluded(excluded);
        self.comparison_duration.observe(elapsed.as_secs_f64());
    }

    /// 失敗した比較を記録する。
    pub fn record_failure(&self, elapsed: Duration, excluded: usize) {
        self.comparison_failures_total.inc();
        self.record_excluded(excluded);
        self.comparison_duration.observe(elapsed.as_secs_f64());
    }

    fn record_excluded(&self, excluded: usize) {
        if excluded > 0 {
            self.videos_excluded_total.inc_by(excluded as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_outcomes() {
        let metrics = EngineMetrics::new(Arc::new(Registry::new())).expect("metrics");

        metrics.record_comparison(Duration::from_millis(5), true, 1);
        metrics.record_comparison(Duration::from_millis(3), false, 0);
        metrics.record_failure(Duration::from_millis(1), 2);

        assert!((metrics.comparisons_total.get() - 2.0).abs() < f64::EPSILON);
        assert!((metrics.domain_incompatible_total.get() - 1.0).abs() < f64::EPSILON);
        assert!((metrics.comparison_failures_total.get() - 1.0).abs() < f64::EPSILON);
        assert!((metrics.videos_excluded_total.get() - 3.0).abs() < f64::EPSILON);
        assert_eq!(metrics.comparison_duration.get_sample_count(), 3);
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = Arc::new(Registry::new());
        EngineMetrics::new(Arc::clone(&registry)).expect("first registration");
        assert!(EngineMetrics::new(registry).is_err());
    }
}
