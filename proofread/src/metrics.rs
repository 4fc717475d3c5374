use std::collections::VecDeque;

use serde::Serialize;

use crate::utils::now_epoch_ms;

const DEFAULT_WINDOW_SIZE: usize = 128;
const ANALYSIS_P95_TARGET_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub samples: usize,
    pub average_ms: u64,
    pub p95_ms: u64,
    pub max_ms: u64,
}

impl MetricSummary {
    fn empty() -> Self {
        Self {
            samples: 0,
            average_ms: 0,
            p95_ms: 0,
            max_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub generated_at_ms: u64,
    pub analysis_latency: MetricSummary,
    pub snapshots_accepted: u64,
    pub snapshots_rejected: u64,
    pub snapshots_superseded: u64,
    pub analyses_completed: u64,
    pub analyses_degraded: u64,
    pub analyses_failed: u64,
    pub discarded_after_stop: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub storage_failures: u64,
    pub source_errors: u64,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
struct RollingMetric {
    values: VecDeque<u64>,
    capacity: usize,
}

impl RollingMetric {
    fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn record(&mut self, value_ms: u64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value_ms);
    }

    fn summary(&self) -> MetricSummary {
        if self.values.is_empty() {
            return MetricSummary::empty();
        }

        let samples = self.values.len();
        let sum: u64 = self.values.iter().sum();
        let average_ms = sum / samples as u64;
        let max_ms = self.values.iter().copied().max().unwrap_or(0);

        let mut sorted = self.values.iter().copied().collect::<Vec<_>>();
        sorted.sort_unstable();
        let p95_index = ((samples as f64 * 0.95).ceil() as usize)
            .saturating_sub(1)
            .min(samples - 1);

        MetricSummary {
            samples,
            average_ms,
            p95_ms: sorted[p95_index],
            max_ms,
        }
    }
}

/// Counters and latency window for one monitor.
#[derive(Debug)]
pub struct PipelineMetrics {
    analysis_ms: RollingMetric,
    snapshots_accepted: u64,
    snapshots_rejected: u64,
    snapshots_superseded: u64,
    analyses_completed: u64,
    analyses_degraded: u64,
    analyses_failed: u64,
    discarded_after_stop: u64,
    notifications_sent: u64,
    notifications_failed: u64,
    storage_failures: u64,
    source_errors: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            analysis_ms: RollingMetric::new(DEFAULT_WINDOW_SIZE),
            snapshots_accepted: 0,
            snapshots_rejected: 0,
            snapshots_superseded: 0,
            analyses_completed: 0,
            analyses_degraded: 0,
            analyses_failed: 0,
            discarded_after_stop: 0,
            notifications_sent: 0,
            notifications_failed: 0,
            storage_failures: 0,
            source_errors: 0,
        }
    }

    pub fn record_accepted(&mut self) {
        self.snapshots_accepted += 1;
    }

    /// Length and emptiness rejections. Duplicates are the steady state of a
    /// polled source and are not counted.
    pub fn record_rejected(&mut self) {
        self.snapshots_rejected += 1;
    }

    pub fn record_superseded(&mut self) {
        self.snapshots_superseded += 1;
    }

    pub fn record_analysis(&mut self, latency_ms: u64, degraded: bool) {
        self.analysis_ms.record(latency_ms);
        self.analyses_completed += 1;
        if degraded {
            self.analyses_degraded += 1;
        }
    }

    pub fn record_analysis_failure(&mut self, latency_ms: u64) {
        self.analysis_ms.record(latency_ms);
        self.analyses_failed += 1;
    }

    pub fn record_discarded(&mut self) {
        self.discarded_after_stop += 1;
    }

    pub fn record_notification(&mut self, delivered: bool) {
        if delivered {
            self.notifications_sent += 1;
        } else {
            self.notifications_failed += 1;
        }
    }

    pub fn record_storage_failure(&mut self) {
        self.storage_failures += 1;
    }

    pub fn record_source_error(&mut self) {
        self.source_errors += 1;
    }

    pub fn report(&self) -> MetricsReport {
        let analysis_latency = self.analysis_ms.summary();

        let mut warnings = Vec::new();
        if self.analyses_failed > 0 {
            warnings.push(format!(
                "{} analysis requests failed; check the correction endpoint.",
                self.analyses_failed
            ));
        }
        if self.analyses_degraded > 0 {
            warnings.push(format!(
                "{} responses could not be parsed and were stored as clean results.",
                self.analyses_degraded
            ));
        }
        if self.storage_failures > 0 {
            warnings.push(format!(
                "Failed to persist report history {} times.",
                self.storage_failures
            ));
        }
        if self.notifications_failed > 0 {
            warnings.push(format!(
                "{} notifications could not be delivered.",
                self.notifications_failed
            ));
        }
        if analysis_latency.samples > 0 && analysis_latency.p95_ms > ANALYSIS_P95_TARGET_MS {
            warnings.push(format!(
                "Analysis P95 latency {}ms exceeded target {}ms.",
                analysis_latency.p95_ms, ANALYSIS_P95_TARGET_MS
            ));
        }

        MetricsReport {
            generated_at_ms: now_epoch_ms(),
            analysis_latency,
            snapshots_accepted: self.snapshots_accepted,
            snapshots_rejected: self.snapshots_rejected,
            snapshots_superseded: self.snapshots_superseded,
            analyses_completed: self.analyses_completed,
            analyses_degraded: self.analyses_degraded,
            analyses_failed: self.analyses_failed,
            discarded_after_stop: self.discarded_after_stop,
            notifications_sent: self.notifications_sent,
            notifications_failed: self.notifications_failed,
            storage_failures: self.storage_failures,
            source_errors: self.source_errors,
            warnings,
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
