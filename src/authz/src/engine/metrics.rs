//! Decision metrics with Prometheus text export

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::decision::{Decision, DecisionReason};

/// Engine counters and latency percentiles
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Total number of write/execute decisions
    pub total_decisions: u64,

    pub allowed_decisions: u64,
    pub denied_decisions: u64,

    /// Allowed through the admin role
    pub admin_bypasses: u64,

    /// Allowed through self-access
    pub self_access: u64,

    /// Allowed because the owner could not be determined
    pub fail_open: u64,

    /// Decisions that failed on a store or data-access error
    pub error_count: u64,

    /// Read queries the filter restricted
    pub filtered_reads: u64,

    /// Latency percentiles of decisions
    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p99_ms: f64,

    pub avg_latency_ms: f64,
}

impl EngineMetrics {
    /// Calculate allow rate
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }
}

/// Metrics collector
pub struct MetricsCollector {
    metrics: Arc<RwLock<EngineMetrics>>,

    /// Recent latency samples for percentile calculation
    latency_samples: Arc<RwLock<Vec<f64>>>,

    max_samples: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(EngineMetrics::default())),
            latency_samples: Arc::new(RwLock::new(Vec::with_capacity(10_000))),
            max_samples: 10_000,
        }
    }

    /// Record a decision and the step that made it
    pub async fn record_decision(&self, decision: &Decision) {
        let mut metrics = self.metrics.write().await;
        metrics.total_decisions += 1;

        if decision.allowed {
            metrics.allowed_decisions += 1;
        } else {
            metrics.denied_decisions += 1;
        }

        match decision.reason {
            DecisionReason::Admin => metrics.admin_bypasses += 1,
            DecisionReason::SelfAccess => metrics.self_access += 1,
            DecisionReason::UnresolvedOwner if decision.allowed => metrics.fail_open += 1,
            _ => {}
        }
    }

    pub async fn record_filtered_read(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.filtered_reads += 1;
    }

    /// Record decision latency
    pub async fn record_latency(&self, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        let mut samples = self.latency_samples.write().await;
        samples.push(latency_ms);

        if samples.len() > self.max_samples {
            samples.drain(0..1_000);
        }

        let mut metrics = self.metrics.write().await;

        let sum: f64 = samples.iter().sum();
        metrics.avg_latency_ms = sum / samples.len() as f64;

        let mut sorted = samples.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        metrics.latency_p50_ms = Self::percentile(&sorted, 0.50);
        metrics.latency_p90_ms = Self::percentile(&sorted, 0.90);
        metrics.latency_p99_ms = Self::percentile(&sorted, 0.99);
    }

    pub async fn record_error(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.error_count += 1;
    }

    /// Get current metrics snapshot
    pub async fn get_metrics(&self) -> EngineMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn reset(&self) {
        let mut metrics = self.metrics.write().await;
        *metrics = EngineMetrics::default();

        let mut samples = self.latency_samples.write().await;
        samples.clear();
    }

    /// Export metrics in Prometheus format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.metrics.read().await;

        format!(
            r#"# HELP sacl_decisions_total Total number of authorization decisions
# TYPE sacl_decisions_total counter
sacl_decisions_total {}

# HELP sacl_allowed_total Number of allowed decisions
# TYPE sacl_allowed_total counter
sacl_allowed_total {}

# HELP sacl_denied_total Number of denied decisions
# TYPE sacl_denied_total counter
sacl_denied_total {}

# HELP sacl_fail_open_total Decisions allowed for an unresolved owner
# TYPE sacl_fail_open_total counter
sacl_fail_open_total {}

# HELP sacl_filtered_reads_total Read queries restricted by the filter
# TYPE sacl_filtered_reads_total counter
sacl_filtered_reads_total {}

# HELP sacl_decision_latency_seconds Decision latency percentiles
# TYPE sacl_decision_latency_seconds summary
sacl_decision_latency_seconds{{quantile="0.5"}} {}
sacl_decision_latency_seconds{{quantile="0.9"}} {}
sacl_decision_latency_seconds{{quantile="0.99"}} {}

# HELP sacl_errors_total Decisions failed on a store error
# TYPE sacl_errors_total counter
sacl_errors_total {}
"#,
            metrics.total_decisions,
            metrics.allowed_decisions,
            metrics.denied_decisions,
            metrics.fail_open,
            metrics.filtered_reads,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p90_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
            metrics.error_count,
        )
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = ((sorted.len() as f64) * p) as usize;
        let idx = idx.min(sorted.len() - 1);
        sorted[idx]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
