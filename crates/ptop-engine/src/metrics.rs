use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;

/// Refresh loop counters, safe for concurrent access.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
    /// Finished node/GPU cycles, degraded ones included.
    pub node_cycles_total: AtomicU64,
    pub node_cycles_degraded: AtomicU64,
    /// Finished job-listing cycles, degraded ones included.
    pub job_cycles_total: AtomicU64,
    pub job_cycles_degraded: AtomicU64,
    pub command_failures_total: AtomicU64,
    pub parse_failures_total: AtomicU64,
    pub missing_hosts_total: AtomicU64,
    pub extraction_failures_total: AtomicU64,
}

impl RefreshMetrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> String {
        let counters = [
            (
                "ptop_node_cycles_total",
                "Finished node refresh cycles.",
                &self.node_cycles_total,
            ),
            (
                "ptop_node_cycles_degraded_total",
                "Node refresh cycles that published degraded data.",
                &self.node_cycles_degraded,
            ),
            (
                "ptop_job_cycles_total",
                "Finished job listing refresh cycles.",
                &self.job_cycles_total,
            ),
            (
                "ptop_job_cycles_degraded_total",
                "Job listing refresh cycles that published degraded data.",
                &self.job_cycles_degraded,
            ),
            (
                "ptop_command_failures_total",
                "Inspection commands that failed to run or exited abnormally.",
                &self.command_failures_total,
            ),
            (
                "ptop_parse_failures_total",
                "Inspection outputs that were not a recognisable table.",
                &self.parse_failures_total,
            ),
            (
                "ptop_missing_hosts_total",
                "Requested hosts absent from the node inventory.",
                &self.missing_hosts_total,
            ),
            (
                "ptop_extraction_failures_total",
                "Malformed node or job fields that were skipped.",
                &self.extraction_failures_total,
            ),
        ];

        let mut body = String::new();
        for (name, help, value) in counters {
            body.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {}\n",
                value.load(Ordering::Relaxed)
            ));
        }
        body
    }
}

/// GET /metrics
pub async fn metrics_handler(State(metrics): State<Arc<RefreshMetrics>>) -> impl IntoResponse {
    (axum::http::StatusCode::OK, metrics.render())
}

/// GET /healthz
pub async fn healthz_handler() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "ok")
}
