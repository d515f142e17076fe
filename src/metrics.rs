use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Install the Prometheus recorder for the process.
pub fn init_metrics() -> Result<PrometheusHandle, Box<dyn std::error::Error + Send + Sync>> {
    let handle = PrometheusBuilder::new()
        .add_global_label("service", "sso_login_service")
        .install_recorder()?;

    info!("Prometheus metrics recorder installed");
    Ok(handle)
}

/// Process-lifetime login counters.
///
/// Counters are updated independently of the state-map mutations they report;
/// a reader may observe a snapshot that is momentarily behind the map. They
/// never gate behavior.
#[derive(Debug, Default)]
pub struct LoginMetrics {
    states_issued: AtomicU64,
    states_deleted: AtomicU64,
    logins_succeeded: AtomicU64,
    logins_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub states_issued: u64,
    pub states_deleted: u64,
    pub logins_succeeded: u64,
    pub logins_failed: u64,
}

impl LoginMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_state_issued(&self) {
        self.states_issued.fetch_add(1, Ordering::Relaxed);
        counter!("login_states_issued_total").increment(1);
    }

    /// One increment per state removed, whether consumed or swept as expired.
    pub fn record_states_deleted(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.states_deleted.fetch_add(count, Ordering::Relaxed);
        counter!("login_states_deleted_total").increment(count);
    }

    pub fn record_login_success(&self) {
        self.logins_succeeded.fetch_add(1, Ordering::Relaxed);
        counter!("login_attempts_total", "result" => "success").increment(1);
    }

    pub fn record_login_failure(&self) {
        self.logins_failed.fetch_add(1, Ordering::Relaxed);
        counter!("login_attempts_total", "result" => "failure").increment(1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            states_issued: self.states_issued.load(Ordering::Relaxed),
            states_deleted: self.states_deleted.load(Ordering::Relaxed),
            logins_succeeded: self.logins_succeeded.load(Ordering::Relaxed),
            logins_failed: self.logins_failed.load(Ordering::Relaxed),
        }
    }
}
