//! Request counters for service monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tasa_common::{RateResult, DEFAULT_SOURCE};

/// Service metrics.
#[derive(Default)]
pub struct Metrics {
    /// Total rate requests handled.
    pub rate_requests: AtomicU64,
    /// Rates fetched live from an upstream source.
    pub live_results: AtomicU64,
    /// Rates served from the store.
    pub stored_results: AtomicU64,
    /// Hardcoded default rates served.
    pub default_results: AtomicU64,
    /// Manual rates accepted.
    pub manual_rates: AtomicU64,
    /// Requests that ended in an error response.
    pub errors: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a served rate, classified by where it came from.
    pub fn rate_served(&self, result: &RateResult) {
        self.rate_requests.fetch_add(1, Ordering::Relaxed);
        let bucket = if result.source == DEFAULT_SOURCE {
            &self.default_results
        } else if result.from_database {
            &self.stored_results
        } else {
            &self.live_results
        };
        bucket.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an accepted manual rate.
    pub fn manual_rate(&self) {
        self.rate_requests.fetch_add(1, Ordering::Relaxed);
        self.manual_rates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an error response.
    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rate_requests: self.rate_requests.load(Ordering::Relaxed),
            live_results: self.live_results.load(Ordering::Relaxed),
            stored_results: self.stored_results.load(Ordering::Relaxed),
            default_results: self.default_results.load(Ordering::Relaxed),
            manual_rates: self.manual_rates.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP tasa_rate_requests_total Total rate requests
# TYPE tasa_rate_requests_total counter
tasa_rate_requests_total {}

# HELP tasa_live_results_total Rates fetched live from a source
# TYPE tasa_live_results_total counter
tasa_live_results_total {}

# HELP tasa_stored_results_total Rates served from the store
# TYPE tasa_stored_results_total counter
tasa_stored_results_total {}

# HELP tasa_default_results_total Default rates served
# TYPE tasa_default_results_total counter
tasa_default_results_total {}

# HELP tasa_manual_rates_total Manual rates accepted
# TYPE tasa_manual_rates_total counter
tasa_manual_rates_total {}

# HELP tasa_errors_total Error responses
# TYPE tasa_errors_total counter
tasa_errors_total {}
"#,
            snapshot.rate_requests,
            snapshot.live_results,
            snapshot.stored_results,
            snapshot.default_results,
            snapshot.manual_rates,
            snapshot.errors,
        )
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub rate_requests: u64,
    pub live_results: u64,
    pub stored_results: u64,
    pub default_results: u64,
    pub manual_rates: u64,
    pub errors: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;
