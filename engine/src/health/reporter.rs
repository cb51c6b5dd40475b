//! Rolling 24-hour health statistics per source.

use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;
use tasa_common::{constants, window_start, ApiHealthStats, ApiStatus, HealthLogEntry};
use tracing::{instrument, warn};

use super::HealthLog;
use crate::error::StoreResult;

/// Reads the health log and derives [`ApiHealthStats`].
#[derive(Clone)]
pub struct HealthReporter {
    log: Arc<dyn HealthLog>,
    window: Duration,
}

impl HealthReporter {
    pub fn new(log: Arc<dyn HealthLog>) -> Self {
        Self {
            log,
            window: constants::health_window(),
        }
    }

    /// Stats for one source over the trailing window.
    ///
    /// A source with no attempts in the window is judged on its single most
    /// recent entry, however old, so an idle source is not reported as silent.
    #[instrument(skip(self))]
    pub async fn stats(&self, api_name: &str) -> StoreResult<ApiHealthStats> {
        let mut entries = self
            .log
            .entries_since(api_name, window_start(self.window))
            .await?;

        if entries.is_empty() {
            if let Some(latest) = self.log.latest(api_name).await? {
                entries.push(latest);
            }
        }

        Ok(summarize(api_name, &entries))
    }

    /// Stats for every source in `api_names`, computed concurrently.
    ///
    /// A source whose computation fails is reported as a `down` stub.
    pub async fn all_stats(&self, api_names: &[&str]) -> Vec<ApiHealthStats> {
        let results = join_all(api_names.iter().map(|name| self.stats(name))).await;

        api_names
            .iter()
            .zip(results)
            .map(|(name, result)| {
                result.unwrap_or_else(|e| {
                    warn!(api = %name, error = %e, "Health stats unavailable, reporting down");
                    ApiHealthStats::down_stub(*name)
                })
            })
            .collect()
    }
}

/// Fold `entries` (any order) into stats for `api_name`.
pub(crate) fn summarize(api_name: &str, entries: &[HealthLogEntry]) -> ApiHealthStats {
    let total = entries.len() as u64;
    let successful = entries.iter().filter(|e| e.is_success()).count() as u64;

    // Display only; classification uses the counts.
    let success_rate = if total == 0 {
        0.0
    } else {
        ((successful as f64 / total as f64) * 1000.0).round() / 10.0
    };

    let last_success = entries.iter().filter(|e| e.is_success()).max_by_key(|e| e.created_at);
    let last_failure = entries
        .iter()
        .filter(|e| !e.is_success())
        .map(|e| e.created_at)
        .max();

    let latencies: Vec<i64> = entries.iter().filter_map(|e| e.response_time_ms).collect();
    let response_time_avg = if latencies.is_empty() {
        None
    } else {
        Some(latencies.iter().sum::<i64>() / latencies.len() as i64)
    };

    ApiHealthStats {
        name: api_name.to_string(),
        status: ApiStatus::from_counts(successful, total),
        success_rate_24h: success_rate,
        total_attempts_24h: total,
        successful_attempts_24h: successful,
        last_success: last_success.map(|e| e.created_at),
        last_failure,
        response_time_avg,
        current_rate: last_success.and_then(|e| e.rate_obtained),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::InMemoryHealthLog;
    use rust_decimal_macros::dec;
    use tasa_common::{now, AttemptStatus};

    fn entry(api: &str, ok: bool, minutes_ago: i64, latency: i64) -> HealthLogEntry {
        HealthLogEntry {
            api_name: api.to_string(),
            status: if ok { AttemptStatus::Success } else { AttemptStatus::Failed },
            response_time_ms: Some(latency),
            error_message: (!ok).then(|| "HTTP status 500".to_string()),
            rate_obtained: ok.then(|| dec!(166.58) + rust_decimal::Decimal::from(minutes_ago)),
            created_at: now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_classification_thresholds() {
        let down: Vec<_> = (0..4).map(|i| entry("a", false, i, 100)).collect();
        assert_eq!(summarize("a", &down).status, ApiStatus::Down);

        // 2 of 3 = 66.7%
        let degraded = vec![entry("a", true, 1, 100), entry("a", true, 2, 100), entry("a", false, 3, 100)];
        let stats = summarize("a", &degraded);
        assert_eq!(stats.status, ApiStatus::Degraded);
        assert_eq!(stats.success_rate_24h, 66.7);

        // 7 of 10 = 70%
        let up: Vec<_> = (0..10).map(|i| entry("a", i < 7, i, 100)).collect();
        let stats = summarize("a", &up);
        assert_eq!(stats.status, ApiStatus::Up);
        assert_eq!(stats.success_rate_24h, 70.0);
    }

    #[test]
    fn test_rounded_rate_does_not_move_classification() {
        // 1399 of 2000 = 69.95%, displayed as 70.0
        let almost: Vec<_> = (0..2000).map(|i| entry("a", i < 1399, i % 60, 100)).collect();
        let stats = summarize("a", &almost);
        assert_eq!(stats.success_rate_24h, 70.0);
        assert_eq!(stats.status, ApiStatus::Degraded);

        // 1 of 2001 displays as 0.0 but is not down
        let rare: Vec<_> = (0..2001).map(|i| entry("a", i == 0, i % 60, 100)).collect();
        let stats = summarize("a", &rare);
        assert_eq!(stats.success_rate_24h, 0.0);
        assert_eq!(stats.status, ApiStatus::Degraded);
    }

    #[test]
    fn test_summary_fields() {
        let entries = vec![
            entry("a", true, 10, 100),
            entry("a", false, 5, 300),
            entry("a", true, 20, 200),
        ];
        let stats = summarize("a", &entries);

        assert_eq!(stats.total_attempts_24h, 3);
        assert_eq!(stats.successful_attempts_24h, 2);
        assert_eq!(stats.response_time_avg, Some(200));
        // Most recent success is the one 10 minutes ago.
        assert_eq!(stats.current_rate, Some(dec!(176.58)));
        assert_eq!(stats.last_success, Some(entries[0].created_at));
        assert_eq!(stats.last_failure, Some(entries[1].created_at));
    }

    #[test]
    fn test_empty_summary_is_down() {
        let stats = summarize("idle", &[]);
        assert_eq!(stats.status, ApiStatus::Down);
        assert_eq!(stats.total_attempts_24h, 0);
        assert!(stats.response_time_avg.is_none());
    }

    #[tokio::test]
    async fn test_stats_uses_window() {
        let log = Arc::new(InMemoryHealthLog::new());
        log.insert(entry("DolarAPI Oficial", true, 30, 100));
        log.insert(entry("DolarAPI Oficial", false, 60 * 30, 100));

        let stats = HealthReporter::new(log).stats("DolarAPI Oficial").await.unwrap();

        assert_eq!(stats.total_attempts_24h, 1);
        assert_eq!(stats.status, ApiStatus::Up);
    }

    #[tokio::test]
    async fn test_stats_falls_back_to_latest_entry() {
        let log = Arc::new(InMemoryHealthLog::new());
        log.insert(entry("ExchangeDyn BCV", true, 60 * 72, 100));
        log.insert(entry("ExchangeDyn BCV", false, 60 * 48, 400));

        let stats = HealthReporter::new(log).stats("ExchangeDyn BCV").await.unwrap();

        assert_eq!(stats.total_attempts_24h, 1);
        assert_eq!(stats.status, ApiStatus::Down);
        assert_eq!(stats.response_time_avg, Some(400));
    }

    #[tokio::test]
    async fn test_all_stats_substitutes_down_stub() {
        let log = Arc::new(InMemoryHealthLog::new());
        log.insert(entry("Binance P2P", true, 1, 100));
        log.set_failing(true);

        let reporter = HealthReporter::new(log);
        let stats = reporter.all_stats(&["Binance P2P", "PyDolarVe Binance"]).await;

        assert_eq!(stats.len(), 2);
        assert!(stats.iter().all(|s| s.status == ApiStatus::Down));
        assert_eq!(stats[0].name, "Binance P2P");
        assert_eq!(stats[1].name, "PyDolarVe Binance");
    }

    #[tokio::test]
    async fn test_all_stats_preserves_order() {
        let log = Arc::new(InMemoryHealthLog::new());
        log.insert(entry("Open ER-API", true, 1, 100));

        let reporter = HealthReporter::new(log);
        let stats = reporter.all_stats(&["ExchangeRate-API", "Open ER-API"]).await;

        assert_eq!(stats[0].status, ApiStatus::Down);
        assert_eq!(stats[1].status, ApiStatus::Up);
    }
}
