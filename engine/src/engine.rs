//! The per-pair rate aggregator.

use std::sync::Arc;

use chrono::Duration;
use rand::Rng;
use rust_decimal::Decimal;
use serde_json::json;
use tasa_common::{
    constants, now, NewRateRecord, RatePair, RateRecord, RateResult, DEFAULT_SOURCE, MANUAL_SOURCE,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{EngineError, EngineResult, StoreResult};
use crate::health::HealthRecorder;
use crate::providers;
use crate::source::{Fetcher, RateSource};
use crate::store::RateStore;
use crate::validator::is_valid_rate;

/// Configuration for a rate engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Stored rates younger than this are served without fetching.
    pub freshness: Duration,
    /// Oldest stored rate re-served as a fallback when every source fails.
    pub fallback_max_age: Duration,
    /// Rows kept per table by cleanup.
    pub keep_records: usize,
    /// Chance that a successful fetch also prunes the table.
    pub cleanup_probability: f64,
    /// Per-call upstream deadline.
    pub fetch_timeout: std::time::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            freshness: constants::freshness_threshold(),
            fallback_max_age: constants::fallback_max_age(),
            keep_records: constants::KEEP_RECORDS,
            cleanup_probability: constants::CLEANUP_PROBABILITY,
            fetch_timeout: std::time::Duration::from_secs(8),
        }
    }
}

impl EngineConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.cleanup_probability) {
            return Err("Cleanup probability must be between 0 and 1".to_string());
        }

        if self.keep_records == 0 {
            return Err("Keep records cannot be 0".to_string());
        }

        if self.freshness > self.fallback_max_age {
            return Err("Freshness threshold cannot exceed fallback max age".to_string());
        }

        Ok(())
    }
}

/// Serves the best available rate for one pair.
///
/// Fallback chain, each step tried once: fresh stored rate (unless forced),
/// live sources in priority order, last valid stored rate within
/// `fallback_max_age`, latest stored rate of any kind, hardcoded default.
pub struct RateEngine {
    pair: RatePair,
    fetchers: Vec<Fetcher>,
    store: Arc<dyn RateStore>,
    config: EngineConfig,
}

impl RateEngine {
    /// Create an engine over explicit sources, highest priority first.
    pub fn new(
        pair: RatePair,
        sources: Vec<Arc<dyn RateSource>>,
        store: Arc<dyn RateStore>,
        recorder: HealthRecorder,
        config: EngineConfig,
    ) -> Self {
        let fetchers = sources
            .into_iter()
            .map(|source| Fetcher::new(pair, source, recorder.clone()))
            .collect();

        Self {
            pair,
            fetchers,
            store,
            config,
        }
    }

    /// Create an engine over the standard HTTP providers for `pair`.
    pub fn with_http_sources(
        pair: RatePair,
        client: &reqwest::Client,
        store: Arc<dyn RateStore>,
        recorder: HealthRecorder,
        config: EngineConfig,
    ) -> Self {
        let sources = providers::sources_for(pair, client, config.fetch_timeout);
        Self::new(pair, sources, store, recorder, config)
    }

    pub fn pair(&self) -> RatePair {
        self.pair
    }

    /// Configured source names, highest priority first.
    pub fn source_names(&self) -> Vec<&str> {
        self.fetchers.iter().map(|f| f.name()).collect()
    }

    pub fn store(&self) -> &Arc<dyn RateStore> {
        &self.store
    }

    /// Best available rate. Never fails: the last step needs no I/O.
    #[instrument(skip(self), fields(pair = %self.pair))]
    pub async fn get_rate(&self, force_refresh: bool) -> RateResult {
        if !force_refresh {
            if let Some(record) = self.fresh_stored().await {
                debug!(source = %record.source, age_minutes = record.age_minutes(), "Serving fresh stored rate");
                return RateResult::stored(self.pair, &record);
            }
        }

        if let Some(result) = self.fetch_live().await {
            return result;
        }

        self.serve_fallback().await
    }

    /// Persist an operator-supplied rate without consulting any source.
    #[instrument(skip(self), fields(pair = %self.pair))]
    pub async fn set_manual_rate(&self, rate: Decimal) -> EngineResult<RateResult> {
        if !is_valid_rate(self.pair, rate) {
            return Err(EngineError::InvalidRate {
                pair: self.pair,
                rate,
            });
        }

        let record = self
            .store
            .save(NewRateRecord::live(rate, MANUAL_SOURCE, json!({ "manual": true })))
            .await?;

        info!(rate = %record.rate, "Manual rate stored");
        Ok(RateResult::live(self.pair, record.rate, MANUAL_SOURCE, record.timestamp))
    }

    /// Latest stored record of any kind, for health reporting.
    pub async fn current_record(&self) -> StoreResult<Option<RateRecord>> {
        self.store.latest_any().await
    }

    async fn fresh_stored(&self) -> Option<RateRecord> {
        match self.store.latest_valid(Some(self.config.freshness)).await {
            Ok(Some(record)) if is_valid_rate(self.pair, record.rate) => Some(record),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Freshness check failed, fetching live");
                None
            }
        }
    }

    async fn fetch_live(&self) -> Option<RateResult> {
        for fetcher in &self.fetchers {
            // Failures are logged and health-recorded by the fetcher.
            let Ok(quote) = fetcher.fetch().await else {
                continue;
            };

            let source = fetcher.name().to_string();
            let timestamp = self
                .persist(NewRateRecord::live(quote.rate, source.clone(), quote.payload))
                .await
                .map(|r| r.timestamp)
                .unwrap_or_else(now);

            self.maybe_cleanup().await;

            info!(source = %source, rate = %quote.rate, "Fetched live rate");
            return Some(RateResult::live(self.pair, quote.rate, source, timestamp));
        }

        warn!(sources = self.fetchers.len(), "All sources failed");
        None
    }

    async fn serve_fallback(&self) -> RateResult {
        match self.store.latest_valid(Some(self.config.fallback_max_age)).await {
            Ok(Some(record)) if is_valid_rate(self.pair, record.rate) => {
                let age = record.age_minutes();
                self.persist(NewRateRecord::fallback(
                    record.rate,
                    record.source.clone(),
                    json!({ "fallback_of": record.id, "original_timestamp": record.timestamp }),
                ))
                .await;

                warn!(source = %record.source, age_minutes = age, "Serving last valid stored rate");
                return RateResult::stored(self.pair, &record).with_warning(format!(
                    "All sources unavailable; using last valid rate from {age} minutes ago"
                ));
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Could not read last valid rate"),
        }

        match self.store.latest_any().await {
            Ok(Some(record)) => {
                let age = record.age_minutes();
                warn!(source = %record.source, age_minutes = age, "Serving latest stored rate of any kind");
                return RateResult::stored(self.pair, &record).with_warning(format!(
                    "All sources unavailable and no recent valid rate; using stored rate from {age} minutes ago"
                ));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not read latest stored rate"),
        }

        let rate = self.pair.default_rate();
        let timestamp = self
            .persist(NewRateRecord::fallback(
                rate,
                DEFAULT_SOURCE,
                json!({ "reason": "all sources and stored rates unavailable" }),
            ))
            .await
            .map(|r| r.timestamp)
            .unwrap_or_else(now);

        warn!(rate = %rate, "Serving default rate");
        RateResult::live(self.pair, rate, DEFAULT_SOURCE, timestamp)
            .with_warning("All sources unavailable and no stored rate; using default rate")
    }

    /// Best-effort save: a failure is logged and the caller keeps serving.
    async fn persist(&self, record: NewRateRecord) -> Option<RateRecord> {
        match self.store.save(record).await {
            Ok(saved) => Some(saved),
            Err(e) => {
                warn!(error = %e, "Rate not persisted");
                None
            }
        }
    }

    async fn maybe_cleanup(&self) {
        if !self.cleanup_due() {
            return;
        }

        match self.store.cleanup(self.config.keep_records).await {
            Ok(deleted) => debug!(deleted, keep = self.config.keep_records, "Cleaned up rate table"),
            Err(e) => warn!(error = %e, "Cleanup failed"),
        }
    }

    fn cleanup_due(&self) -> bool {
        let p = self.config.cleanup_probability;
        if !p.is_finite() {
            return false;
        }
        rand::thread_rng().gen_bool(p.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::health::InMemoryHealthLog;
    use crate::source::MockSource;
    use crate::store::InMemoryRateStore;
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use tasa_common::AttemptStatus;

    struct Harness {
        engine: RateEngine,
        store: Arc<InMemoryRateStore>,
        log: Arc<InMemoryHealthLog>,
        sources: Vec<Arc<MockSource>>,
    }

    fn harness(pair: RatePair, sources: Vec<MockSource>) -> Harness {
        harness_with(pair, sources, EngineConfig { cleanup_probability: 0.0, ..Default::default() })
    }

    fn harness_with(pair: RatePair, sources: Vec<MockSource>, config: EngineConfig) -> Harness {
        let store = Arc::new(InMemoryRateStore::new());
        let log = Arc::new(InMemoryHealthLog::new());
        let sources: Vec<Arc<MockSource>> = sources.into_iter().map(Arc::new).collect();
        let dyn_sources = sources.iter().map(|s| s.clone() as Arc<dyn RateSource>).collect();

        let engine = RateEngine::new(
            pair,
            dyn_sources,
            store.clone(),
            HealthRecorder::new(log.clone()),
            config,
        );

        Harness { engine, store, log, sources }
    }

    fn timeout(name: &str) -> MockSource {
        MockSource::failing(name, FetchError::Timeout(8000))
    }

    fn stored(store: &InMemoryRateStore, rate: Decimal, source: &str, minutes_ago: i64) -> RateRecord {
        store.insert_at(
            NewRateRecord::live(rate, source, Value::Null),
            now() - Duration::minutes(minutes_ago),
        )
    }

    #[tokio::test]
    async fn test_live_rate_is_persisted() {
        let h = harness(RatePair::Bcv, vec![MockSource::ok("DolarAPI Oficial", dec!(166.58))]);

        let result = h.engine.get_rate(false).await;

        assert_eq!(result.rate, dec!(166.58));
        assert_eq!(result.source, "DolarAPI Oficial");
        assert!(!result.from_database);
        assert!(result.warning.is_none());

        let records = h.store.records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_fallback);
        assert_eq!(records[0].raw_payload["mock"], "166.58");
    }

    #[tokio::test]
    async fn test_primary_http_error_falls_through_to_monitor_source() {
        let h = harness(
            RatePair::Bcv,
            vec![
                MockSource::failing("DolarAPI Oficial", FetchError::HttpStatus(500)),
                MockSource::ok("PyDolarVe BCV", dec!(166.58)),
                MockSource::ok("ExchangeDyn BCV", dec!(170)),
            ],
        );

        let result = h.engine.get_rate(false).await;

        assert_eq!(result.rate, dec!(166.58));
        assert_eq!(result.source, "PyDolarVe BCV");
        assert!(!result.from_database);
        assert_eq!(h.sources[2].calls(), 0);

        let primary = h.log.entries("DolarAPI Oficial");
        let secondary = h.log.entries("PyDolarVe BCV");
        assert_eq!(primary.len(), 1);
        assert_eq!(primary[0].status, AttemptStatus::Failed);
        assert_eq!(secondary.len(), 1);
        assert_eq!(secondary[0].status, AttemptStatus::Success);
        assert!(h.log.entries("ExchangeDyn BCV").is_empty());
    }

    #[tokio::test]
    async fn test_fresh_stored_rate_skips_sources() {
        let h = harness(RatePair::Bcv, vec![MockSource::ok("DolarAPI Oficial", dec!(170))]);
        stored(&h.store, dec!(166.58), "DolarAPI Oficial", 10);

        let result = h.engine.get_rate(false).await;

        assert_eq!(result.rate, dec!(166.58));
        assert!(result.from_database);
        assert!(result.warning.is_none());
        assert_eq!(h.sources[0].calls(), 0);
        assert_eq!(h.store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_force_bypasses_freshness() {
        let h = harness(RatePair::Bcv, vec![MockSource::ok("DolarAPI Oficial", dec!(170))]);
        stored(&h.store, dec!(166.58), "DolarAPI Oficial", 10);

        let result = h.engine.get_rate(true).await;

        assert_eq!(result.rate, dec!(170));
        assert!(!result.from_database);
        assert_eq!(h.sources[0].calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_stored_rate_triggers_fetch() {
        let h = harness(RatePair::Bcv, vec![MockSource::ok("DolarAPI Oficial", dec!(170))]);
        stored(&h.store, dec!(166.58), "DolarAPI Oficial", 45);

        let result = h.engine.get_rate(false).await;

        assert_eq!(result.rate, dec!(170));
        assert_eq!(h.sources[0].calls(), 1);
    }

    #[tokio::test]
    async fn test_fallback_rows_never_count_as_fresh() {
        let h = harness(RatePair::Bcv, vec![MockSource::ok("DolarAPI Oficial", dec!(170))]);
        h.store.insert_at(
            NewRateRecord::fallback(dec!(166.58), "DolarAPI Oficial", Value::Null),
            now() - Duration::minutes(1),
        );

        let result = h.engine.get_rate(false).await;

        assert_eq!(result.rate, dec!(170));
        assert!(!result.from_database);
    }

    #[tokio::test]
    async fn test_all_sources_time_out_serves_recent_valid_rate() {
        let h = harness(
            RatePair::Binance,
            vec![timeout("Binance P2P"), timeout("PyDolarVe Binance"), timeout("DolarAPI Paralelo")],
        );
        stored(&h.store, dec!(238.4), "Binance P2P", 45);

        let result = h.engine.get_rate(false).await;

        assert_eq!(result.rate, dec!(238.4));
        assert_eq!(result.source, "Binance P2P");
        assert!(result.from_database);
        let age = result.age_minutes.unwrap();
        assert!((44..=46).contains(&age), "age was {age}");
        assert!(!result.warning.unwrap().is_empty());

        let records = h.store.records();
        assert_eq!(records.len(), 2);
        let fallback = &records[1];
        assert!(fallback.is_fallback);
        assert_eq!(fallback.rate, dec!(238.4));
        assert_eq!(fallback.source, "Binance P2P");

        for name in ["Binance P2P", "PyDolarVe Binance", "DolarAPI Paralelo"] {
            let entries = h.log.entries(name);
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].status, AttemptStatus::Failed);
        }
    }

    #[tokio::test]
    async fn test_all_bcv_sources_fail_reports_last_non_fallback_source() {
        let h = harness(
            RatePair::Bcv,
            vec![
                MockSource::failing("DolarAPI Oficial", FetchError::Network("connection refused".into())),
                MockSource::failing("PyDolarVe BCV", FetchError::HttpStatus(503)),
                MockSource::ok("ExchangeDyn BCV", dec!(9999)),
            ],
        );
        stored(&h.store, dec!(160), "ExchangeDyn BCV", 300);
        stored(&h.store, dec!(165), "PyDolarVe BCV", 120);
        h.store.insert_at(
            NewRateRecord::fallback(dec!(299.51), DEFAULT_SOURCE, Value::Null),
            now() - Duration::minutes(60),
        );

        let result = h.engine.get_rate(false).await;

        assert_eq!(result.source, "PyDolarVe BCV");
        assert_eq!(result.rate, dec!(165));
        assert!(result.from_database);
    }

    #[tokio::test]
    async fn test_old_rate_served_without_new_record() {
        let h = harness(RatePair::Cny, vec![timeout("ExchangeRate-API")]);
        stored(&h.store, dec!(7.21), "ExchangeRate-API", 60 * 30);

        let result = h.engine.get_rate(false).await;

        assert_eq!(result.rate, dec!(7.21));
        assert!(result.from_database);
        assert!(result.warning.is_some());
        assert_eq!(h.store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_serves_default() {
        let h = harness(
            RatePair::Bcv,
            vec![timeout("DolarAPI Oficial"), timeout("PyDolarVe BCV"), timeout("ExchangeDyn BCV")],
        );

        let result = h.engine.get_rate(false).await;

        assert_eq!(result.rate, dec!(299.51));
        assert_eq!(result.source, DEFAULT_SOURCE);
        assert!(!result.from_database);
        assert!(result.warning.is_some());

        let records = h.store.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_fallback);
        assert_eq!(records[0].source, DEFAULT_SOURCE);
    }

    #[tokio::test]
    async fn test_store_outage_still_returns_rate() {
        let h = harness(RatePair::Cny, vec![timeout("ExchangeRate-API")]);
        h.store.set_failing_reads(true);
        h.store.set_failing_writes(true);

        let result = h.engine.get_rate(false).await;

        assert_eq!(result.rate, RatePair::Cny.default_rate());
        assert_eq!(result.source, DEFAULT_SOURCE);
    }

    #[tokio::test]
    async fn test_save_failure_does_not_block_live_rate() {
        let h = harness(RatePair::Cny, vec![MockSource::ok("ExchangeRate-API", dec!(7.24))]);
        h.store.set_failing_writes(true);

        let result = h.engine.get_rate(true).await;

        assert_eq!(result.rate, dec!(7.24));
        assert!(!result.from_database);
        assert!(h.store.records().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_bounds_rate_is_never_persisted_as_live() {
        let h = harness(
            RatePair::Cny,
            vec![
                MockSource::ok("ExchangeRate-API", dec!(72.4)),
                MockSource::ok("Open ER-API", dec!(7.24)),
            ],
        );

        let result = h.engine.get_rate(true).await;

        assert_eq!(result.source, "Open ER-API");
        for record in h.store.records().iter().filter(|r| !r.is_fallback) {
            assert!(is_valid_rate(RatePair::Cny, record.rate));
        }
        assert_eq!(h.log.entries("ExchangeRate-API")[0].status, AttemptStatus::Failed);
    }

    #[tokio::test]
    async fn test_manual_rate_bypasses_sources() {
        let h = harness(RatePair::Bcv, vec![MockSource::ok("DolarAPI Oficial", dec!(170))]);

        let result = h.engine.set_manual_rate(dec!(250.0)).await.unwrap();

        assert_eq!(result.rate, dec!(250.0));
        assert_eq!(result.source, MANUAL_SOURCE);
        assert!(!result.from_database);
        assert_eq!(h.sources[0].calls(), 0);

        let records = h.store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, MANUAL_SOURCE);
        assert!(!records[0].is_fallback);
    }

    #[tokio::test]
    async fn test_manual_rate_validation_and_store_failure() {
        let h = harness(RatePair::Bcv, vec![]);

        assert!(matches!(
            h.engine.set_manual_rate(dec!(5000)).await,
            Err(EngineError::InvalidRate { .. })
        ));

        h.store.set_failing_writes(true);
        assert!(matches!(
            h.engine.set_manual_rate(dec!(250)).await,
            Err(EngineError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_runs_when_due() {
        let config = EngineConfig {
            cleanup_probability: 1.0,
            keep_records: 5,
            ..Default::default()
        };
        let h = harness_with(RatePair::Bcv, vec![MockSource::ok("DolarAPI Oficial", dec!(170))], config);
        for i in 0..10 {
            stored(&h.store, dec!(160), "DolarAPI Oficial", 60 + i);
        }

        h.engine.get_rate(true).await;

        let records = h.store.records();
        assert_eq!(records.len(), 5);
        assert!(records.iter().any(|r| r.rate == dec!(170)));
    }

    #[tokio::test]
    async fn test_unusable_cleanup_probability_never_prunes() {
        for p in [f64::NAN, f64::INFINITY, -1.0] {
            let config = EngineConfig {
                cleanup_probability: p,
                keep_records: 1,
                ..Default::default()
            };
            let h = harness_with(RatePair::Bcv, vec![MockSource::ok("DolarAPI Oficial", dec!(170))], config);
            stored(&h.store, dec!(160), "DolarAPI Oficial", 60);

            let result = h.engine.get_rate(true).await;

            assert_eq!(result.rate, dec!(170));
            assert_eq!(h.store.records().len(), 2, "probability {p} pruned");
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(EngineConfig::default().validate().is_ok());

        let config = EngineConfig { cleanup_probability: 1.5, ..Default::default() };
        assert!(config.validate().is_err());

        let config = EngineConfig { cleanup_probability: f64::NAN, ..Default::default() };
        assert!(config.validate().is_err());

        let config = EngineConfig { freshness: Duration::hours(48), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_source_names_in_priority_order() {
        let h = harness(
            RatePair::Cny,
            vec![MockSource::ok("ExchangeRate-API", dec!(7.2)), MockSource::ok("Open ER-API", dec!(7.2))],
        );
        assert_eq!(h.engine.source_names(), vec!["ExchangeRate-API", "Open ER-API"]);
    }
}
