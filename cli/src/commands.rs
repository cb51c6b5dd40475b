//! Operator commands, one engine per pair.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tasa_common::{ApiHealthStats, RatePair, RateRecord, RateResult};
use tasa_engine::{
    EngineConfig, HealthLog, HealthRecorder, HealthReporter, PgHealthLog, PgRateStore, RateEngine,
};
use tracing::info;

/// Health summary printed by `tasa health`.
#[derive(Debug, Serialize)]
pub struct PairHealth {
    pub pair: RatePair,
    pub apis: Vec<ApiHealthStats>,
    pub latest: Option<RateRecord>,
}

/// Result printed by `tasa cleanup`.
#[derive(Debug, Serialize)]
pub struct CleanupReport {
    pub pair: RatePair,
    pub deleted: u64,
    pub remaining: u64,
}

pub struct Operator {
    engines: Vec<RateEngine>,
    reporter: HealthReporter,
}

impl Operator {
    pub fn new(engines: Vec<RateEngine>, reporter: HealthReporter) -> Self {
        Self { engines, reporter }
    }

    /// Operator over Postgres with the standard HTTP sources.
    pub fn postgres(pool: PgPool, client: reqwest::Client, timeout: Duration) -> Self {
        let config = EngineConfig {
            fetch_timeout: timeout,
            cleanup_probability: 0.0,
            ..Default::default()
        };
        let log: Arc<dyn HealthLog> = Arc::new(PgHealthLog::new(pool.clone()));
        let recorder = HealthRecorder::new(log.clone());

        let engines = RatePair::ALL
            .into_iter()
            .map(|pair| {
                RateEngine::with_http_sources(
                    pair,
                    &client,
                    Arc::new(PgRateStore::new(pool.clone(), pair)),
                    recorder.clone(),
                    config.clone(),
                )
            })
            .collect();

        Self::new(engines, HealthReporter::new(log))
    }

    fn engine(&self, pair: RatePair) -> anyhow::Result<&RateEngine> {
        self.engines
            .iter()
            .find(|e| e.pair() == pair)
            .ok_or_else(|| anyhow!("No engine configured for {pair}"))
    }

    pub async fn rate(&self, pair: RatePair, force: bool) -> anyhow::Result<RateResult> {
        Ok(self.engine(pair)?.get_rate(force).await)
    }

    pub async fn manual(&self, pair: RatePair, rate: Decimal) -> anyhow::Result<RateResult> {
        let result = self
            .engine(pair)?
            .set_manual_rate(rate)
            .await
            .with_context(|| format!("Could not store manual {pair} rate"))?;
        info!(pair = %pair, rate = %rate, "Manual rate stored");
        Ok(result)
    }

    pub async fn health(&self, pair: RatePair) -> anyhow::Result<PairHealth> {
        let engine = self.engine(pair)?;
        let apis = self.reporter.all_stats(&engine.source_names()).await;
        let latest = engine.current_record().await?;
        Ok(PairHealth { pair, apis, latest })
    }

    pub async fn cleanup(&self, pair: RatePair, keep: usize) -> anyhow::Result<CleanupReport> {
        if keep == 0 {
            return Err(anyhow!("--keep must be at least 1"));
        }
        let store = self.engine(pair)?.store();
        let deleted = store.cleanup(keep).await?;
        let remaining = store.count().await?;
        info!(pair = %pair, deleted, remaining, "Cleanup finished");
        Ok(CleanupReport {
            pair,
            deleted,
            remaining,
        })
    }
}
