//! Shared handler state.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use tasa_common::RatePair;
use tasa_engine::{
    EngineConfig, HealthLog, HealthRecorder, HealthReporter, PgHealthLog, PgRateStore, RateEngine,
};

use crate::metrics::{Metrics, SharedMetrics};

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    engines: Arc<HashMap<RatePair, Arc<RateEngine>>>,
    reporter: HealthReporter,
    metrics: SharedMetrics,
}

impl AppState {
    pub fn new(engines: Vec<RateEngine>, reporter: HealthReporter) -> Self {
        let engines = engines
            .into_iter()
            .map(|engine| (engine.pair(), Arc::new(engine)))
            .collect();

        Self {
            engines: Arc::new(engines),
            reporter,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Postgres-backed state with the standard HTTP sources for every pair.
    pub fn postgres(pool: PgPool, client: &reqwest::Client, config: &EngineConfig) -> Self {
        let log: Arc<dyn HealthLog> = Arc::new(PgHealthLog::new(pool.clone()));
        let recorder = HealthRecorder::new(log.clone());

        let engines = RatePair::ALL
            .into_iter()
            .map(|pair| {
                RateEngine::with_http_sources(
                    pair,
                    client,
                    Arc::new(PgRateStore::new(pool.clone(), pair)),
                    recorder.clone(),
                    config.clone(),
                )
            })
            .collect();

        Self::new(engines, HealthReporter::new(log))
    }

    pub fn engine(&self, pair: RatePair) -> Option<&Arc<RateEngine>> {
        self.engines.get(&pair)
    }

    pub fn reporter(&self) -> &HealthReporter {
        &self.reporter
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }
}
