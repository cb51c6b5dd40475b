//! Per-pair health report served by `GET /rate/health`.

use serde::Serialize;
use tasa_common::{ApiHealthStats, ApiStatus, RateRecord, Timestamp};
use tasa_engine::RateEngine;
use tracing::warn;

use crate::state::AppState;

/// Aggregate state of a pair's sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Down,
}

impl OverallStatus {
    /// Healthy if every source is up, down if every source is down.
    pub fn from_apis(apis: &[ApiHealthStats]) -> Self {
        if apis.iter().all(|a| a.status == ApiStatus::Up) {
            OverallStatus::Healthy
        } else if apis.iter().all(|a| a.status == ApiStatus::Down) {
            OverallStatus::Down
        } else {
            OverallStatus::Degraded
        }
    }
}

/// Whether the rate currently on file came from a live source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrentSourceKind {
    Api,
    Database,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentSource {
    #[serde(rename = "type")]
    pub kind: CurrentSourceKind,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: rust_decimal::Decimal,
    pub age_hours: f64,
    pub source_name: String,
}

impl From<&RateRecord> for CurrentSource {
    fn from(record: &RateRecord) -> Self {
        Self {
            kind: if record.is_fallback {
                CurrentSourceKind::Database
            } else {
                CurrentSourceKind::Api
            },
            rate: record.rate,
            age_hours: (record.age_hours() * 100.0).round() / 100.0,
            source_name: record.source.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub overall_status: OverallStatus,
    pub apis: Vec<ApiHealthStats>,
    pub current_source: Option<CurrentSource>,
    pub last_update: Option<Timestamp>,
}

impl HealthReport {
    /// Build the report for one engine. A store read failure only blanks
    /// the current source.
    pub async fn build(state: &AppState, engine: &RateEngine) -> Self {
        let apis = state.reporter().all_stats(&engine.source_names()).await;

        let current = match engine.current_record().await {
            Ok(record) => record,
            Err(e) => {
                warn!(pair = %engine.pair(), error = %e, "Current rate unavailable for health report");
                None
            }
        };

        Self {
            overall_status: OverallStatus::from_apis(&apis),
            apis,
            current_source: current.as_ref().map(CurrentSource::from),
            last_update: current.map(|r| r.timestamp),
        }
    }
}
