//! Per-source health logging and reporting.
//!
//! Every fetch attempt appends one [`HealthLogEntry`] through the
//! [`HealthRecorder`]. The recorder never fails its caller: write errors are
//! logged and reported back as [`RecordOutcome::Skipped`]. The
//! [`HealthReporter`] turns the trailing 24 hours of entries into
//! [`tasa_common::ApiHealthStats`].

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tasa_common::{AttemptStatus, HealthLogEntry, Timestamp};
use tracing::{debug, warn};

use crate::error::{HealthRecordError, StoreResult};

#[cfg(any(test, feature = "test-utils"))]
mod memory;
mod postgres;
mod reporter;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::InMemoryHealthLog;
pub use postgres::PgHealthLog;
pub use reporter::HealthReporter;

/// Append-only attempt log.
#[async_trait]
pub trait HealthLog: Send + Sync {
    /// Append one entry.
    async fn append(&self, entry: HealthLogEntry) -> StoreResult<()>;

    /// Entries for `api_name` created at or after `since`, newest first.
    async fn entries_since(&self, api_name: &str, since: Timestamp) -> StoreResult<Vec<HealthLogEntry>>;

    /// Most recent entry for `api_name`, regardless of age.
    async fn latest(&self, api_name: &str) -> StoreResult<Option<HealthLogEntry>>;
}

/// A single fetch attempt, as reported by a fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub api_name: String,
    pub status: AttemptStatus,
    pub latency_ms: Option<i64>,
    pub error_message: Option<String>,
    pub rate_obtained: Option<Decimal>,
}

impl Attempt {
    pub fn success(api_name: impl Into<String>, latency_ms: i64, rate: Decimal) -> Self {
        Self {
            api_name: api_name.into(),
            status: AttemptStatus::Success,
            latency_ms: Some(latency_ms),
            error_message: None,
            rate_obtained: Some(rate),
        }
    }

    pub fn failure(api_name: impl Into<String>, latency_ms: i64, error: impl Into<String>) -> Self {
        Self {
            api_name: api_name.into(),
            status: AttemptStatus::Failed,
            latency_ms: Some(latency_ms),
            error_message: Some(error.into()),
            rate_obtained: None,
        }
    }

    fn into_entry(self) -> HealthLogEntry {
        HealthLogEntry {
            api_name: self.api_name,
            status: self.status,
            response_time_ms: self.latency_ms,
            error_message: self.error_message,
            rate_obtained: self.rate_obtained,
            created_at: tasa_common::now(),
        }
    }
}

/// Whether a health write reached the log.
#[derive(Debug)]
pub enum RecordOutcome {
    Recorded,
    Skipped(HealthRecordError),
}

impl RecordOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, RecordOutcome::Recorded)
    }
}

/// Best-effort writer in front of a [`HealthLog`].
#[derive(Clone)]
pub struct HealthRecorder {
    log: Arc<dyn HealthLog>,
}

impl HealthRecorder {
    pub fn new(log: Arc<dyn HealthLog>) -> Self {
        Self { log }
    }

    /// Append `attempt`. Never returns an error; failures come back as `Skipped`.
    pub async fn record(&self, attempt: Attempt) -> RecordOutcome {
        let api_name = attempt.api_name.clone();
        let status = attempt.status;

        match self.log.append(attempt.into_entry()).await {
            Ok(()) => {
                debug!(api = %api_name, status = %status, "Recorded fetch attempt");
                RecordOutcome::Recorded
            }
            Err(source) => {
                let err = HealthRecordError { api_name, source };
                warn!(error = %err, "Health log write skipped");
                RecordOutcome::Skipped(err)
            }
        }
    }
}
