//! Rate persistence.
//!
//! One store per rate pair. Rows are append-only; `cleanup` bounds growth by
//! keeping only the newest rows.

use async_trait::async_trait;
use chrono::Duration;
use tasa_common::{NewRateRecord, RateRecord};

use crate::error::StoreResult;

#[cfg(any(test, feature = "test-utils"))]
mod memory;
mod postgres;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::InMemoryRateStore;
pub use postgres::PgRateStore;

/// Read/write contract the aggregator needs from a persistent store.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Persist a rate. The store assigns id and timestamps.
    async fn save(&self, record: NewRateRecord) -> StoreResult<RateRecord>;

    /// Newest non-fallback record, optionally no older than `max_age`.
    async fn latest_valid(&self, max_age: Option<Duration>) -> StoreResult<Option<RateRecord>>;

    /// Newest record of any kind.
    async fn latest_any(&self) -> StoreResult<Option<RateRecord>>;

    /// Delete all but the newest `keep` records. Returns the number deleted.
    async fn cleanup(&self, keep: usize) -> StoreResult<u64>;

    /// Number of stored records.
    async fn count(&self) -> StoreResult<u64>;
}
