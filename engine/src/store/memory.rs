//! In-process rate store for tests and local runs.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Duration;
use parking_lot::RwLock;
use tasa_common::{is_within, now, NewRateRecord, RateRecord, Timestamp};

use super::RateStore;
use crate::error::{StoreError, StoreResult};

/// Rate store backed by a `Vec` behind a `RwLock`.
#[derive(Default)]
pub struct InMemoryRateStore {
    records: RwLock<Vec<RateRecord>>,
    next_id: AtomicI64,
    failing_reads: AtomicBool,
    failing_writes: AtomicBool,
}

impl InMemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make reads fail with `StoreError::Unavailable`.
    pub fn set_failing_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    /// Make writes fail with `StoreError::Unavailable`.
    pub fn set_failing_writes(&self, failing: bool) {
        self.failing_writes.store(failing, Ordering::SeqCst);
    }

    /// Insert a record with an explicit timestamp, bypassing `save`.
    pub fn insert_at(&self, record: NewRateRecord, timestamp: Timestamp) -> RateRecord {
        let stored = RateRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            rate: record.rate,
            source: record.source,
            timestamp,
            is_fallback: record.is_fallback,
            raw_payload: record.raw_payload,
            created_at: timestamp,
        };
        self.records.write().push(stored.clone());
        stored
    }

    /// Snapshot of every stored record, in insertion order.
    pub fn records(&self) -> Vec<RateRecord> {
        self.records.read().clone()
    }

    fn check(&self, flag: &AtomicBool) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RateStore for InMemoryRateStore {
    async fn save(&self, record: NewRateRecord) -> StoreResult<RateRecord> {
        self.check(&self.failing_writes)?;
        Ok(self.insert_at(record, now()))
    }

    async fn latest_valid(&self, max_age: Option<Duration>) -> StoreResult<Option<RateRecord>> {
        self.check(&self.failing_reads)?;
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| !r.is_fallback)
            .filter(|r| max_age.map_or(true, |age| is_within(r.timestamp, age)))
            .max_by_key(|r| (r.timestamp, r.id))
            .cloned())
    }

    async fn latest_any(&self) -> StoreResult<Option<RateRecord>> {
        self.check(&self.failing_reads)?;
        Ok(self
            .records
            .read()
            .iter()
            .max_by_key(|r| (r.timestamp, r.id))
            .cloned())
    }

    async fn cleanup(&self, keep: usize) -> StoreResult<u64> {
        self.check(&self.failing_writes)?;
        let mut records = self.records.write();
        if records.len() <= keep {
            return Ok(0);
        }

        records.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        let deleted = records.len() - keep;
        records.truncate(keep);
        records.reverse();
        Ok(deleted as u64)
    }

    async fn count(&self) -> StoreResult<u64> {
        self.check(&self.failing_reads)?;
        Ok(self.records.read().len() as u64)
    }
}
