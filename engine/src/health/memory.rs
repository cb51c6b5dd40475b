//! In-process health log for tests and local runs.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tasa_common::{HealthLogEntry, Timestamp};

use super::HealthLog;
use crate::error::{StoreError, StoreResult};

/// Health log backed by a `DashMap` keyed by api name.
#[derive(Default)]
pub struct InMemoryHealthLog {
    entries: DashMap<String, Vec<HealthLogEntry>>,
    failing: AtomicBool,
}

impl InMemoryHealthLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Insert an entry as-is, keeping its `created_at`.
    pub fn insert(&self, entry: HealthLogEntry) {
        self.entries.entry(entry.api_name.clone()).or_default().push(entry);
    }

    /// All entries for `api_name`, in insertion order.
    pub fn entries(&self, api_name: &str) -> Vec<HealthLogEntry> {
        self.entries
            .get(api_name)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HealthLog for InMemoryHealthLog {
    async fn append(&self, entry: HealthLogEntry) -> StoreResult<()> {
        self.check()?;
        self.insert(entry);
        Ok(())
    }

    async fn entries_since(&self, api_name: &str, since: Timestamp) -> StoreResult<Vec<HealthLogEntry>> {
        self.check()?;
        let mut entries: Vec<HealthLogEntry> = self
            .entries(api_name)
            .into_iter()
            .filter(|e| e.created_at >= since)
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn latest(&self, api_name: &str) -> StoreResult<Option<HealthLogEntry>> {
        self.check()?;
        Ok(self
            .entries(api_name)
            .into_iter()
            .max_by_key(|e| e.created_at))
    }
}
