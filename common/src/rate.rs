//! Rate records and aggregator results.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pair::RatePair;
use crate::time::{age_minutes, Timestamp};

/// A persisted rate. Append-only, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    /// Store-assigned row id.
    pub id: i64,
    /// The rate value.
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    /// Provider name, `Manual`, or the default label.
    pub source: String,
    /// When the rate was recorded.
    pub timestamp: Timestamp,
    /// True for stale copies and synthetic defaults.
    pub is_fallback: bool,
    /// Raw provider response (or fallback context).
    pub raw_payload: serde_json::Value,
    /// Row insertion time.
    pub created_at: Timestamp,
}

impl RateRecord {
    /// Whole minutes elapsed since `timestamp`.
    pub fn age_minutes(&self) -> i64 {
        age_minutes(self.timestamp)
    }

    /// Hours elapsed since `timestamp`, with fractional part.
    pub fn age_hours(&self) -> f64 {
        self.age_minutes() as f64 / 60.0
    }
}

/// A rate to be persisted. The store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRateRecord {
    pub rate: Decimal,
    pub source: String,
    pub is_fallback: bool,
    pub raw_payload: serde_json::Value,
}

impl NewRateRecord {
    /// A rate accepted from a live source or an operator.
    pub fn live(rate: Decimal, source: impl Into<String>, raw_payload: serde_json::Value) -> Self {
        Self {
            rate,
            source: source.into(),
            is_fallback: false,
            raw_payload,
        }
    }

    /// A stale or synthetic rate served in degraded mode.
    pub fn fallback(rate: Decimal, source: impl Into<String>, raw_payload: serde_json::Value) -> Self {
        Self {
            rate,
            source: source.into(),
            is_fallback: true,
            raw_payload,
        }
    }
}

/// What the aggregator hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateResult {
    /// Pair this rate belongs to.
    pub pair: RatePair,
    /// The rate value.
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    /// Where the rate came from.
    pub source: String,
    /// When the rate was obtained.
    pub timestamp: DateTime<Utc>,
    /// True when the rate was read back from the store instead of fetched.
    pub from_database: bool,
    /// Age of a stored rate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_minutes: Option<i64>,
    /// Present whenever the rate is served in degraded mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl RateResult {
    /// A rate fetched live or injected by an operator.
    pub fn live(pair: RatePair, rate: Decimal, source: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            pair,
            rate,
            source: source.into(),
            timestamp,
            from_database: false,
            age_minutes: None,
            warning: None,
        }
    }

    /// A rate read back from the store.
    pub fn stored(pair: RatePair, record: &RateRecord) -> Self {
        Self {
            pair,
            rate: record.rate,
            source: record.source.clone(),
            timestamp: record.timestamp,
            from_database: true,
            age_minutes: Some(record.age_minutes()),
            warning: None,
        }
    }

    /// Attach a degraded-mode warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}
