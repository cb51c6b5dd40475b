//! Health log entries and derived per-source statistics.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownStatusError;
use crate::time::Timestamp;

/// Outcome of a single upstream fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Success,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Success => "success",
            AttemptStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = UnknownStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(AttemptStatus::Success),
            "failed" => Ok(AttemptStatus::Failed),
            other => Err(UnknownStatusError(other.to_string())),
        }
    }
}

/// One row per fetch attempt per source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthLogEntry {
    pub api_name: String,
    pub status: AttemptStatus,
    pub response_time_ms: Option<i64>,
    pub error_message: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub rate_obtained: Option<Decimal>,
    pub created_at: Timestamp,
}

impl HealthLogEntry {
    pub fn is_success(&self) -> bool {
        self.status == AttemptStatus::Success
    }
}

/// Availability classification for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Up,
    Degraded,
    Down,
}

impl ApiStatus {
    /// Success rate below this percentage is reported as degraded.
    pub const DEGRADED_BELOW_PERCENT: u64 = 70;

    /// Classify `successful` out of `total` attempts. Works on the exact
    /// counts so a displayed, rounded percentage never moves the boundary.
    pub fn from_counts(successful: u64, total: u64) -> Self {
        if successful == 0 {
            ApiStatus::Down
        } else if successful * 100 < total * Self::DEGRADED_BELOW_PERCENT {
            ApiStatus::Degraded
        } else {
            ApiStatus::Up
        }
    }
}

/// Health of one source over the trailing 24 hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiHealthStats {
    pub name: String,
    pub status: ApiStatus,
    pub success_rate_24h: f64,
    pub total_attempts_24h: u64,
    pub successful_attempts_24h: u64,
    pub last_success: Option<Timestamp>,
    pub last_failure: Option<Timestamp>,
    pub response_time_avg: Option<i64>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub current_rate: Option<Decimal>,
}

impl ApiHealthStats {
    /// Placeholder reported when stats for a source cannot be computed.
    pub fn down_stub(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ApiStatus::Down,
            success_rate_24h: 0.0,
            total_attempts_24h: 0,
            successful_attempts_24h: 0,
            last_success: None,
            last_failure: None,
            response_time_avg: None,
            current_rate: None,
        }
    }
}
