//! Rate engine error types.

use rust_decimal::Decimal;
use tasa_common::RatePair;
use thiserror::Error;

/// A provider response that could not be turned into a rate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The response did not have the expected structure.
    #[error("Unexpected response shape: {0}")]
    Shape(String),

    /// No entry matched the configured code or title.
    #[error("No entry matching {0:?}")]
    EntryNotFound(String),

    /// A price field could not be read as a number.
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    /// The listing contained no usable offers.
    #[error("No offers in listing")]
    NoOffers,
}

/// Errors from a single upstream source. Recovered by the aggregator.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Connection or transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The per-call deadline elapsed.
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// Upstream answered with a non-2xx status.
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Upstream body could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Parsed rate failed the pair's plausibility bounds.
    #[error("Rate {rate} out of bounds for {pair}")]
    OutOfBounds { pair: RatePair, rate: Decimal },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => FetchError::HttpStatus(status.as_u16()),
            None => FetchError::Network(e.to_string()),
        }
    }
}

/// Persistence or query failure against the rate store or health log.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database returned an error.
    #[error("Database error: {0}")]
    Database(String),

    /// A row could not be mapped to a domain type.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// The store is switched off or unreachable.
    #[error("Store unavailable")]
    Unavailable,
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
                StoreError::CorruptRow(e.to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => StoreError::Unavailable,
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// A health log write that did not happen. Always swallowed by the recorder.
#[derive(Debug, Error)]
#[error("Failed to record health for {api_name}: {source}")]
pub struct HealthRecordError {
    pub api_name: String,
    #[source]
    pub source: StoreError,
}

/// Errors surfaced by the engine to its caller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A manual rate failed the pair's plausibility bounds.
    #[error("Rate {rate} is not valid for {pair}")]
    InvalidRate { pair: RatePair, rate: Decimal },

    /// The store rejected a write the caller depends on.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for source fetches.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
