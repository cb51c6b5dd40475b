//! Tasa rate engine
//!
//! Multi-source exchange rate aggregation for VES and CNY pairs.
//!
//! # Features
//!
//! - Prioritized upstream sources with per-call timeouts
//! - Plausibility bounds on every rate before it is served or stored
//! - Fallback chain: fresh stored rate, live sources, stored rates, default
//! - Per-source health log with 24h availability summaries
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tasa_common::RatePair;
//! use tasa_engine::{EngineConfig, HealthRecorder, PgHealthLog, PgRateStore, RateEngine};
//!
//! let store = Arc::new(PgRateStore::new(pool.clone(), RatePair::Bcv));
//! let recorder = HealthRecorder::new(Arc::new(PgHealthLog::new(pool)));
//! let engine = RateEngine::with_http_sources(
//!     RatePair::Bcv,
//!     &reqwest::Client::new(),
//!     store,
//!     recorder,
//!     EngineConfig::default(),
//! );
//!
//! let rate = engine.get_rate(false).await;
//! ```

pub mod engine;
pub mod error;
pub mod health;
pub mod providers;
pub mod source;
pub mod store;
pub mod validator;

pub use engine::{EngineConfig, RateEngine};
pub use error::{
    EngineError, EngineResult, FetchError, FetchResult, HealthRecordError, ParseError, StoreError,
    StoreResult,
};
pub use health::{Attempt, HealthLog, HealthRecorder, HealthReporter, PgHealthLog, RecordOutcome};
pub use source::{Fetcher, HttpSource, RateSource, SourceQuote, SourceSpec};
pub use store::{PgRateStore, RateStore};
pub use validator::is_valid_rate;

#[cfg(any(test, feature = "test-utils"))]
pub use health::InMemoryHealthLog;
#[cfg(any(test, feature = "test-utils"))]
pub use source::MockSource;
#[cfg(any(test, feature = "test-utils"))]
pub use store::InMemoryRateStore;
