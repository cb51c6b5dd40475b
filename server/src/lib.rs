//! Tasa rate service
//!
//! HTTP front end for the rate engine: one engine per pair, sharing a
//! Postgres pool, an HTTP client and a health log.

pub mod api;
pub mod config;
pub mod metrics;
pub mod report;
pub mod state;

pub use api::router;
pub use config::ServerConfig;
pub use state::AppState;
