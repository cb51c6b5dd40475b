//! Tasa Common Types
//!
//! This crate contains shared types used across the Tasa exchange-rate engine,
//! including rate pairs, persisted rate records, health log entries and the
//! derived health statistics.

pub mod pair;
pub mod rate;
pub mod health;
pub mod error;
pub mod time;

pub use pair::*;
pub use rate::*;
pub use health::*;
pub use error::*;
pub use time::*;
