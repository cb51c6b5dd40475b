//! Error types shared across Tasa crates.

use thiserror::Error;

/// Returned when a rate pair name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown rate pair: {0} (expected bcv, binance or cny)")]
pub struct UnknownPairError(pub String);

/// Returned when an attempt status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown attempt status: {0}")]
pub struct UnknownStatusError(pub String);
