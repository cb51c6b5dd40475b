//! Plausibility bounds for fetched and stored rates.

use rust_decimal::Decimal;
use tasa_common::RatePair;

/// Whether `rate` is a believable value for `pair`.
///
/// VES pairs must lie strictly between 10 and 500, CNY strictly between 5 and 10.
pub fn is_valid_rate(pair: RatePair, rate: Decimal) -> bool {
    let (min, max) = pair.bounds();
    min < rate && rate < max
}
