//! fawazahmed0 currency-api: `{ "date": "...", "usd": { "cny": 7.24 } }`.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_json::Value;

use super::{decode, RawNumber};
use crate::error::ParseError;

pub const USD_URL: &str =
    "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest/v1/currencies/usd.json";

/// Rate of `quote` inside the `base` table.
pub fn parse(body: &Value, base: &str, quote: &str) -> Result<Decimal, ParseError> {
    let table = body
        .get(base)
        .ok_or_else(|| ParseError::Shape(format!("missing {base} table")))?;
    let rates: HashMap<String, RawNumber> = decode(table)?;

    rates
        .get(quote)
        .ok_or_else(|| ParseError::EntryNotFound(quote.to_string()))?
        .to_decimal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_parse_nested() {
        let body = json!({"date": "2024-05-01", "usd": {"cny": 7.2401, "eur": 0.93}});
        assert_eq!(parse(&body, "usd", "cny").unwrap(), dec!(7.2401));
    }

    #[test]
    fn test_missing_base() {
        let body = json!({"date": "2024-05-01", "eur": {"cny": 7.7}});
        assert!(matches!(parse(&body, "usd", "cny"), Err(ParseError::Shape(_))));
    }
}
