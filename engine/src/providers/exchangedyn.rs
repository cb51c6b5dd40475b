//! ExchangeDyn quotes: nested objects keyed by source code.
//!
//! ```json
//! {"sources": {"BCV": {"quote": "166.58", "last_retrieved": "..."}}}
//! ```

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::{decode, RawNumber};
use crate::error::ParseError;

pub const BCV_URL: &str = "https://api.exchangedyn.com/markets/quotes/usdves/bcv";

pub const BCV_CODE: &str = "BCV";

#[derive(Debug, Deserialize)]
struct Response {
    sources: HashMap<String, Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    quote: RawNumber,
}

pub fn parse(body: &Value, code: &str) -> Result<Decimal, ParseError> {
    let response: Response = decode(body)?;

    response
        .sources
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(code))
        .map(|(_, quote)| &quote.quote)
        .ok_or_else(|| ParseError::EntryNotFound(code.to_string()))?
        .to_decimal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_parse_quote() {
        let body = json!({"sources": {"BCV": {"quote": "166.58", "last_retrieved": "2024-01-01"}}});
        assert_eq!(parse(&body, BCV_CODE).unwrap(), dec!(166.58));
    }

    #[test]
    fn test_unparseable_quote() {
        let body = json!({"sources": {"BCV": {"quote": "n/a"}}});
        assert!(matches!(parse(&body, BCV_CODE), Err(ParseError::InvalidNumber(_))));
    }

    #[test]
    fn test_missing_code() {
        let body = json!({"sources": {}});
        assert!(matches!(parse(&body, BCV_CODE), Err(ParseError::EntryNotFound(_))));
    }
}
