//! `{ "rates": { "CNY": 7.24, ... } }` responses, as served by
//! exchangerate-api.com and open.er-api.com.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::{decode, RawNumber};
use crate::error::ParseError;

pub const EXCHANGERATE_API_URL: &str = "https://api.exchangerate-api.com/v4/latest/USD";
pub const OPEN_ER_API_URL: &str = "https://open.er-api.com/v6/latest/USD";

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    result: Option<String>,
    rates: HashMap<String, RawNumber>,
}

pub fn parse(body: &Value, code: &str) -> Result<Decimal, ParseError> {
    let response: Response = decode(body)?;

    if let Some(result) = response.result.as_deref() {
        if result != "success" {
            return Err(ParseError::Shape(format!("result={result}")));
        }
    }

    response
        .rates
        .get(code)
        .ok_or_else(|| ParseError::EntryNotFound(code.to_string()))?
        .to_decimal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_parse_code() {
        let body = json!({"base": "USD", "rates": {"USD": 1, "CNY": 7.24, "EUR": 0.92}});
        assert_eq!(parse(&body, "CNY").unwrap(), dec!(7.24));
    }

    #[test]
    fn test_error_result() {
        let body = json!({"result": "error", "rates": {"CNY": 7.24}});
        assert!(matches!(parse(&body, "CNY"), Err(ParseError::Shape(_))));
    }

    #[test]
    fn test_missing_code() {
        let body = json!({"result": "success", "rates": {"EUR": 0.92}});
        assert_eq!(parse(&body, "CNY"), Err(ParseError::EntryNotFound("CNY".to_string())));
    }
}
