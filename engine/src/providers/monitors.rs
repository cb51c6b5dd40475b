//! PyDolarVe-style monitor listings.
//!
//! Monitors arrive either as an array or as an object keyed by slug; each
//! monitor carries a `title` and a `price` that may be a string or a number.
//!
//! ```json
//! {"monitors": [{"title": "BCV Oficial", "price": "166.58"}]}
//! {"monitors": {"bcv": {"title": "BCV Oficial", "price": 166.58}}}
//! ```

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::{decode, RawNumber};
use crate::error::ParseError;

pub const BCV_URL: &str = "https://pydolarve.org/api/v2/dollar?page=bcv";
pub const BINANCE_URL: &str = "https://pydolarve.org/api/v2/dollar?page=binance";

pub const BCV_TITLE: &str = "BCV Oficial";
pub const BINANCE_TITLE: &str = "Binance";

#[derive(Debug, Deserialize)]
struct Response {
    monitors: Monitors,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Monitors {
    List(Vec<Monitor>),
    Keyed(BTreeMap<String, Monitor>),
}

#[derive(Debug, Deserialize)]
struct Monitor {
    title: String,
    price: RawNumber,
}

impl Monitors {
    fn find(&self, title: &str) -> Option<&Monitor> {
        let matches = |m: &&Monitor| m.title.trim().eq_ignore_ascii_case(title);
        match self {
            Monitors::List(list) => list.iter().find(matches),
            Monitors::Keyed(map) => map.values().find(matches),
        }
    }
}

/// Price of the monitor whose title equals `title` (case-insensitive).
pub fn parse(body: &Value, title: &str) -> Result<Decimal, ParseError> {
    let response: Response = decode(body)?;

    response
        .monitors
        .find(title)
        .ok_or_else(|| ParseError::EntryNotFound(title.to_string()))?
        .price
        .to_decimal()
}
