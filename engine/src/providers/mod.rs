//! Upstream providers: typed response shapes, parse rules, and the
//! per-pair source line-up.
//!
//! Every provider is untrusted. Parsers deserialize into the narrowest shape
//! they need and report drift as a [`ParseError`] instead of panicking.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tasa_common::RatePair;

use crate::error::ParseError;
use crate::source::{HttpSource, RateSource, SourceSpec};

pub mod binance_p2p;
pub mod currency_api;
pub mod dolarapi;
pub mod exchangedyn;
pub mod monitors;
pub mod rates_map;

/// Source names, in priority order.
pub mod names {
    pub const DOLARAPI_OFICIAL: &str = "DolarAPI Oficial";
    pub const PYDOLAR_BCV: &str = "PyDolarVe BCV";
    pub const EXCHANGEDYN_BCV: &str = "ExchangeDyn BCV";

    pub const BINANCE_P2P: &str = "Binance P2P";
    pub const PYDOLAR_BINANCE: &str = "PyDolarVe Binance";
    pub const DOLARAPI_PARALELO: &str = "DolarAPI Paralelo";

    pub const EXCHANGERATE_API: &str = "ExchangeRate-API";
    pub const OPEN_ER_API: &str = "Open ER-API";
    pub const CURRENCY_API: &str = "Currency-API";
}

/// Build the HTTP sources for `pair`, highest priority first.
pub fn sources_for(
    pair: RatePair,
    client: &reqwest::Client,
    timeout: Duration,
) -> Vec<Arc<dyn RateSource>> {
    match pair {
        RatePair::Bcv => vec![
            http_source(
                client,
                timeout,
                SourceSpec::get(names::DOLARAPI_OFICIAL, dolarapi::URL),
                |v| dolarapi::parse(v, dolarapi::OFICIAL),
            ),
            http_source(
                client,
                timeout,
                SourceSpec::get(names::PYDOLAR_BCV, monitors::BCV_URL),
                |v| monitors::parse(v, monitors::BCV_TITLE),
            ),
            http_source(
                client,
                timeout,
                SourceSpec::get(names::EXCHANGEDYN_BCV, exchangedyn::BCV_URL),
                |v| exchangedyn::parse(v, exchangedyn::BCV_CODE),
            ),
        ],
        RatePair::Binance => vec![
            http_source(
                client,
                timeout,
                SourceSpec::post(names::BINANCE_P2P, binance_p2p::URL, binance_p2p::search_body()),
                binance_p2p::parse,
            ),
            http_source(
                client,
                timeout,
                SourceSpec::get(names::PYDOLAR_BINANCE, monitors::BINANCE_URL),
                |v| monitors::parse(v, monitors::BINANCE_TITLE),
            ),
            http_source(
                client,
                timeout,
                SourceSpec::get(names::DOLARAPI_PARALELO, dolarapi::URL),
                |v| dolarapi::parse(v, dolarapi::PARALELO),
            ),
        ],
        RatePair::Cny => vec![
            http_source(
                client,
                timeout,
                SourceSpec::get(names::EXCHANGERATE_API, rates_map::EXCHANGERATE_API_URL),
                |v| rates_map::parse(v, "CNY"),
            ),
            http_source(
                client,
                timeout,
                SourceSpec::get(names::OPEN_ER_API, rates_map::OPEN_ER_API_URL),
                |v| rates_map::parse(v, "CNY"),
            ),
            http_source(
                client,
                timeout,
                SourceSpec::get(names::CURRENCY_API, currency_api::USD_URL),
                |v| currency_api::parse(v, "usd", "cny"),
            ),
        ],
    }
}

type ParseFn = fn(&Value) -> Result<Decimal, ParseError>;

fn http_source(
    client: &reqwest::Client,
    timeout: Duration,
    spec: SourceSpec,
    parser: ParseFn,
) -> Arc<dyn RateSource> {
    Arc::new(HttpSource::new(client.clone(), spec.with_timeout(timeout), parser))
}

/// A price field that providers send as either a JSON number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    pub fn to_decimal(&self) -> Result<Decimal, ParseError> {
        let text = match self {
            RawNumber::Number(n) if n.is_finite() => n.to_string(),
            RawNumber::Number(n) => return Err(ParseError::InvalidNumber(n.to_string())),
            // Some providers use a decimal comma.
            RawNumber::Text(s) => s.trim().replace(',', "."),
        };
        text.parse::<Decimal>()
            .map_err(|_| ParseError::InvalidNumber(text))
    }
}

/// Deserialize a provider body into its typed shape.
pub(crate) fn decode<T: DeserializeOwned>(body: &Value) -> Result<T, ParseError> {
    T::deserialize(body).map_err(|e| ParseError::Shape(e.to_string()))
}
