//! Binance P2P advertisement search.
//!
//! The engine POSTs a search for USDT offers priced in VES and averages the
//! highest-priced offers so a single outlier cannot set the rate.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{decode, RawNumber};
use crate::error::ParseError;

pub const URL: &str = "https://p2p.binance.com/bapi/c2c/v2/friendly/c2c/adv/search";

/// Number of top offers averaged.
pub const TOP_OFFERS: usize = 5;

/// Search body for USDT/VES buy-side offers.
pub fn search_body() -> Value {
    json!({
        "asset": "USDT",
        "fiat": "VES",
        "tradeType": "BUY",
        "page": 1,
        "rows": 20,
        "payTypes": [],
        "publisherType": null
    })
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    data: Option<Vec<Listing>>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    adv: Advertisement,
}

#[derive(Debug, Deserialize)]
struct Advertisement {
    price: RawNumber,
}

/// Mean of the `TOP_OFFERS` highest prices. Unparseable offers are skipped.
pub fn parse(body: &Value) -> Result<Decimal, ParseError> {
    let response: Response = decode(body)?;
    let listings = response.data.ok_or(ParseError::NoOffers)?;

    let mut prices: Vec<Decimal> = listings
        .iter()
        .filter_map(|l| l.adv.price.to_decimal().ok())
        .filter(|p| p.is_sign_positive() && !p.is_zero())
        .collect();

    if prices.is_empty() {
        return Err(ParseError::NoOffers);
    }

    prices.sort_unstable_by(|a, b| b.cmp(a));
    prices.truncate(TOP_OFFERS);

    let sum: Decimal = prices.iter().sum();
    Ok((sum / Decimal::from(prices.len())).round_dp(4))
}
