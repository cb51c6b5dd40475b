//! HTTP routes.
//!
//! Per pair, under `/api/{bcv|binance|cny}`:
//! - `GET /rate?force=<bool>`
//! - `POST /rate` with `{ "manualRate"?: number, "forceRefresh"?: bool }`
//! - `GET /rate/health`
//!
//! Plus `GET /healthz` and `GET /metrics`.

use std::any::Any;
use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tasa_common::{RatePair, RateResult};
use tasa_engine::{EngineError, RateEngine};
use thiserror::Error;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, warn};

use crate::report::HealthReport;
use crate::state::AppState;

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/:pair/rate", get(get_rate).post(post_rate))
        .route("/api/:pair/rate/health", get(rate_health))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

/// Last-resort 500 for a panicking handler.
fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    error!("Request handler panicked");
    ApiError::Internal.into_response()
}

/// Errors that escape a handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unknown rate pair: {0}")]
    UnknownPair(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::UnknownPair(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: RateResult,
    pub currency_pair: &'static str,
}

impl From<RateResult> for RateResponse {
    fn from(result: RateResult) -> Self {
        Self {
            success: true,
            currency_pair: result.pair.currency_pair(),
            result,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RateQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateUpdate {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub manual_rate: Option<Decimal>,
    #[serde(default)]
    pub force_refresh: Option<bool>,
}

fn engine_for(state: &AppState, pair: &str) -> Result<Arc<RateEngine>, ApiError> {
    pair.parse::<RatePair>()
        .ok()
        .and_then(|pair| state.engine(pair).cloned())
        .ok_or_else(|| ApiError::UnknownPair(pair.to_string()))
}

async fn get_rate(
    State(state): State<AppState>,
    Path(pair): Path<String>,
    query: Result<Query<RateQuery>, QueryRejection>,
) -> Result<Json<RateResponse>, ApiError> {
    let engine = engine_for(&state, &pair)?;
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let result = engine.get_rate(query.force).await;
    state.metrics().rate_served(&result);
    Ok(Json(result.into()))
}

/// A valid manual rate is stored as-is. Anything else is a forced refresh.
async fn post_rate(
    State(state): State<AppState>,
    Path(pair): Path<String>,
    body: Option<Json<RateUpdate>>,
) -> Result<Json<RateResponse>, ApiError> {
    let engine = engine_for(&state, &pair)?;
    let update = body.map(|Json(u)| u).unwrap_or_default();

    if let Some(rate) = update.manual_rate {
        match engine.set_manual_rate(rate).await {
            Ok(result) => {
                state.metrics().manual_rate();
                return Ok(Json(result.into()));
            }
            Err(EngineError::InvalidRate { pair, rate }) => {
                warn!(pair = %pair, rate = %rate, "Rejected manual rate, refreshing instead");
            }
            Err(e) => {
                error!(pair = %engine.pair(), error = %e, "Manual rate not stored");
                state.metrics().error();
                return Err(e.into());
            }
        }
    }

    let result = engine.get_rate(true).await;
    state.metrics().rate_served(&result);
    Ok(Json(result.into()))
}

async fn rate_health(
    State(state): State<AppState>,
    Path(pair): Path<String>,
) -> Result<Json<HealthReport>, ApiError> {
    let engine = engine_for(&state, &pair)?;
    Ok(Json(HealthReport::build(&state, &engine).await))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics().to_prometheus(),
    )
}
