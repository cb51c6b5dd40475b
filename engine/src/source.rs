//! Rate sources and the monitored fetcher wrapped around them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use rust_decimal::Decimal;
use serde_json::Value;
use tasa_common::RatePair;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult, ParseError};
use crate::health::{Attempt, HealthRecorder};
use crate::validator::is_valid_rate;

/// Shortest per-call deadline a source may use.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Longest per-call deadline a source may use.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(10);

/// A rate extracted from one provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuote {
    pub rate: Decimal,
    /// The provider's raw response, kept for audit.
    pub payload: Value,
}

/// Trait for upstream rate providers.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Perform one call and extract a rate. Must not retry.
    async fn fetch_quote(&self) -> FetchResult<SourceQuote>;
}

/// HTTP method and body for a source request.
#[derive(Debug, Clone)]
pub enum RequestMethod {
    Get,
    Post(Value),
}

/// Static description of an HTTP source.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub name: String,
    pub url: String,
    pub method: RequestMethod,
    pub timeout: Duration,
}

impl SourceSpec {
    pub fn get(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method: RequestMethod::Get,
            timeout: Duration::from_secs(8),
        }
    }

    pub fn post(name: impl Into<String>, url: impl Into<String>, body: Value) -> Self {
        Self {
            method: RequestMethod::Post(body),
            ..Self::get(name, url)
        }
    }

    /// Set the per-call deadline, clamped to 3–10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.clamp(MIN_TIMEOUT, MAX_TIMEOUT);
        self
    }
}

/// Extracts a rate from a provider's JSON body.
pub type Parser = Arc<dyn Fn(&Value) -> Result<Decimal, ParseError> + Send + Sync>;

/// A provider reached over HTTP and read with a typed parser.
pub struct HttpSource {
    client: reqwest::Client,
    spec: SourceSpec,
    parser: Parser,
}

impl HttpSource {
    pub fn new<F>(client: reqwest::Client, spec: SourceSpec, parser: F) -> Self
    where
        F: Fn(&Value) -> Result<Decimal, ParseError> + Send + Sync + 'static,
    {
        Self {
            client,
            spec,
            parser: Arc::new(parser),
        }
    }

    async fn request(&self) -> FetchResult<Value> {
        let request = match &self.spec.method {
            RequestMethod::Get => self.client.get(&self.spec.url),
            RequestMethod::Post(body) => self.client.post(&self.spec.url).json(body),
        };

        let response = request
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, concat!("tasa/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Parse(ParseError::Shape(e.to_string())))
    }
}

#[async_trait]
impl RateSource for HttpSource {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn fetch_quote(&self) -> FetchResult<SourceQuote> {
        // The deadline covers connect, headers and body, and dies with this call.
        let deadline = self.spec.timeout;
        let body = tokio::time::timeout(deadline, self.request())
            .await
            .map_err(|_| FetchError::Timeout(deadline.as_millis() as u64))??;

        let rate = (self.parser)(&body)?;
        Ok(SourceQuote { rate, payload: body })
    }
}

/// A source bound to a pair: validates every quote and logs every attempt.
#[derive(Clone)]
pub struct Fetcher {
    pair: RatePair,
    source: Arc<dyn RateSource>,
    recorder: HealthRecorder,
}

impl Fetcher {
    pub fn new(pair: RatePair, source: Arc<dyn RateSource>, recorder: HealthRecorder) -> Self {
        Self {
            pair,
            source,
            recorder,
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// One attempt against the source. Exactly one health entry is written.
    pub async fn fetch(&self) -> FetchResult<SourceQuote> {
        let started = Instant::now();

        let result = self.source.fetch_quote().await.and_then(|quote| {
            if is_valid_rate(self.pair, quote.rate) {
                Ok(quote)
            } else {
                Err(FetchError::OutOfBounds {
                    pair: self.pair,
                    rate: quote.rate,
                })
            }
        });

        let latency_ms = started.elapsed().as_millis() as i64;
        let attempt = match &result {
            Ok(quote) => {
                debug!(source = self.name(), rate = %quote.rate, latency_ms, "Source returned rate");
                Attempt::success(self.name(), latency_ms, quote.rate)
            }
            Err(e) => {
                warn!(source = self.name(), pair = %self.pair, error = %e, latency_ms, "Source failed");
                Attempt::failure(self.name(), latency_ms, e.to_string())
            }
        };
        self.recorder.record(attempt).await;

        result
    }
}

/// Scripted source for tests.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockSource {
    name: String,
    response: parking_lot::Mutex<Result<SourceQuote, FetchError>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockSource {
    /// A source that always returns `rate`.
    pub fn ok(name: impl Into<String>, rate: Decimal) -> Self {
        Self::with_response(
            name,
            Ok(SourceQuote {
                rate,
                payload: serde_json::json!({ "mock": rate.to_string() }),
            }),
        )
    }

    /// A source that always fails with `error`.
    pub fn failing(name: impl Into<String>, error: FetchError) -> Self {
        Self::with_response(name, Err(error))
    }

    fn with_response(name: impl Into<String>, response: Result<SourceQuote, FetchError>) -> Self {
        Self {
            name: name.into(),
            response: parking_lot::Mutex::new(response),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of times `fetch_quote` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_quote(&self) -> FetchResult<SourceQuote> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.response.lock().clone()
    }
}
