//! Upstream weather provider.
//!
//! # Responsibilities
//! - Define the single-call capability the engine retries
//! - Talk to Weatherstack over HTTP with connect/read/total budgets
//! - Turn every provider outcome into a typed [`UpstreamError`]

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;
use crate::resilience::timeouts::with_deadline;
use crate::weather::types::{UpstreamError, WeatherData};

/// One attempt at fetching current weather for a normalized city.
#[async_trait]
pub trait Upstream: Send + Sync + 'static {
    async fn current(&self, city: &str) -> Result<WeatherData, UpstreamError>;
}

/// Errors building the HTTP client.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid upstream base url: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Weatherstack `/current` client.
#[derive(Debug, Clone)]
pub struct WeatherstackClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    total_timeout: Duration,
}

impl WeatherstackClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ClientBuildError> {
        let base = config.base_url.trim_end_matches('/');
        let endpoint = Url::parse(&format!("{base}/current"))?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .timeout(config.total_timeout())
            .build()?;

        if config.api_key.is_empty() {
            tracing::warn!("No upstream API key configured, requests will be rejected");
        }

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            total_timeout: config.total_timeout(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn request(&self, city: &str) -> Result<WeatherData, UpstreamError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("access_key", self.api_key.as_str()), ("query", city)])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_transport_error)?;
        interpret_response(status, &body, city)
    }
}

#[async_trait]
impl Upstream for WeatherstackClient {
    async fn current(&self, city: &str) -> Result<WeatherData, UpstreamError> {
        tracing::debug!(city, "Fetching current weather from upstream");
        with_deadline(self.total_timeout, self.request(city)).await
    }
}

fn map_transport_error(err: reqwest::Error) -> UpstreamError {
    // reqwest error text can carry the full URL including the access key.
    let err = err.without_url();
    if err.is_timeout() {
        UpstreamError::Timeout(err.to_string())
    } else if err.is_connect() {
        UpstreamError::Connect(err.to_string())
    } else if err.is_decode() || err.is_body() {
        UpstreamError::Decode(err.to_string())
    } else {
        UpstreamError::Network(err.to_string())
    }
}

fn error_for_code(code: u16, info: &str, city: &str) -> UpstreamError {
    match code {
        401 => UpstreamError::Unauthorized("Invalid API key".to_string()),
        404 => UpstreamError::NotFound(format!("City '{city}' not found")),
        429 => UpstreamError::RateLimited("Rate limit exceeded".to_string()),
        _ => UpstreamError::Server {
            status: code,
            message: format!("Weatherstack API error: {info}"),
        },
    }
}

/// Map an HTTP status and body to a payload or a typed failure.
///
/// Weatherstack reports some failures as HTTP 200 with an `error` object;
/// those are mapped by their `code` the same way as real status codes.
pub fn interpret_response(status: u16, body: &str, city: &str) -> Result<WeatherData, UpstreamError> {
    match status {
        200..=299 => {}
        401 | 404 | 429 => return Err(error_for_code(status, "", city)),
        400..=499 => return Err(UpstreamError::BadRequest(format!("HTTP error {status}"))),
        _ => {
            return Err(UpstreamError::Server {
                status,
                message: format!("HTTP error {status}"),
            })
        }
    }

    let data: WeatherData =
        serde_json::from_str(body).map_err(|e| UpstreamError::Decode(e.to_string()))?;

    if let Some(error) = data.get("error") {
        let code = error
            .get("code")
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(500);
        let info = error
            .get("info")
            .and_then(|i| i.as_str())
            .unwrap_or("Unknown error");
        tracing::warn!(city, code, info, "Upstream reported an error");
        return Err(error_for_code(code, info, city));
    }

    Ok(data)
}
