//! Transport shared by the remote backends: one pooled client per provider,
//! JSON in and out, and HTTP failures mapped onto [`ProviderError`].

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

use super::ProviderError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A base URL plus the client that talks to it.
#[derive(Debug, Clone)]
pub(crate) struct Endpoint {
    base_url: String,
    client: reqwest::Client,
}

impl Endpoint {
    /// `base_url` from a provider config, or `default`.
    pub(crate) fn from_config(config: &JsonValue, default: &str) -> Result<Self, ProviderError> {
        Self::new(config["base_url"].as_str().unwrap_or(default))
    }

    pub(crate) fn new(base_url: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(format!("{}/{}", self.base_url, path.trim_start_matches('/')))
    }
}

/// Both APIs wrap failures as `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Send `body` as JSON and decode the reply as `T`.
pub(crate) async fn post_json<B, T>(
    request: RequestBuilder,
    body: &B,
    timeout: Duration,
) -> Result<T, ProviderError>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let response = request
        .timeout(timeout)
        .json(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(timeout)
            } else {
                ProviderError::HttpError(e.to_string())
            }
        })?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited {
            retry_after: retry_after(response.headers()),
        });
    }
    if !status.is_success() {
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error.message,
            Err(e) => format!("unreadable error body: {e}"),
        };
        return Err(ProviderError::ApiError {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::ParseError(e.to_string()))
}

/// `Retry-After` in whole seconds. HTTP-date values are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Rejects a configured `base_url` that is not http(s).
pub(crate) fn validate_base_url(config: &JsonValue) -> Result<(), ProviderError> {
    match config["base_url"].as_str() {
        Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => Err(
            ProviderError::NotConfigured(format!("base_url must start with http:// or https://, got {url}")),
        ),
        _ => Ok(()),
    }
}
