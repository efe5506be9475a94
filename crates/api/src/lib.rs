//! Wings API client.
//!
//! This crate provides a small client for the Wings values API. It focuses on:
//!
//! - CRUD of [`Value`]s under `{endpoint}/values`
//! - Attaching the API key pair, User-Agent and content type to every request
//! - Retrying transient failures according to a [`RetryPolicy`]
//! - Honoring caller cancellation and deadlines through [`RequestContext`]
//!
//! # Example
//!
//! ```ignore
//! use wings_api::{ClientConfig, RequestContext, WingsClient};
//!
//! async fn show(id: &str) -> anyhow::Result<()> {
//!     let config = ClientConfig::new("https://wings.example", "key-id", "key")?;
//!     let client = WingsClient::new(config)?;
//!     let value = client.get_value(&RequestContext::default(), id).await?;
//!     println!("{} -> {}", value.id, value.default_variant);
//!     Ok(())
//! }
//! ```

mod config;
mod context;
mod error;
mod retry;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header;
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, warn};
use url::Url;
use wings_types::Value;

pub use config::{ClientConfig, ConfigOverrides, DEFAULT_USER_AGENT, ENV_API_KEY, ENV_API_KEY_ID, ENV_ENDPOINT};
pub use context::RequestContext;
pub use error::{ApiError, ConfigError};
pub use retry::RetryPolicy;

pub const HEADER_KEY_ID: &str = "X-API-KEY-ID";
pub const HEADER_KEY: &str = "X-API-KEY";
const APPLICATION_JSON: &str = "application/json";
const VALUES_PATH: &str = "values";

/// Client for the Wings values API.
///
/// Holds only immutable configuration and a connection pool, so clones are
/// cheap and may be used concurrently from many tasks.
#[derive(Debug, Clone)]
pub struct WingsClient {
    config: Arc<ClientConfig>,
    http: Client,
}

/// Status, `Retry-After` hint and body of a completed attempt.
struct RawResponse {
    status: StatusCode,
    retry_after: Option<Duration>,
    body: String,
}

impl RawResponse {
    fn ensure_success(self) -> Result<Self, ApiError> {
        if self.status.as_u16() >= 400 {
            return Err(ApiError::remote(self.status.as_u16(), self.body));
        }
        Ok(self)
    }

    fn into_value(self) -> Result<Value, ApiError> {
        let response = self.ensure_success()?;
        serde_json::from_str(&response.body).map_err(ApiError::Decode)
    }
}

impl WingsClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ApiError::Client)?;
        debug!(endpoint = %config.endpoint, api_key_id = %config.api_key_id, "created wings client");

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch a value by id.
    pub async fn get_value(&self, ctx: &RequestContext, id: &str) -> Result<Value, ApiError> {
        let url = self.values_url(Some(id))?;
        self.dispatch(ctx, Method::GET, url, None).await?.into_value()
    }

    /// Create a value; the server may assign or echo its id.
    pub async fn create_value(&self, ctx: &RequestContext, value: &Value) -> Result<Value, ApiError> {
        let url = self.values_url(None)?;
        let body = serde_json::to_vec(value).map_err(ApiError::Encode)?;
        self.dispatch(ctx, Method::POST, url, Some(body)).await?.into_value()
    }

    /// Replace the value stored under `value.id`.
    pub async fn update_value(&self, ctx: &RequestContext, value: &Value) -> Result<Value, ApiError> {
        let url = self.values_url(Some(&value.id))?;
        let body = serde_json::to_vec(value).map_err(ApiError::Encode)?;
        self.dispatch(ctx, Method::PUT, url, Some(body)).await?.into_value()
    }

    /// Delete a value. A value that is already gone counts as deleted.
    pub async fn delete_value(&self, ctx: &RequestContext, id: &str) -> Result<(), ApiError> {
        let url = self.values_url(Some(id))?;
        let response = self.dispatch(ctx, Method::DELETE, url, None).await?;
        if response.status == StatusCode::NOT_FOUND {
            debug!(value_id = id, "value already deleted");
            return Ok(());
        }
        response.ensure_success().map(|_| ())
    }

    fn values_url(&self, id: Option<&str>) -> Result<Url, ApiError> {
        let mut url = self.config.endpoint.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| ApiError::InvalidEndpoint {
                endpoint: self.config.endpoint.to_string(),
                reason: "endpoint cannot be a base URL".to_string(),
            })?;
            segments.pop_if_empty().push(VALUES_PATH);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    /// Single request path shared by every operation.
    async fn dispatch(
        &self,
        ctx: &RequestContext,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse, ApiError> {
        ctx.run(self.send_with_retry(method, url, body)).await
    }

    async fn send_with_retry(&self, method: Method, url: Url, body: Option<Vec<u8>>) -> Result<RawResponse, ApiError> {
        let policy = &self.config.retry;
        let mut attempt: u32 = 0;

        let (outcome, attempts) = loop {
            debug!(%method, %url, attempt = attempt + 1, "sending request");
            let outcome = self.send_once(&method, &url, body.as_deref()).await;

            let wait = match &outcome {
                Ok(response) if RetryPolicy::is_retryable_status(response.status) => {
                    Some(policy.wait_for_response(attempt, response.status, response.retry_after))
                }
                Err(error) if RetryPolicy::is_retryable_error(error) => Some(policy.backoff(attempt)),
                _ => None,
            };
            let Some(wait) = wait.filter(|_| attempt < policy.max_retries) else {
                break (outcome, attempt + 1);
            };

            match &outcome {
                Ok(response) => warn!(
                    %method, %url, status = response.status.as_u16(), attempt = attempt + 1, ?wait,
                    "retrying request"
                ),
                Err(error) => warn!(%method, %url, %error, attempt = attempt + 1, ?wait, "retrying request"),
            }
            tokio::time::sleep(wait).await;
            attempt += 1;
        };

        match outcome {
            Ok(response) => {
                debug!(%method, %url, status = response.status.as_u16(), attempts, "received response");
                Ok(response)
            }
            Err(source) => Err(ApiError::Transport {
                url: url.to_string(),
                attempts,
                source,
            }),
        }
    }

    async fn send_once(&self, method: &Method, url: &Url, body: Option<&[u8]>) -> Result<RawResponse, reqwest::Error> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(HEADER_KEY_ID, &self.config.api_key_id)
            .header(HEADER_KEY, self.config.api_key())
            .header(header::USER_AGENT, &self.config.user_agent)
            .header(header::CONTENT_TYPE, APPLICATION_JSON);
        if let Some(body) = body {
            request = request.body(body.to_vec());
        }

        let response = request.send().await?;
        let status = response.status();
        let retry_after = retry::retry_after(response.headers());
        let body = response.text().await?;
        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}
