//! Client configuration.
//!
//! A [`ClientConfig`] is built once, either explicitly or through
//! [`ClientConfig::resolve`], and handed to [`crate::WingsClient::new`].
//! Nothing here is global: every client owns its configuration.

use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::{ConfigError, RetryPolicy};

pub const ENV_ENDPOINT: &str = "WINGS_ENDPOINT";
pub const ENV_API_KEY_ID: &str = "WINGS_API_KEY_ID";
pub const ENV_API_KEY: &str = "WINGS_API_KEY";

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("wings-provider/", env!("CARGO_PKG_VERSION"));

/// Immutable settings shared by every request a client makes.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base endpoint; request paths are appended as segments.
    pub endpoint: Url,
    pub api_key_id: String,
    api_key: String,
    pub user_agent: String,
    /// Per-attempt timeout applied by the HTTP client.
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    /// Build a configuration from explicit values.
    pub fn new(endpoint: &str, api_key_id: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            api_key_id: api_key_id.into(),
            api_key: api_key.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Resolve configuration from explicit overrides with environment fallback.
    ///
    /// An override that is present always wins, even when empty. Every
    /// missing or empty setting is reported at once.
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let endpoint = setting(overrides.endpoint, ENV_ENDPOINT);
        let api_key_id = setting(overrides.api_key_id, ENV_API_KEY_ID);
        let api_key = setting(overrides.api_key, ENV_API_KEY);

        let mut missing = Vec::new();
        for (name, env_var, value) in [
            ("endpoint", ENV_ENDPOINT, &endpoint),
            ("api_key_id", ENV_API_KEY_ID, &api_key_id),
            ("api_key", ENV_API_KEY, &api_key),
        ] {
            if value.is_empty() {
                missing.push(format!("{name} ({env_var})"));
            }
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing { settings: missing });
        }

        Self::new(&endpoint, api_key_id, api_key)
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key_id", &self.api_key_id)
            .field("api_key", &"[REDACTED]")
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Explicitly supplied settings that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub api_key_id: Option<String>,
    pub api_key: Option<String>,
}

fn setting(explicit: Option<String>, env_var: &str) -> String {
    explicit.or_else(|| env::var(env_var).ok()).unwrap_or_default()
}

/// Validate that the endpoint is an absolute http(s) URL that can take path segments.
fn parse_endpoint(endpoint: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(endpoint).map_err(|error| invalid(error.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid("endpoint must include a host".to_string()));
    }
    Ok(url)
}
