//! HTTP client with retry and rate limiting

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::{AuthConfig, Authenticator};
use crate::error::{Error, Result};
use crate::types::BackoffType;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Settings for an [`HttpClient`]
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Prefix for relative request paths
    pub base_url: Option<String>,
    /// Limit for a whole request, response body included
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Wait before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for any single wait
    pub max_backoff: Duration,
    /// How the wait grows between retries
    pub backoff_type: BackoffType,
    /// Limiter shared by every request
    pub rate_limit: Option<RateLimiterConfig>,
    /// Extra limiter for `/search` endpoints
    pub search_rate_limit: Option<RateLimiterConfig>,
    /// Headers sent with every request
    pub default_headers: HashMap<String, String>,
    /// `User-Agent` header value
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(60),
            max_retries: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            rate_limit: Some(RateLimiterConfig::default()),
            search_rate_limit: Some(RateLimiterConfig::search()),
            default_headers: HashMap::new(),
            user_agent: format!("tap-hubspot/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Defaults with relative paths resolved against `base_url`
    pub fn for_api(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_backoff(
        mut self,
        backoff_type: BackoffType,
        initial: Duration,
        max: Duration,
    ) -> Self {
        self.backoff_type = backoff_type;
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.rate_limit = Some(config);
        self
    }

    /// Drop both limiters
    #[must_use]
    pub fn without_rate_limit(mut self) -> Self {
        self.rate_limit = None;
        self.search_rate_limit = None;
        self
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }
}

/// Query, body and retry override of one request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
    /// JSON body, sent with `Content-Type: application/json`
    pub body: Option<Value>,
    /// Overrides [`HttpClientConfig::max_retries`]
    pub max_retries: Option<u32>,
}

#[cfg(test)]
impl RequestConfig {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub(crate) fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub(crate) fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub(crate) fn retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }
}

/// Client every HubSpot request goes through
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Option<Authenticator>,
    rate_limiter: Option<RateLimiter>,
    search_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Unauthenticated client
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            rate_limiter: config.rate_limit.as_ref().map(RateLimiter::new),
            search_limiter: config.search_rate_limit.as_ref().map(RateLimiter::new),
            client,
            config,
            authenticator: None,
        })
    }

    /// Client that sends `auth` with every request
    pub fn with_auth(config: HttpClientConfig, auth: AuthConfig) -> Result<Self> {
        let mut http = Self::new(config)?;
        http.authenticator = Some(Authenticator::with_client(auth, http.client.clone()));
        Ok(http)
    }

    /// Make a generic request.
    ///
    /// Waits on the rate limiters, applies auth, and retries throttling,
    /// 5xx and transport failures. A 401 on a refreshable token clears the
    /// cached token and tries once more. HubSpot's daily limit fails at once.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        config: &RequestConfig,
    ) -> Result<Response> {
        let full_url = self.resolve(url);
        let max_retries = config.max_retries.unwrap_or(self.config.max_retries);
        let is_search = full_url.trim_end_matches('/').ends_with("/search");

        let mut last_error = None;
        let mut attempt = 0;
        let mut token_refreshed = false;

        while attempt <= max_retries {
            self.throttle(is_search).await;

            let mut req = self.prepare(method.clone(), &full_url, config);
            if let Some(ref auth) = self.authenticator {
                req = auth.apply(req).await?;
            }

            let response = match req.send().await {
                Ok(response) => response,
                Err(e) => {
                    let error = if e.is_timeout() {
                        Error::Timeout {
                            timeout_ms: self.config.timeout.as_millis() as u64,
                        }
                    } else {
                        Error::Http(e)
                    };
                    if !error.is_retryable() || attempt >= max_retries {
                        return Err(error);
                    }

                    let delay = self.backoff_delay(attempt);
                    warn!(error = %error, attempt = attempt + 1, ?delay, "Transport error, retrying");
                    tokio::time::sleep(delay).await;
                    last_error = Some(error);
                    attempt += 1;
                    continue;
                }
            };

            let status = response.status();

            if status.is_success() {
                debug!(%method, url = %full_url, status = status.as_u16(), "Request succeeded");
                return Ok(response);
            }

            if status == StatusCode::UNAUTHORIZED && !token_refreshed {
                if let Some(auth) = self.authenticator.as_ref().filter(|a| a.refreshes_tokens()) {
                    warn!("Access token rejected, refreshing");
                    auth.clear_cache().await;
                    token_refreshed = true;
                    continue;
                }
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = extract_retry_after(&response);
                let body = response.text().await.unwrap_or_default();

                if rate_limit_policy(&body).as_deref() == Some(DAILY_POLICY) {
                    return Err(Error::DailyLimitExceeded { body });
                }
                if attempt >= max_retries {
                    return Err(Error::RateLimited {
                        retry_after_seconds: retry_after,
                    });
                }

                warn!(attempt = attempt + 1, retry_after, "Rate limited (429), waiting");
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            let error = Error::http_status(status.as_u16(), body);
            if !error.is_retryable() || attempt >= max_retries {
                return Err(error);
            }

            let delay = self.backoff_delay(attempt);
            warn!(status = status.as_u16(), attempt = attempt + 1, ?delay, "Server error, retrying");
            tokio::time::sleep(delay).await;
            last_error = Some(error);
            attempt += 1;
        }

        Err(last_error.unwrap_or(Error::MaxRetriesExceeded { max_retries }))
    }

    /// Wait for the general limiter, and the search limiter on `/search`
    async fn throttle(&self, is_search: bool) {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }
        if is_search {
            if let Some(ref limiter) = self.search_limiter {
                limiter.wait().await;
            }
        }
    }

    /// Build an unauthenticated request
    fn prepare(&self, method: Method, url: &str, config: &RequestConfig) -> RequestBuilder {
        let mut req = self.client.request(method, url);

        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }
        if !config.query.is_empty() {
            req = req.query(&config.query);
        }
        if let Some(ref body) = config.body {
            req = req.json(body);
        }
        req
    }

    /// Send a request and decode the JSON body. An empty body is `null`.
    pub async fn request_json(
        &self,
        method: Method,
        url: &str,
        config: &RequestConfig,
    ) -> Result<Value> {
        let text = self.request(method, url, config).await?.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| Error::decode(format!("Invalid JSON from {url}: {e}")))
    }

    /// Absolute URLs pass through; paths are joined to `base_url`
    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match &self.config.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            None => url.to_string(),
        }
    }

    /// Delay before retry number `attempt + 1`, capped at `max_backoff`
    pub(crate) fn backoff_delay(&self, attempt: u32) -> Duration {
        let initial = self.config.initial_backoff;
        let delay = match self.config.backoff_type {
            BackoffType::Constant => initial,
            BackoffType::Linear => initial.saturating_mul(attempt + 1),
            BackoffType::Exponential => initial.saturating_mul(2u32.saturating_pow(attempt)),
        };
        delay.min(self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.config.base_url)
            .field("authenticator", &self.authenticator)
            .field("rate_limited", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// `policyName` HubSpot reports once the account's daily quota is spent
const DAILY_POLICY: &str = "DAILY";

/// Rate limit policy named in a 429 body
fn rate_limit_policy(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("policyName")?
        .as_str()
        .map(ToString::to_string)
}

/// Extract retry-after header value (HubSpot sends seconds)
fn extract_retry_after(response: &Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(10)
}
