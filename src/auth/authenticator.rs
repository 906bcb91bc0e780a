//! Authenticator implementation
//!
//! Puts the bearer token on each request. With OAuth app credentials the
//! access token is exchanged for the refresh token at HubSpot's token
//! endpoint and reused until shortly before it expires.

use super::types::{AuthConfig, CachedToken};
use crate::error::{Error, Result};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Applies HubSpot credentials to outgoing requests
pub struct Authenticator {
    config: AuthConfig,
    /// Last access token from the refresh flow
    token: RwLock<Option<CachedToken>>,
    /// Client used for token requests
    http_client: Client,
}

impl Authenticator {
    /// Authenticator with its own HTTP client for token requests
    pub fn new(config: AuthConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Share the API client's connection pool for token requests
    pub fn with_client(config: AuthConfig, http_client: Client) -> Self {
        Self {
            config,
            token: RwLock::new(None),
            http_client,
        }
    }

    /// Add the `Authorization` header, refreshing the access token first if needed
    pub async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.config {
            AuthConfig::None => Ok(req),
            AuthConfig::Bearer { token } => Ok(req.bearer_auth(token)),
            AuthConfig::Oauth2Refresh { .. } => Ok(req.bearer_auth(self.access_token().await?)),
        }
    }

    /// Whether tokens come from a refresh flow and can be renewed
    pub fn refreshes_tokens(&self) -> bool {
        matches!(self.config, AuthConfig::Oauth2Refresh { .. })
    }

    /// Forget the cached access token so the next request refreshes it
    pub async fn clear_cache(&self) {
        *self.token.write().await = None;
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.token.clone());
        }

        let mut slot = self.token.write().await;

        // A concurrent request may have refreshed while this one waited
        if let Some(token) = slot.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.token.clone());
        }

        let fresh = self.refresh().await?;
        let token = fresh.token.clone();
        *slot = Some(fresh);
        Ok(token)
    }

    /// Exchange the refresh token for a new access token
    async fn refresh(&self) -> Result<CachedToken> {
        let AuthConfig::Oauth2Refresh {
            token_url,
            client_id,
            client_secret,
            refresh_token,
        } = &self.config
        else {
            return Err(Error::auth("Token refresh needs OAuth app credentials"));
        };

        debug!(token_url = %token_url, "Refreshing OAuth access token");

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
        ];
        let response = self.http_client.post(token_url).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let status = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenRefresh {
                message: format!("Refresh token request failed with status {status}: {body}"),
            });
        }

        let grant: TokenGrant = response.json().await?;
        info!(expires_in = ?grant.expires_in, "Obtained OAuth access token");
        Ok(grant.into())
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("kind", &self.config.kind())
            .finish_non_exhaustive()
    }
}

/// Body of a successful `/oauth/v1/token` response
#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl From<TokenGrant> for CachedToken {
    fn from(grant: TokenGrant) -> Self {
        match grant.expires_in {
            Some(secs) => CachedToken::expires_in(grant.access_token, secs),
            None => CachedToken::new(grant.access_token, None),
        }
    }
}
