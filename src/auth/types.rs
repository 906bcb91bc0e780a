//! Auth configuration types
//!
//! These types represent the runtime auth configuration resolved from the
//! tap's credential options.

use crate::config::TapConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};

/// Path of the OAuth token endpoint, relative to the API base URL
pub const TOKEN_PATH: &str = "/oauth/v1/token";

/// Authentication configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthConfig {
    /// No authentication
    #[default]
    None,

    /// Private app token or pre-issued OAuth access token
    Bearer {
        /// The bearer token
        token: String,
    },

    /// OAuth2 Refresh Token flow
    Oauth2Refresh {
        /// Token endpoint URL
        token_url: String,
        /// Client ID
        client_id: String,
        /// Client secret
        client_secret: String,
        /// Refresh token
        refresh_token: String,
    },
}

impl AuthConfig {
    /// Resolve credentials from the tap configuration.
    ///
    /// An access token wins over OAuth app credentials. Having neither is a
    /// configuration error.
    pub fn from_tap_config(config: &TapConfig) -> Result<Self> {
        if let Some(token) = config.access_token() {
            return Ok(Self::Bearer { token });
        }

        if let Some((client_id, client_secret, refresh_token)) = config.oauth_credentials() {
            return Ok(Self::Oauth2Refresh {
                token_url: format!("{}{TOKEN_PATH}", config.api_url()),
                client_id,
                client_secret,
                refresh_token,
            });
        }

        Err(Error::missing_field(
            "access_token (or client_id, client_secret and refresh_token)",
        ))
    }

    /// Short name of the auth type, safe to log
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bearer { .. } => "bearer",
            Self::Oauth2Refresh { .. } => "oauth2_refresh",
        }
    }
}

/// Cached token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(seconds);
        Self {
            token,
            expires_at: Some(expires_at),
        }
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(30);
                Utc::now() + buffer >= expires_at
            }
            None => false, // No expiration = never expires
        }
    }
}
