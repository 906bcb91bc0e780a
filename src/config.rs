//! Tap configuration
//!
//! The flat set of options the tap recognises, their defaults, and the JSON
//! schema declared for them. Configuration is read once at startup and
//! shared read-only by every stream.

use crate::error::{Error, Result};
use crate::schema::{JsonSchema, SchemaProperty};
use crate::types::NonEmpty;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

/// Default HubSpot API base URL
pub const DEFAULT_API_URL: &str = "https://api.hubapi.com";

/// Configuration options recognised by the tap
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapConfig {
    /// Private app or OAuth access token
    #[serde(default)]
    pub access_token: Option<String>,

    /// OAuth app client ID
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth app client secret
    #[serde(default)]
    pub client_secret: Option<String>,

    /// OAuth app refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Earliest record date to sync (ISO-8601)
    #[serde(default)]
    pub start_date: Option<String>,

    /// Latest record date to sync (ISO-8601)
    #[serde(default)]
    pub end_date: Option<String>,

    /// Clamp the start date to the last N months (31 days each)
    #[serde(default)]
    pub limit_events_month: Option<u32>,

    /// Pull web events for contacts synced in this run
    #[serde(default)]
    pub enabled_hubspot_pull_web_events: bool,

    /// Pull all web events without a contact filter
    #[serde(default)]
    pub enabled_hubspot_pull_global_web_events: bool,

    /// API base URL
    #[serde(default)]
    pub api_url: Option<String>,
}

impl TapConfig {
    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Check value formats the JSON types alone do not capture
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("start_date", &self.start_date), ("end_date", &self.end_date)] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                crate::dates::parse_datetime(field, value)?;
            }
        }

        if let Some(api_url) = &self.api_url {
            url::Url::parse(api_url)
                .map_err(|e| Error::invalid_value("api_url", e.to_string()))?;
        }

        Ok(())
    }

    /// API base URL without a trailing slash
    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
    }

    /// Access token, if a non-empty one is configured
    pub fn access_token(&self) -> Option<String> {
        self.access_token.non_empty().map(str::to_string)
    }

    /// Client ID, client secret and refresh token when all three are set
    pub fn oauth_credentials(&self) -> Option<(String, String, String)> {
        Some((
            self.client_id.non_empty()?.to_string(),
            self.client_secret.non_empty()?.to_string(),
            self.refresh_token.non_empty()?.to_string(),
        ))
    }
}

/// JSON schema declared for the tap configuration
pub fn config_schema() -> JsonSchema {
    JsonSchema::new()
        .property(
            "access_token",
            SchemaProperty::string()
                .with_description("Token to authenticate against the API service")
                .secret(),
        )
        .property(
            "client_id",
            SchemaProperty::string().with_description("The OAuth app client ID."),
        )
        .property(
            "client_secret",
            SchemaProperty::string()
                .with_description("The OAuth app client secret.")
                .secret(),
        )
        .property(
            "refresh_token",
            SchemaProperty::string()
                .with_description("The OAuth app refresh token.")
                .secret(),
        )
        .property(
            "start_date",
            SchemaProperty::datetime().with_description("Earliest record date to sync"),
        )
        .property(
            "end_date",
            SchemaProperty::datetime().with_description("Latest record date to sync"),
        )
        .property(
            "limit_events_month",
            SchemaProperty::integer().with_description(
                "Hard limit the start date to last X months from today (no limit if not set)",
            ),
        )
        .property(
            "enabled_hubspot_pull_web_events",
            SchemaProperty::boolean()
                .with_default(json!(false))
                .with_description(
                    "Enable syncing of web events for contacts \
                     (incremental, only for modified contacts)",
                ),
        )
        .property(
            "enabled_hubspot_pull_global_web_events",
            SchemaProperty::boolean()
                .with_default(json!(false))
                .with_description(
                    "Enable syncing of all web events globally (comprehensive, but may be slower)",
                ),
        )
        .property(
            "api_url",
            SchemaProperty::string()
                .with_format("uri")
                .with_default(json!(DEFAULT_API_URL))
                .with_description("Base URL of the HubSpot API"),
        )
}
