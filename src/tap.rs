//! The HubSpot tap
//!
//! Ties configuration, stream discovery and the HTTP client together.

use crate::auth::AuthConfig;
use crate::catalog::Catalog;
use crate::config::{config_schema, TapConfig};
use crate::dates;
use crate::error::Result;
use crate::http::{HttpClient, HttpClientConfig};
use crate::streams::{
    CrmObject, CrmObjectStream, EmailEventsStream, HubspotStream, StreamRequest, WebEventsStream,
};
use crate::types::JsonValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Tap name reported by `--about` and the user agent
pub const TAP_NAME: &str = "tap-hubspot";

/// Result of a connection check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Whether the check succeeded
    pub success: bool,

    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    /// Create a successful check result
    pub fn success() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// Create a failed check result
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// HubSpot tap
#[derive(Debug, Clone)]
pub struct TapHubspot {
    config: Arc<TapConfig>,
}

impl TapHubspot {
    /// Create the tap from its configuration
    pub fn new(config: TapConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Tap name
    pub fn name(&self) -> &'static str {
        TAP_NAME
    }

    /// Shared configuration
    pub fn config(&self) -> &Arc<TapConfig> {
        &self.config
    }

    /// Effective start date as of now
    pub fn effective_start_date(&self) -> Result<Option<String>> {
        self.effective_start_date_at(Utc::now())
    }

    /// Effective start date as of `now`
    pub fn effective_start_date_at(&self, now: DateTime<Utc>) -> Result<Option<String>> {
        dates::effective_start_date(
            self.config.start_date.as_deref(),
            self.config.limit_events_month,
            now,
        )
    }

    /// The streams this tap provides, in sync order
    pub fn discover_streams(&self) -> Vec<Box<dyn HubspotStream>> {
        vec![
            Box::new(CrmObjectStream::new(CrmObject::Contacts, Arc::clone(&self.config))),
            Box::new(CrmObjectStream::new(CrmObject::Companies, Arc::clone(&self.config))),
            Box::new(CrmObjectStream::new(CrmObject::Deals, Arc::clone(&self.config))),
            Box::new(EmailEventsStream::new(Arc::clone(&self.config))),
            Box::new(WebEventsStream::new(Arc::clone(&self.config))),
        ]
    }

    /// Discovery catalog with every stream selected by default
    pub fn catalog(&self) -> Catalog {
        Catalog {
            streams: self
                .discover_streams()
                .iter()
                .map(|stream| stream.catalog_entry())
                .collect(),
        }
    }

    /// Tap metadata for `--about`
    pub fn about(&self) -> JsonValue {
        json!({
            "name": TAP_NAME,
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "version": env!("CARGO_PKG_VERSION"),
            "capabilities": ["catalog", "discover", "state", "about"],
            "settings": config_schema().to_json(),
        })
    }

    /// HTTP client settings pointed at the configured API
    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig::for_api(self.config.api_url())
    }

    /// Build an authenticated client. Fails without credentials.
    pub fn connect(&self, http: HttpClientConfig) -> Result<HttpClient> {
        let auth = AuthConfig::from_tap_config(&self.config)?;
        info!(auth = auth.kind(), base_url = self.config.api_url(), "Connecting");
        HttpClient::with_auth(http, auth)
    }

    /// Request one contact to verify credentials and connectivity
    pub async fn check_connection(&self, client: &HttpClient) -> CheckResult {
        let request = StreamRequest::get(CrmObject::Contacts.objects_path()).query("limit", 1);
        match request.send(client).await {
            Ok(_) => CheckResult::success(),
            Err(e) => {
                warn!(error = %e, "Connection check failed");
                CheckResult::failure(e.to_string())
            }
        }
    }
}
