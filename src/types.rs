//! Shared types: JSON aliases and the small enums several modules agree on

use serde::{Deserialize, Serialize};

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// A record, a stream context or any other JSON object
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// HTTP methods the HubSpot endpoints use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Listing and legacy endpoints
    #[default]
    GET,
    /// CRM search
    POST,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
        }
    }
}

/// Singer `replication-method` of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationMethod {
    #[default]
    FullTable,
    Incremental,
}

/// Delay growth between retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    Constant,
    Linear,
    #[default]
    Exponential,
}

/// Config values where an empty string means "not set"
pub trait NonEmpty {
    /// The value, unless it is missing or empty
    fn non_empty(&self) -> Option<&str>;
}

impl NonEmpty for Option<String> {
    fn non_empty(&self) -> Option<&str> {
        self.as_deref().filter(|s| !s.is_empty())
    }
}
