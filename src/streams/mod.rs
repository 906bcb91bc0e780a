//! HubSpot streams
//!
//! Each stream describes one record type: its schema, how to build the
//! request for a page, and how to clean records. The sync engine owns the
//! loop that sends requests, follows pagination and advances bookmarks.
//!
//! - `CrmObjectStream` - contacts, companies and deals
//! - `EmailEventsStream` - legacy marketing email events
//! - `WebEventsStream` - contact web analytics events

mod crm;
mod email_events;
mod web_events;

pub use crm::{CrmObject, CrmObjectStream};
pub use email_events::EmailEventsStream;
pub use web_events::{WebEventsMode, WebEventsStream};

use crate::catalog::CatalogEntry;
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::pagination::{value_at, PaginationState, Paginator};
use crate::schema::JsonSchema;
use crate::types::{JsonObject, JsonValue, Method};
use async_trait::async_trait;
use tracing::warn;

/// Inputs for building one page request
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadContext<'a> {
    /// Bookmark for this stream or partition, else the effective start date
    pub starting_value: Option<&'a JsonValue>,
    /// Partition context (for child streams)
    pub partition: Option<&'a JsonObject>,
}

/// A request for one page of records
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the API base URL
    pub path: String,
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// JSON body
    pub body: Option<JsonValue>,
}

impl StreamRequest {
    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Create a POST request with a JSON body
    pub fn post(path: impl Into<String>, body: JsonValue) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Look up a query parameter
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Send the request and parse the JSON response
    pub async fn send(self, client: &HttpClient) -> Result<JsonValue> {
        let config = RequestConfig {
            query: self.query,
            body: self.body,
            max_retries: None,
        };
        client
            .request_json(self.method.into(), &self.path, &config)
            .await
    }
}

/// A HubSpot stream
#[async_trait]
pub trait HubspotStream: Send + Sync {
    /// Stream name
    fn name(&self) -> &'static str;

    /// JSON schema of emitted records
    fn schema(&self) -> JsonSchema;

    /// Primary key properties
    fn key_properties(&self) -> &'static [&'static str] {
        &["id"]
    }

    /// Replication key, if incremental
    fn replication_key(&self) -> Option<&'static str>;

    /// Dotted path of the record array in a response
    fn records_path(&self) -> &'static str;

    /// Pagination strategy
    fn paginator(&self) -> &dyn Paginator;

    /// Name of the stream whose records provide this stream's contexts
    fn parent_stream(&self) -> Option<&'static str> {
        None
    }

    /// Contexts to read, given the child contexts produced by the parent.
    ///
    /// `None` entries mean an unpartitioned pass. An empty list means the
    /// stream emits its schema and no records.
    fn partitions(&self, _parent_contexts: &[JsonObject]) -> Vec<Option<JsonObject>> {
        vec![None]
    }

    /// One-time setup before the first request
    async fn prepare(&self, _client: &HttpClient) -> Result<()> {
        Ok(())
    }

    /// Build the request for the current page
    fn build_request(
        &self,
        ctx: &ReadContext<'_>,
        pagination: &PaginationState,
    ) -> Result<StreamRequest>;

    /// Whether records arrive ordered by the replication key
    fn is_sorted(&self, _ctx: &ReadContext<'_>) -> bool {
        false
    }

    /// Whether the server refuses to page past `pagination`.
    ///
    /// Only asked for sorted reads. The engine then starts a fresh query
    /// from the replication value of the last record read.
    fn query_exhausted(&self, _pagination: &PaginationState) -> bool {
        false
    }

    /// Clean a record. `None` drops it.
    fn post_process(&self, record: JsonObject, _partition: Option<&JsonObject>) -> Option<JsonObject> {
        Some(record)
    }

    /// Context handed to child streams for a record
    fn child_context(&self, _record: &JsonObject) -> Option<JsonObject> {
        None
    }

    /// Pull records out of a response body
    fn extract_records(&self, body: &JsonValue) -> Result<Vec<JsonObject>> {
        extract_records(body, self.records_path(), self.name())
    }

    /// Discovery catalog entry
    fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry::discovered(
            self.name(),
            &self.schema(),
            self.key_properties(),
            self.replication_key(),
        )
    }
}

/// Extract the object array at `path`. A missing array is an empty page.
pub fn extract_records(body: &JsonValue, path: &str, stream: &str) -> Result<Vec<JsonObject>> {
    let Some(value) = value_at(body, path) else {
        warn!(stream, path, "Response has no records array");
        return Ok(Vec::new());
    };

    let items = match value {
        JsonValue::Array(items) => items,
        JsonValue::Null => return Ok(Vec::new()),
        other => {
            return Err(Error::record_extraction(
                path,
                format!("expected an array, found {}", json_kind(other)),
            ))
        }
    };

    items
        .iter()
        .map(|item| match item {
            JsonValue::Object(map) => Ok(map.clone()),
            other => Err(Error::record_extraction(
                path,
                format!("expected objects, found {}", json_kind(other)),
            )),
        })
        .collect()
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
