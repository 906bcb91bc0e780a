//! CRM object streams (contacts, companies, deals)
//!
//! Without a starting value the stream lists every object. With one it
//! switches to the search endpoint, filtered and sorted on the replication
//! key, so bookmarks can advance record by record.

use super::{extract_records, HubspotStream, ReadContext, StreamRequest};
use crate::config::TapConfig;
use crate::dates::to_epoch_millis;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::pagination::{CursorPaginator, PaginationState, Paginator};
use crate::schema::{JsonSchema, SchemaProperty};
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Page size for list and search requests
const PAGE_SIZE: u32 = 100;

/// Search requests cannot reach past this many results of one query
const SEARCH_RESULT_CAP: u64 = 10_000;

/// Properties tried, in order, when the replication key is missing
const FALLBACK_PROPERTIES: [&str; 2] = ["lastmodifieddate", "hs_lastmodifieddate"];

/// Top-level fields tried after the property fallbacks
const FALLBACK_FIELDS: [&str; 2] = ["updatedAt", "createdAt"];

/// CRM object types synced by the tap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrmObject {
    /// Contacts
    Contacts,
    /// Companies
    Companies,
    /// Deals
    Deals,
}

impl CrmObject {
    /// Stream and API object name
    pub fn name(self) -> &'static str {
        match self {
            Self::Contacts => "contacts",
            Self::Companies => "companies",
            Self::Deals => "deals",
        }
    }

    /// Property tracking the last modification
    pub fn replication_key(self) -> &'static str {
        match self {
            Self::Contacts => "lastmodifieddate",
            Self::Companies | Self::Deals => "hs_lastmodifieddate",
        }
    }

    /// Path of the objects endpoint
    pub fn objects_path(self) -> String {
        format!("/crm/v3/objects/{}", self.name())
    }

    /// Path of the properties endpoint
    pub fn properties_path(self) -> String {
        format!("/crm/v3/properties/{}", self.name())
    }
}

/// Stream over one CRM object type
#[derive(Debug)]
pub struct CrmObjectStream {
    object: CrmObject,
    config: Arc<TapConfig>,
    paginator: CursorPaginator,
    properties: OnceLock<Vec<String>>,
}

impl CrmObjectStream {
    /// Create a stream for a CRM object type
    pub fn new(object: CrmObject, config: Arc<TapConfig>) -> Self {
        Self {
            object,
            config,
            paginator: CursorPaginator::hubspot_v3(),
            properties: OnceLock::new(),
        }
    }

    /// Shared tap configuration
    pub fn config(&self) -> &TapConfig {
        &self.config
    }

    /// Property names loaded by `prepare`
    pub fn property_names(&self) -> &[String] {
        self.properties.get().map(Vec::as_slice).unwrap_or_default()
    }

    /// Use a fixed property list instead of asking the API
    pub fn set_property_names(&self, names: Vec<String>) {
        let _ = self.properties.set(names);
    }

    fn start_millis(&self, value: &JsonValue) -> Result<i64> {
        let key = self.object.replication_key();
        match value {
            JsonValue::Number(n) => n.as_i64().ok_or_else(|| {
                Error::state(format!("Bookmark for {key} is not an integer: {n}"))
            }),
            JsonValue::String(s) => to_epoch_millis(key, s),
            other => Err(Error::state(format!(
                "Unsupported bookmark for {key}: {other}"
            ))),
        }
    }

    fn list_request(&self, pagination: &PaginationState) -> StreamRequest {
        let mut request = StreamRequest::get(self.object.objects_path())
            .query("limit", PAGE_SIZE)
            .query("archived", false);
        if !self.property_names().is_empty() {
            request = request.query("properties", self.property_names().join(","));
        }
        for (key, value) in self.paginator.initial_params(pagination) {
            request = request.query(key, value);
        }
        request
    }

    fn search_request(&self, start_ms: i64, pagination: &PaginationState) -> StreamRequest {
        let key = self.object.replication_key();
        let mut body = json!({
            "filterGroups": [{
                "filters": [{
                    "propertyName": key,
                    "operator": "GTE",
                    "value": start_ms.to_string(),
                }]
            }],
            "sorts": [{"propertyName": key, "direction": "ASCENDING"}],
            "limit": PAGE_SIZE,
            "properties": self.property_names(),
        });
        if let Some(after) = &pagination.cursor {
            body["after"] = JsonValue::from(after.as_str());
        }
        StreamRequest::post(format!("{}/search", self.object.objects_path()), body)
    }
}

#[async_trait]
impl HubspotStream for CrmObjectStream {
    fn name(&self) -> &'static str {
        self.object.name()
    }

    fn schema(&self) -> JsonSchema {
        JsonSchema::new()
            .property("id", SchemaProperty::string())
            .property("properties", SchemaProperty::free_object())
            .property("createdAt", SchemaProperty::datetime())
            .property("updatedAt", SchemaProperty::datetime())
            .property("archived", SchemaProperty::boolean())
            .property("archivedAt", SchemaProperty::datetime())
            .property(self.object.replication_key(), SchemaProperty::datetime())
    }

    fn replication_key(&self) -> Option<&'static str> {
        Some(self.object.replication_key())
    }

    fn records_path(&self) -> &'static str {
        "results"
    }

    fn paginator(&self) -> &dyn Paginator {
        &self.paginator
    }

    async fn prepare(&self, client: &HttpClient) -> Result<()> {
        if self.properties.get().is_some() {
            return Ok(());
        }

        let path = self.object.properties_path();
        let body = StreamRequest::get(&path).send(client).await?;
        let names: Vec<String> = extract_records(&body, "results", self.name())?
            .iter()
            .filter_map(|p| p.get("name").and_then(JsonValue::as_str))
            .map(ToString::to_string)
            .collect();

        info!(
            stream = self.name(),
            count = names.len(),
            "Loaded property definitions"
        );
        self.set_property_names(names);
        Ok(())
    }

    fn build_request(
        &self,
        ctx: &ReadContext<'_>,
        pagination: &PaginationState,
    ) -> Result<StreamRequest> {
        match ctx.starting_value {
            Some(start) => Ok(self.search_request(self.start_millis(start)?, pagination)),
            None => Ok(self.list_request(pagination)),
        }
    }

    fn is_sorted(&self, ctx: &ReadContext<'_>) -> bool {
        ctx.starting_value.is_some()
    }

    fn query_exhausted(&self, pagination: &PaginationState) -> bool {
        pagination
            .cursor
            .as_deref()
            .and_then(|after| after.parse::<u64>().ok())
            .is_some_and(|after| after + u64::from(PAGE_SIZE) > SEARCH_RESULT_CAP)
    }

    fn post_process(
        &self,
        mut record: JsonObject,
        _partition: Option<&JsonObject>,
    ) -> Option<JsonObject> {
        let key = self.object.replication_key();
        let value = promoted_replication_value(&record, key);

        match value {
            Some(value) => {
                record.insert(key.to_string(), value);
                Some(record)
            }
            None => {
                debug!(
                    stream = self.name(),
                    id = ?record.get("id"),
                    "Dropping record without a modification timestamp"
                );
                None
            }
        }
    }

    fn child_context(&self, record: &JsonObject) -> Option<JsonObject> {
        if self.object != CrmObject::Contacts {
            return None;
        }
        let id = record.get("id")?.clone();
        let mut context = JsonObject::new();
        context.insert("contact_id".to_string(), id);
        Some(context)
    }
}

/// First usable value among the replication key, its fallbacks and the
/// object timestamps
fn promoted_replication_value(record: &JsonObject, key: &str) -> Option<JsonValue> {
    let usable = |v: &&JsonValue| match v {
        JsonValue::Null => false,
        JsonValue::String(s) => !s.is_empty(),
        _ => true,
    };

    let properties = record.get("properties").and_then(JsonValue::as_object);
    let from_properties = properties.and_then(|props| {
        std::iter::once(key)
            .chain(FALLBACK_PROPERTIES)
            .find_map(|name| props.get(name).filter(usable))
    });

    from_properties
        .or_else(|| {
            FALLBACK_FIELDS
                .iter()
                .find_map(|name| record.get(*name).filter(usable))
        })
        .cloned()
}
