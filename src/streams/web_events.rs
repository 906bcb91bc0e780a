//! Contact web analytics events stream

use super::{HubspotStream, ReadContext, StreamRequest};
use crate::config::TapConfig;
use crate::dates::from_epoch_millis;
use crate::error::{Error, Result};
use crate::pagination::{CursorPaginator, PaginationState, Paginator};
use crate::schema::{JsonSchema, SchemaProperty};
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const PATH: &str = "/events/v3/events";
const PAGE_SIZE: u32 = 10_000;
const REPLICATION_KEY: &str = "occurredAt";
const CONTEXT_KEY: &str = "contact_id";

/// How web events are pulled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebEventsMode {
    /// One pass over all contact events
    Global,
    /// One pass per contact synced in this run
    PerContact,
    /// Schema only, no records
    Disabled,
}

impl WebEventsMode {
    /// Pick the mode from configuration. The global flag wins.
    pub fn from_config(config: &TapConfig) -> Self {
        if config.enabled_hubspot_pull_global_web_events {
            Self::Global
        } else if config.enabled_hubspot_pull_web_events {
            Self::PerContact
        } else {
            Self::Disabled
        }
    }
}

/// Web events stream
#[derive(Debug)]
pub struct WebEventsStream {
    mode: WebEventsMode,
    paginator: CursorPaginator,
}

impl WebEventsStream {
    /// Create the stream
    pub fn new(config: Arc<TapConfig>) -> Self {
        Self {
            mode: WebEventsMode::from_config(&config),
            paginator: CursorPaginator::hubspot_v3(),
        }
    }

    /// The configured mode
    pub fn mode(&self) -> WebEventsMode {
        self.mode
    }
}

fn occurred_after(value: &JsonValue) -> Result<String> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => n
            .as_i64()
            .and_then(from_epoch_millis)
            .ok_or_else(|| Error::state(format!("Invalid {REPLICATION_KEY} bookmark: {n}"))),
        other => Err(Error::state(format!(
            "Unsupported bookmark for {REPLICATION_KEY}: {other}"
        ))),
    }
}

#[async_trait]
impl HubspotStream for WebEventsStream {
    fn name(&self) -> &'static str {
        "web_events"
    }

    fn schema(&self) -> JsonSchema {
        let s = SchemaProperty::string;

        JsonSchema::new()
            .property("id", s())
            .property("objectType", s())
            .property("objectId", s())
            .property("eventType", s())
            .property(REPLICATION_KEY, SchemaProperty::datetime())
            .property("utk", s())
            .property("sessionId", s())
            .property(
                "properties",
                SchemaProperty::object([
                    ("hs_base_url", s()),
                    ("hs_url", s()),
                    ("hs_referrer", s()),
                    ("hs_page_title", s()),
                    ("hs_title", s()),
                    ("hs_url_domain", s()),
                    ("hs_url_path", s()),
                    ("hs_user_agent", s()),
                    ("hs_session_id", s()),
                    ("hs_timestamp", s()),
                ]),
            )
            .property(CONTEXT_KEY, s())
    }

    fn replication_key(&self) -> Option<&'static str> {
        Some(REPLICATION_KEY)
    }

    fn records_path(&self) -> &'static str {
        "results"
    }

    fn paginator(&self) -> &dyn Paginator {
        &self.paginator
    }

    fn parent_stream(&self) -> Option<&'static str> {
        match self.mode {
            WebEventsMode::PerContact => Some("contacts"),
            WebEventsMode::Global | WebEventsMode::Disabled => None,
        }
    }

    fn partitions(&self, parent_contexts: &[JsonObject]) -> Vec<Option<JsonObject>> {
        match self.mode {
            WebEventsMode::Global => vec![None],
            WebEventsMode::PerContact => parent_contexts.iter().cloned().map(Some).collect(),
            WebEventsMode::Disabled => {
                debug!("Web events disabled, emitting schema only");
                Vec::new()
            }
        }
    }

    fn build_request(
        &self,
        ctx: &ReadContext<'_>,
        pagination: &PaginationState,
    ) -> Result<StreamRequest> {
        let mut request = StreamRequest::get(PATH)
            .query("objectType", "contact")
            .query("limit", PAGE_SIZE);

        if let Some(contact_id) = ctx.partition.and_then(|p| p.get(CONTEXT_KEY)) {
            let id = match contact_id {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
            request = request.query("objectId", id);
        }

        for (key, value) in self.paginator.initial_params(pagination) {
            request = request.query(key, value);
        }

        if let Some(start) = ctx.starting_value {
            request = request.query("occurredAfter", occurred_after(start)?);
        }

        Ok(request)
    }

    fn post_process(
        &self,
        mut record: JsonObject,
        partition: Option<&JsonObject>,
    ) -> Option<JsonObject> {
        if let Some(contact_id) = partition.and_then(|p| p.get(CONTEXT_KEY)) {
            record.insert(CONTEXT_KEY.to_string(), contact_id.clone());
        }
        Some(record)
    }
}
