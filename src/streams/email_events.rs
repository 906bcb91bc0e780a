//! Marketing email events stream
//!
//! Reads the legacy events API. Timestamps on both the request and the
//! records are epoch milliseconds.

use super::{HubspotStream, ReadContext, StreamRequest};
use crate::config::TapConfig;
use crate::dates::to_epoch_millis;
use crate::error::{Error, Result};
use crate::pagination::{CursorPaginator, PaginationState, Paginator};
use crate::schema::{JsonSchema, SchemaProperty};
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use std::sync::Arc;

const PATH: &str = "/email/public/v1/events";
const PAGE_SIZE: u32 = 1000;
const REPLICATION_KEY: &str = "created";

/// Browser fields the API sometimes delivers as arrays
const BROWSER_FIELDS: [&str; 7] = [
    "name",
    "family",
    "producer",
    "producerUrl",
    "type",
    "url",
    "version",
];

/// Email events stream
#[derive(Debug)]
pub struct EmailEventsStream {
    config: Arc<TapConfig>,
    paginator: CursorPaginator,
}

impl EmailEventsStream {
    /// Create the stream
    pub fn new(config: Arc<TapConfig>) -> Self {
        Self {
            config,
            paginator: CursorPaginator::offset_has_more(),
        }
    }
}

/// Convert a starting value (bookmark or date) to epoch milliseconds
fn start_timestamp(value: &JsonValue) -> Result<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().ok_or_else(|| {
            Error::state(format!("Bookmark for {REPLICATION_KEY} is not an integer: {n}"))
        }),
        JsonValue::String(s) => to_epoch_millis(REPLICATION_KEY, s),
        other => Err(Error::state(format!(
            "Unsupported bookmark for {REPLICATION_KEY}: {other}"
        ))),
    }
}

/// Collapse an array-valued browser field into a single value
fn normalize_browser_value(values: &[JsonValue]) -> JsonValue {
    match values {
        [] => JsonValue::Null,
        [JsonValue::String(s)] if s.is_empty() => JsonValue::Null,
        [single] => single.clone(),
        many => {
            let joined = many
                .iter()
                .filter_map(|v| match v {
                    JsonValue::Null => None,
                    JsonValue::String(s) if s.is_empty() => None,
                    JsonValue::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect::<Vec<_>>()
                .join(", ");
            JsonValue::String(joined)
        }
    }
}

#[async_trait]
impl HubspotStream for EmailEventsStream {
    fn name(&self) -> &'static str {
        "email_events"
    }

    fn schema(&self) -> JsonSchema {
        let s = SchemaProperty::string;
        let i = SchemaProperty::integer;

        JsonSchema::new()
            .property("id", s())
            .property("emailCampaignId", i())
            .property("recipient", s())
            .property("type", s())
            .property(REPLICATION_KEY, i())
            .property("url", s())
            .property("urlId", i())
            .property("linkId", i())
            .property("userAgent", s())
            .property("ipAddress", s())
            .property(
                "browser",
                SchemaProperty::object(BROWSER_FIELDS.iter().map(|f| (*f, s()))),
            )
            .property(
                "location",
                SchemaProperty::object([
                    ("city", s()),
                    ("state", s()),
                    ("country", s()),
                    ("zipcode", s()),
                    ("latitude", SchemaProperty::number()),
                    ("longitude", SchemaProperty::number()),
                ]),
            )
            .property("referer", s())
            .property("portalId", i())
            .property("appId", i())
            .property(
                "sentBy",
                SchemaProperty::object([("id", s()), ("created", i())]),
            )
            .property("smtpId", s())
            .property("status", s())
            .property("response", s())
            .property("attempt", i())
            .property("category", s())
            .property("subject", s())
            .property("from", s())
            .property("cc", SchemaProperty::array(s()))
            .property("bcc", SchemaProperty::array(s()))
            .property("appName", s())
            .property("deviceType", s())
            .property("filteredEvent", SchemaProperty::boolean())
            .property("duration", i())
            .property("emailCampaignGroupId", i())
            .property("source", s())
            .property("sourceId", s())
            .property(
                "subscriptions",
                SchemaProperty::array(SchemaProperty::object([
                    ("id", i()),
                    ("status", s()),
                    (
                        "legalBasisChange",
                        SchemaProperty::object([
                            ("legalBasisType", s()),
                            ("legalBasisExplanation", s()),
                            ("optState", s()),
                        ]),
                    ),
                ])),
            )
            .property("portalSubscriptionStatus", s())
    }

    fn replication_key(&self) -> Option<&'static str> {
        Some(REPLICATION_KEY)
    }

    fn records_path(&self) -> &'static str {
        "events"
    }

    fn paginator(&self) -> &dyn Paginator {
        &self.paginator
    }

    fn build_request(
        &self,
        ctx: &ReadContext<'_>,
        pagination: &PaginationState,
    ) -> Result<StreamRequest> {
        let mut request = StreamRequest::get(PATH).query("limit", PAGE_SIZE);

        for (key, value) in self.paginator.initial_params(pagination) {
            request = request.query(key, value);
        }

        if let Some(start) = ctx.starting_value {
            request = request.query("startTimestamp", start_timestamp(start)?);
        }

        if let Some(end_date) = self.config.end_date.as_deref().filter(|d| !d.is_empty()) {
            request = request.query("endTimestamp", to_epoch_millis("end_date", end_date)?);
        }

        Ok(request)
    }

    fn post_process(
        &self,
        mut record: JsonObject,
        _partition: Option<&JsonObject>,
    ) -> Option<JsonObject> {
        if let Some(JsonValue::Object(browser)) = record.get_mut("browser") {
            for field in BROWSER_FIELDS {
                let Some(slot) = browser.get_mut(field) else {
                    continue;
                };
                let normalized = match slot {
                    JsonValue::Array(values) => normalize_browser_value(values),
                    _ => continue,
                };
                *slot = normalized;
            }
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(json!([]), JsonValue::Null ; "empty array")]
    #[test_case(json!([""]), JsonValue::Null ; "single empty string")]
    #[test_case(json!(["Chrome"]), json!("Chrome") ; "single value")]
    #[test_case(json!(["Chrome", "", "Safari"]), json!("Chrome, Safari") ; "joined without blanks")]
    #[test_case(json!(["A", null, 3]), json!("A, 3") ; "mixed values")]
    fn test_normalize_browser_value(input: JsonValue, expected: JsonValue) {
        let values = input.as_array().cloned().unwrap();
        assert_eq!(normalize_browser_value(&values), expected);
    }

    #[test]
    fn test_start_timestamp() {
        assert_eq!(
            start_timestamp(&json!(1_700_000_000_000_i64)).unwrap(),
            1_700_000_000_000
        );
        assert_eq!(
            start_timestamp(&json!("2024-01-01T00:00:00Z")).unwrap(),
            1_704_067_200_000
        );
        assert!(start_timestamp(&json!("yesterday")).is_err());
        assert!(start_timestamp(&json!(true)).is_err());
    }
}
