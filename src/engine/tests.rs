//! Tests for engine module

use super::*;
use crate::catalog::Catalog;
use crate::config::TapConfig;
use crate::http::HttpClientConfig;
use crate::output::parse_messages;
use crate::streams::{CrmObject, CrmObjectStream, EmailEventsStream, WebEventsStream};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn tap_config(value: Value) -> Arc<TapConfig> {
    Arc::new(TapConfig::from_value(value).unwrap())
}

fn engine(server: &MockServer, state: StateManager) -> SyncEngine<Vec<u8>> {
    let config = HttpClientConfig::for_api(server.uri())
        .without_rate_limit()
        .with_max_retries(0);
    SyncEngine::new(HttpClient::new(config).unwrap(), state, Vec::new())
}

async fn mount_properties(server: &MockServer, object: &str, names: &[&str]) {
    let results: Vec<Value> = names.iter().map(|n| json!({"name": n})).collect();
    Mock::given(method("GET"))
        .and(path(format!("/crm/v3/properties/{object}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": results})))
        .mount(server)
        .await;
}

fn records(messages: &[Message], name: &str) -> Vec<JsonObject> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Record { stream, record, .. } if stream == name => Some(record.clone()),
            _ => None,
        })
        .collect()
}

fn states(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::State { value } => Some(value.clone()),
            _ => None,
        })
        .collect()
}

fn kinds(messages: &[Message]) -> Vec<&'static str> {
    messages
        .iter()
        .map(|m| match m {
            Message::Schema { .. } => "SCHEMA",
            Message::Record { .. } => "RECORD",
            Message::State { .. } => "STATE",
        })
        .collect()
}

// ============================================================================
// SyncConfig / SyncStats Tests
// ============================================================================

#[test]
fn test_sync_config_default() {
    let config = SyncConfig::default();
    assert_eq!(config.max_records, 0);
    assert_eq!(config.state_every, 1000);
    assert_eq!(config.start_date, None);
}

#[test]
fn test_sync_config_builder() {
    let config = SyncConfig::new()
        .with_max_records(50)
        .with_state_every(10)
        .with_start_date(Some("2024-01-01T00:00:00Z".to_string()));

    assert_eq!(config.max_records, 50);
    assert_eq!(config.state_every, 10);
    assert_eq!(config.start_date.as_deref(), Some("2024-01-01T00:00:00Z"));
}

#[test]
fn test_sync_stats_mutations() {
    let mut stats = SyncStats::new();

    stats.add_records(100);
    stats.add_dropped();
    stats.add_page();
    stats.add_page();
    stats.add_stream();
    stats.add_partition();
    stats.set_duration(1500);

    assert_eq!(
        stats,
        SyncStats {
            records_synced: 100,
            records_dropped: 1,
            pages_fetched: 2,
            streams_synced: 1,
            partitions_synced: 1,
            duration_ms: 1500,
        }
    );
}

#[test]
fn test_is_newer() {
    assert!(is_newer(&json!("2024-01-02T00:00:00Z"), None));
    assert!(!is_newer(&Value::Null, None));
    assert!(is_newer(
        &json!("2024-01-02T00:00:00Z"),
        Some(&json!("2024-01-01T23:00:00Z"))
    ));
    assert!(!is_newer(&json!(5), Some(&json!(10))));
}

// ============================================================================
// Sync Tests
// ============================================================================

#[tokio::test]
async fn test_full_listing_pages_and_bookmarks_max() {
    let server = MockServer::start().await;
    mount_properties(&server, "contacts", &["email", "lastmodifieddate"]).await;

    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .and(query_param("properties", "email,lastmodifieddate"))
        .and(query_param_is_missing("after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "1", "properties": {"lastmodifieddate": "2024-01-02T00:00:00Z"}},
                {"id": "2", "properties": {}, "updatedAt": "2024-01-03T00:00:00Z"}
            ],
            "paging": {"next": {"after": "2"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .and(query_param("after", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "3", "properties": {"lastmodifieddate": "2024-01-01T00:00:00Z"}},
                {"id": "4", "properties": {"email": "x@example.com"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let streams: Vec<Box<dyn HubspotStream>> =
        vec![Box::new(CrmObjectStream::new(CrmObject::Contacts, tap_config(json!({}))))];
    let mut engine = engine(&server, StateManager::in_memory());
    let stats = engine.run(&streams, None).await.unwrap();

    assert_eq!(stats.records_synced, 3);
    assert_eq!(stats.records_dropped, 1);
    assert_eq!(stats.pages_fetched, 2);
    assert_eq!(stats.streams_synced, 1);

    let messages = parse_messages(&engine.into_writer()).unwrap();
    assert_eq!(
        kinds(&messages),
        vec!["SCHEMA", "RECORD", "RECORD", "RECORD", "STATE"]
    );

    let emitted = records(&messages, "contacts");
    assert_eq!(emitted[1]["lastmodifieddate"], "2024-01-03T00:00:00Z");

    assert_eq!(
        states(&messages)[0],
        json!({"bookmarks": {"contacts": {
            "replication_key": "lastmodifieddate",
            "replication_key_value": "2024-01-03T00:00:00Z"
        }}})
    );
}

#[tokio::test]
async fn test_bookmark_switches_to_sorted_search() {
    let server = MockServer::start().await;
    mount_properties(&server, "contacts", &["email"]).await;

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts/search"))
        .and(body_partial_json(json!({
            "filterGroups": [{"filters": [{
                "propertyName": "lastmodifieddate",
                "operator": "GTE",
                "value": "1704067200000"
            }]}],
            "properties": ["email"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "5", "properties": {"lastmodifieddate": "2024-01-05T00:00:00Z"}},
                {"id": "6", "properties": {"lastmodifieddate": "2024-01-06T00:00:00Z"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = StateManager::from_value(json!({"bookmarks": {"contacts": {
        "replication_key": "lastmodifieddate",
        "replication_key_value": "2024-01-01T00:00:00Z"
    }}}))
    .unwrap();

    let streams: Vec<Box<dyn HubspotStream>> =
        vec![Box::new(CrmObjectStream::new(CrmObject::Contacts, tap_config(json!({}))))];
    let mut engine = engine(&server, state)
        .with_config(SyncConfig::new().with_state_every(1));
    engine.run(&streams, None).await.unwrap();

    let messages = parse_messages(&engine.into_writer()).unwrap();
    assert_eq!(
        kinds(&messages),
        vec!["SCHEMA", "RECORD", "STATE", "RECORD", "STATE", "STATE"]
    );

    let states = states(&messages);
    assert_eq!(
        states[0]["bookmarks"]["contacts"]["replication_key_value"],
        "2024-01-05T00:00:00Z"
    );
    assert_eq!(
        states[2]["bookmarks"]["contacts"]["replication_key_value"],
        "2024-01-06T00:00:00Z"
    );
}

fn search_filter(start_ms: &str) -> Value {
    json!({"filterGroups": [{"filters": [{
        "propertyName": "lastmodifieddate",
        "operator": "GTE",
        "value": start_ms
    }]}]})
}

#[tokio::test]
async fn test_search_restarts_from_last_value_at_result_cap() {
    let server = MockServer::start().await;
    mount_properties(&server, "contacts", &["email"]).await;

    // 2024-01-01T00:00:00Z, first page
    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts/search"))
        .and(body_partial_json(search_filter("1704067200000")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "1", "properties": {"lastmodifieddate": "2024-01-02T00:00:00Z"}},
                {"id": "2", "properties": {"lastmodifieddate": "2024-01-03T00:00:00Z"}}
            ],
            "paging": {"next": {"after": "10000"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    // 2024-01-03T00:00:00Z, restarted without a cursor
    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts/search"))
        .and(body_partial_json(search_filter("1704240000000")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "2", "properties": {"lastmodifieddate": "2024-01-03T00:00:00Z"}},
                {"id": "3", "properties": {"lastmodifieddate": "2024-01-04T00:00:00Z"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let streams: Vec<Box<dyn HubspotStream>> =
        vec![Box::new(CrmObjectStream::new(CrmObject::Contacts, tap_config(json!({}))))];
    let mut engine = engine(&server, StateManager::in_memory()).with_config(
        SyncConfig::new().with_start_date(Some("2024-01-01T00:00:00Z".to_string())),
    );
    engine.run(&streams, None).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let searches: Vec<Value> = requests
        .iter()
        .filter(|r| r.url.path().ends_with("/search"))
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(searches.len(), 2);
    assert!(searches[1].get("after").is_none());

    let messages = parse_messages(&engine.into_writer()).unwrap();
    let ids: Vec<Value> = records(&messages, "contacts")
        .into_iter()
        .map(|r| r["id"].clone())
        .collect();
    assert_eq!(ids, vec![json!("1"), json!("2"), json!("2"), json!("3")]);
    assert_eq!(
        states(&messages).pop().unwrap()["bookmarks"]["contacts"]["replication_key_value"],
        "2024-01-04T00:00:00Z"
    );
}

#[tokio::test]
async fn test_start_date_used_without_bookmark() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/email/public/v1/events"))
        .and(query_param("startTimestamp", "1704067200000"))
        .and(query_param_is_missing("offset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [{"id": "a", "created": 1_704_100_000_000_i64}],
            "hasMore": true,
            "offset": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/email/public/v1/events"))
        .and(query_param("offset", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [{"id": "b", "created": 1_704_090_000_000_i64}],
            "hasMore": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let streams: Vec<Box<dyn HubspotStream>> =
        vec![Box::new(EmailEventsStream::new(tap_config(json!({}))))];
    let mut engine = engine(&server, StateManager::in_memory()).with_config(
        SyncConfig::new().with_start_date(Some("2024-01-01T00:00:00Z".to_string())),
    );
    engine.run(&streams, None).await.unwrap();

    assert_eq!(
        engine.state().get_bookmark("email_events", None).await,
        Some(json!(1_704_100_000_000_i64))
    );
}

#[tokio::test]
async fn test_child_stream_reads_parent_contexts() {
    let server = MockServer::start().await;
    mount_properties(&server, "contacts", &["email"]).await;

    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "11", "updatedAt": "2024-01-02T00:00:00Z"},
                {"id": "12", "updatedAt": "2024-01-03T00:00:00Z"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    for (contact, occurred) in [("11", "2024-02-01T00:00:00Z"), ("12", "2024-02-02T00:00:00Z")] {
        Mock::given(method("GET"))
            .and(path("/events/v3/events"))
            .and(query_param("objectType", "contact"))
            .and(query_param("objectId", contact))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": format!("w{contact}"), "occurredAt": occurred}]
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let config = tap_config(json!({"enabled_hubspot_pull_web_events": true}));
    let streams: Vec<Box<dyn HubspotStream>> = vec![
        Box::new(CrmObjectStream::new(CrmObject::Contacts, Arc::clone(&config))),
        Box::new(WebEventsStream::new(Arc::clone(&config))),
    ];

    let mut catalog = Catalog {
        streams: streams.iter().map(|s| s.catalog_entry()).collect(),
    };
    catalog.streams[0].selected = Some(false);

    let mut engine = engine(&server, StateManager::in_memory());
    let stats = engine.run(&streams, Some(&catalog)).await.unwrap();
    assert_eq!(stats.streams_synced, 1);
    assert_eq!(stats.partitions_synced, 3);

    let messages = parse_messages(&engine.into_writer()).unwrap();
    assert!(records(&messages, "contacts").is_empty());

    let events = records(&messages, "web_events");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["contact_id"], "11");
    assert_eq!(events[1]["contact_id"], "12");

    let state = states(&messages).pop().unwrap();
    assert!(state["bookmarks"].get("contacts").is_none());
    assert_eq!(
        state["bookmarks"]["web_events"]["partitions"],
        json!([
            {
                "context": {"contact_id": "11"},
                "replication_key": "occurredAt",
                "replication_key_value": "2024-02-01T00:00:00Z"
            },
            {
                "context": {"contact_id": "12"},
                "replication_key": "occurredAt",
                "replication_key_value": "2024-02-02T00:00:00Z"
            }
        ])
    );
}

#[tokio::test]
async fn test_web_events_resume_from_partition_bookmarks() {
    let server = MockServer::start().await;
    mount_properties(&server, "contacts", &["email"]).await;

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "21", "properties": {"lastmodifieddate": "2024-03-01T00:00:00Z"}},
                {"id": "22", "properties": {"lastmodifieddate": "2024-03-02T00:00:00Z"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    for (contact, after, occurred) in [
        ("21", "2024-02-10T00:00:00Z", "2024-02-15T00:00:00Z"),
        ("22", "2024-01-01T00:00:00Z", "2024-01-20T00:00:00Z"),
    ] {
        Mock::given(method("GET"))
            .and(path("/events/v3/events"))
            .and(query_param("objectId", contact))
            .and(query_param("occurredAfter", after))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": format!("w{contact}"), "occurredAt": occurred}]
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let state = StateManager::from_value(json!({"bookmarks": {"web_events": {"partitions": [{
        "context": {"contact_id": "21"},
        "replication_key": "occurredAt",
        "replication_key_value": "2024-02-10T00:00:00Z"
    }]}}}))
    .unwrap();

    let config = tap_config(json!({"enabled_hubspot_pull_web_events": true}));
    let streams: Vec<Box<dyn HubspotStream>> = vec![
        Box::new(CrmObjectStream::new(CrmObject::Contacts, Arc::clone(&config))),
        Box::new(WebEventsStream::new(Arc::clone(&config))),
    ];
    let mut engine = engine(&server, state).with_config(
        SyncConfig::new().with_start_date(Some("2024-01-01T00:00:00Z".to_string())),
    );
    engine.run(&streams, None).await.unwrap();

    let messages = parse_messages(&engine.into_writer()).unwrap();
    assert_eq!(records(&messages, "web_events").len(), 2);

    let state = states(&messages).pop().unwrap();
    assert_eq!(
        state["bookmarks"]["web_events"]["partitions"],
        json!([
            {
                "context": {"contact_id": "21"},
                "replication_key": "occurredAt",
                "replication_key_value": "2024-02-15T00:00:00Z"
            },
            {
                "context": {"contact_id": "22"},
                "replication_key": "occurredAt",
                "replication_key_value": "2024-01-20T00:00:00Z"
            }
        ])
    );
}

#[tokio::test]
async fn test_disabled_web_events_emit_schema_only() {
    let server = MockServer::start().await;

    let streams: Vec<Box<dyn HubspotStream>> =
        vec![Box::new(WebEventsStream::new(tap_config(json!({}))))];
    let mut engine = engine(&server, StateManager::in_memory());
    engine.run(&streams, None).await.unwrap();

    let messages = parse_messages(&engine.into_writer()).unwrap();
    assert_eq!(kinds(&messages), vec!["SCHEMA", "STATE"]);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_max_records_caps_stream() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/email/public/v1/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [
                {"id": "a", "created": 3},
                {"id": "b", "created": 2},
                {"id": "c", "created": 1}
            ],
            "hasMore": true,
            "offset": "next"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let streams: Vec<Box<dyn HubspotStream>> =
        vec![Box::new(EmailEventsStream::new(tap_config(json!({}))))];
    let mut engine = engine(&server, StateManager::in_memory())
        .with_config(SyncConfig::new().with_max_records(2));
    let stats = engine.run(&streams, None).await.unwrap();

    assert_eq!(stats.records_synced, 2);
    assert_eq!(engine.state().get_bookmark("email_events", None).await, None);
}

#[tokio::test]
async fn test_unselected_streams_are_skipped() {
    let server = MockServer::start().await;

    let config = tap_config(json!({}));
    let streams: Vec<Box<dyn HubspotStream>> = vec![
        Box::new(CrmObjectStream::new(CrmObject::Deals, Arc::clone(&config))),
        Box::new(EmailEventsStream::new(Arc::clone(&config))),
    ];
    let catalog = Catalog {
        streams: vec![streams[1].catalog_entry()],
    };

    Mock::given(method("GET"))
        .and(path("/email/public/v1/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"events": [], "hasMore": false})))
        .expect(1)
        .mount(&server)
        .await;

    let mut engine = engine(&server, StateManager::in_memory());
    engine.run(&streams, Some(&catalog)).await.unwrap();

    let messages = parse_messages(&engine.into_writer()).unwrap();
    assert!(messages
        .iter()
        .all(|m| m.stream().map_or(true, |s| s == "email_events")));
}

#[tokio::test]
async fn test_http_error_stops_sync() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/email/public/v1/events"))
        .respond_with(ResponseTemplate::new(403).set_body_string("missing scopes"))
        .mount(&server)
        .await;

    let streams: Vec<Box<dyn HubspotStream>> =
        vec![Box::new(EmailEventsStream::new(tap_config(json!({}))))];
    let mut engine = engine(&server, StateManager::in_memory());
    let err = engine.run(&streams, None).await.unwrap_err();
    assert!(err.to_string().contains("403"));
}
