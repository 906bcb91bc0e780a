//! Tests for StateManager

use super::*;
use crate::types::JsonObject;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

// ============================================================================
// Construction Tests
// ============================================================================

#[tokio::test]
async fn test_state_manager_in_memory() {
    let manager = StateManager::in_memory();
    assert_eq!(manager.snapshot().await, State::new());
}

#[tokio::test]
async fn test_from_json() {
    let manager = StateManager::from_json(
        r#"{"bookmarks": {"contacts": {"replication_key": "lastmodifieddate",
            "replication_key_value": "2024-05-01T00:00:00Z"}}}"#,
    )
    .unwrap();

    assert_eq!(
        manager.get_bookmark("contacts", None).await,
        Some(json!("2024-05-01T00:00:00Z"))
    );
    assert!(manager.get_bookmark("deals", None).await.is_none());
}

#[tokio::test]
async fn test_from_json_value_envelope() {
    let manager = StateManager::from_json(
        r#"{"value": {"bookmarks": {"email_events": {"replication_key_value": 1700000000000}}}}"#,
    )
    .unwrap();

    assert_eq!(
        manager.get_bookmark("email_events", None).await,
        Some(json!(1_700_000_000_000_i64))
    );
}

#[tokio::test]
async fn test_from_json_empty_object() {
    let manager = StateManager::from_json("{}").unwrap();
    assert!(manager.snapshot().await.bookmarks.is_empty());
}

#[test]
fn test_from_json_invalid() {
    let err = StateManager::from_json("not json").unwrap_err();
    assert!(matches!(err, crate::error::Error::State { .. }));

    let err = StateManager::from_json(r#"{"bookmarks": []}"#).unwrap_err();
    assert!(matches!(err, crate::error::Error::State { .. }));
}

// ============================================================================
// File Tests
// ============================================================================

#[tokio::test]
async fn test_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(
        &path,
        r#"{"bookmarks": {"deals": {"replication_key": "hs_lastmodifieddate",
            "replication_key_value": "2024-02-02T00:00:00Z"}}}"#,
    )
    .unwrap();

    let manager = StateManager::from_file(&path).unwrap();
    assert_eq!(
        manager.get_bookmark("deals", None).await,
        Some(json!("2024-02-02T00:00:00Z"))
    );
}

#[tokio::test]
async fn test_from_missing_or_empty_file() {
    let dir = tempdir().unwrap();

    let manager = StateManager::from_file(dir.path().join("missing.json")).unwrap();
    assert!(manager.snapshot().await.bookmarks.is_empty());

    let empty = dir.path().join("empty.json");
    std::fs::write(&empty, "  \n").unwrap();
    let manager = StateManager::from_file(&empty).unwrap();
    assert!(manager.snapshot().await.bookmarks.is_empty());
}

// ============================================================================
// Bookmark Tests
// ============================================================================

#[tokio::test]
async fn test_advance_and_export() {
    let manager = StateManager::in_memory();

    assert!(
        manager
            .advance_bookmark("email_events", None, "created", &json!(200))
            .await
    );
    assert!(
        !manager
            .advance_bookmark("email_events", None, "created", &json!(100))
            .await
    );

    assert_eq!(
        manager.to_value().await.unwrap(),
        json!({"bookmarks": {"email_events": {
            "replication_key": "created",
            "replication_key_value": 200
        }}})
    );
}

#[tokio::test]
async fn test_partition_bookmarks() {
    let manager = StateManager::in_memory();
    let mut ctx = JsonObject::new();
    ctx.insert("contact_id".to_string(), json!("42"));

    manager
        .advance_bookmark("web_events", Some(&ctx), "occurredAt", &json!("2024-01-01T00:00:00Z"))
        .await;

    assert_eq!(
        manager.get_bookmark("web_events", Some(&ctx)).await,
        Some(json!("2024-01-01T00:00:00Z"))
    );
    assert!(manager.get_bookmark("web_events", None).await.is_none());
}

#[tokio::test]
async fn test_clones_share_state() {
    let manager = StateManager::in_memory();
    let clone = manager.clone();

    clone
        .advance_bookmark("companies", None, "hs_lastmodifieddate", &json!("2024-01-01T00:00:00Z"))
        .await;

    assert!(manager.get_bookmark("companies", None).await.is_some());

    manager
        .advance_bookmark("companies", None, "hs_lastmodifieddate", &json!("2024-02-01T00:00:00Z"))
        .await;
    assert_eq!(
        clone.get_bookmark("companies", None).await,
        Some(json!("2024-02-01T00:00:00Z"))
    );
}
