//! State manager implementation
//!
//! Holds the bookmarks for a run. Input state comes from `--state`; output
//! state leaves the tap as Singer `STATE` messages.

use super::types::State;
use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// State manager shared by the sync engine and the streams
#[derive(Debug, Clone, Default)]
pub struct StateManager {
    state: Arc<RwLock<State>>,
}

impl StateManager {
    /// Create an empty state manager
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Create a state manager from existing state
    pub fn from_state(state: State) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Load state from a file. A missing or empty file means no bookmarks.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::in_memory());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
        if contents.trim().is_empty() {
            return Ok(Self::in_memory());
        }

        Self::from_json(&contents)
    }

    /// Create a state manager from inline JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(json)
            .map_err(|e| Error::state(format!("Failed to parse state JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Create a state manager from a JSON value.
    ///
    /// Accepts both bare state and the `{"value": {...}}` envelope some
    /// orchestrators store.
    pub fn from_value(value: JsonValue) -> Result<Self> {
        let value = match value {
            JsonValue::Object(mut map)
                if !map.contains_key("bookmarks")
                    && map.get("value").is_some_and(JsonValue::is_object) =>
            {
                map.remove("value").unwrap_or_default()
            }
            JsonValue::Null => return Ok(Self::in_memory()),
            other => other,
        };

        let state: State = serde_json::from_value(value)
            .map_err(|e| Error::state(format!("Invalid state: {e}")))?;
        Ok(Self::from_state(state))
    }

    /// Copy of the current state
    #[cfg(test)]
    pub(crate) async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Export state as JSON value
    pub async fn to_value(&self) -> Result<JsonValue> {
        let state = self.state.read().await;
        serde_json::to_value(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Bookmark for a stream or one of its partitions
    pub async fn get_bookmark(
        &self,
        stream: &str,
        context: Option<&JsonObject>,
    ) -> Option<JsonValue> {
        let state = self.state.read().await;
        state.get_bookmark(stream, context).cloned()
    }

    /// Move a bookmark forward, returning whether it changed
    pub async fn advance_bookmark(
        &self,
        stream: &str,
        context: Option<&JsonObject>,
        replication_key: &str,
        value: &JsonValue,
    ) -> bool {
        let mut state = self.state.write().await;
        state.advance_bookmark(stream, context, replication_key, value)
    }
}
