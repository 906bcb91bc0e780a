//! State types for tracking sync progress
//!
//! These types serialize to the Singer state shape:
//!
//! ```json
//! {"bookmarks": {"contacts": {"replication_key": "lastmodifieddate",
//!                             "replication_key_value": "2024-01-01T00:00:00Z"}}}
//! ```

use crate::types::{JsonObject, JsonValue};
use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

/// Complete state for the tap
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream bookmarks
    #[serde(default)]
    pub bookmarks: BTreeMap<String, StreamState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamState> {
        self.bookmarks.get(stream)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, stream: &str) -> &mut StreamState {
        self.bookmarks.entry(stream.to_string()).or_default()
    }

    /// Bookmark value for a stream, or for one partition of it
    pub fn get_bookmark(&self, stream: &str, context: Option<&JsonObject>) -> Option<&JsonValue> {
        let stream_state = self.bookmarks.get(stream)?;
        match context {
            Some(ctx) => stream_state
                .get_partition(ctx)?
                .replication_key_value
                .as_ref(),
            None => stream_state.replication_key_value.as_ref(),
        }
    }

    /// Move a bookmark forward. Older or equal values leave it untouched.
    ///
    /// Returns whether the bookmark changed.
    pub fn advance_bookmark(
        &mut self,
        stream: &str,
        context: Option<&JsonObject>,
        replication_key: &str,
        value: &JsonValue,
    ) -> bool {
        if value.is_null() {
            return false;
        }

        let stream_state = self.get_stream_mut(stream);
        let (key_slot, value_slot) = match context {
            Some(ctx) => {
                let partition = stream_state.get_partition_mut(ctx);
                (
                    &mut partition.replication_key,
                    &mut partition.replication_key_value,
                )
            }
            None => (
                &mut stream_state.replication_key,
                &mut stream_state.replication_key_value,
            ),
        };

        let newer = match value_slot {
            Some(current) => compare_replication_values(value, current) == Ordering::Greater,
            None => true,
        };

        if newer {
            *key_slot = Some(replication_key.to_string());
            *value_slot = Some(value.clone());
        }
        newer
    }
}

/// Bookmark for a single stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    /// Name of the replication key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    /// Highest replication key value seen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key_value: Option<JsonValue>,

    /// Per-context bookmarks (for child streams)
    #[serde(default, skip_serializing_if = "Partitions::is_empty")]
    pub partitions: Partitions,
}

impl StreamState {
    /// Create a new empty stream state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get partition state
    pub fn get_partition(&self, context: &JsonObject) -> Option<&PartitionState> {
        self.partitions.get(context)
    }

    /// Get mutable partition state, creating if needed
    pub fn get_partition_mut(&mut self, context: &JsonObject) -> &mut PartitionState {
        self.partitions.get_or_insert(context)
    }
}

/// Partition bookmarks keyed by context.
///
/// Serialized as the Singer `partitions` list, in first-seen order. A
/// context listed twice in loaded state keeps its last entry.
#[derive(Debug, Clone, Default)]
pub struct Partitions {
    entries: Vec<PartitionState>,
    /// Canonical context string to position in `entries`
    index: HashMap<String, usize>,
}

impl Partitions {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartitionState> {
        self.entries.iter()
    }

    pub fn get(&self, context: &JsonObject) -> Option<&PartitionState> {
        let idx = *self.index.get(&context_key(context))?;
        self.entries.get(idx)
    }

    pub fn get_or_insert(&mut self, context: &JsonObject) -> &mut PartitionState {
        let idx = match self.index.entry(context_key(context)) {
            Entry::Occupied(slot) => *slot.get(),
            Entry::Vacant(slot) => {
                self.entries.push(PartitionState::new(context.clone()));
                *slot.insert(self.entries.len() - 1)
            }
        };
        &mut self.entries[idx]
    }

    fn insert(&mut self, partition: PartitionState) {
        match self.index.entry(context_key(&partition.context)) {
            Entry::Occupied(slot) => self.entries[*slot.get()] = partition,
            Entry::Vacant(slot) => {
                slot.insert(self.entries.len());
                self.entries.push(partition);
            }
        }
    }
}

impl FromIterator<PartitionState> for Partitions {
    fn from_iter<I: IntoIterator<Item = PartitionState>>(iter: I) -> Self {
        let mut partitions = Self::default();
        for partition in iter {
            partitions.insert(partition);
        }
        partitions
    }
}

impl PartialEq for Partitions {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Serialize for Partitions {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Partitions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Vec::<PartitionState>::deserialize(deserializer)?
            .into_iter()
            .collect())
    }
}

/// Context rendered with sorted keys, so key order in loaded state does not matter
fn context_key(context: &JsonObject) -> String {
    let sorted: BTreeMap<&String, &JsonValue> = context.iter().collect();
    serde_json::to_string(&sorted).unwrap_or_default()
}

/// Bookmark for a single partition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionState {
    /// Context identifying this partition
    pub context: JsonObject,

    /// Name of the replication key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    /// Highest replication key value seen within this partition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key_value: Option<JsonValue>,
}

impl PartitionState {
    /// Create a new empty partition state
    pub fn new(context: JsonObject) -> Self {
        Self {
            context,
            ..Default::default()
        }
    }
}

/// Order two replication key values.
///
/// Numbers compare numerically, RFC3339 strings compare as instants, and
/// anything else falls back to string order.
pub fn compare_replication_values(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => {
                    let x = x.as_f64().unwrap_or(f64::NAN);
                    let y = y.as_f64().unwrap_or(f64::NAN);
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
            }
        }
        (JsonValue::String(x), JsonValue::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        _ => a.to_string().cmp(&b.to_string()),
    }
}
