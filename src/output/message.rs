//! Singer message types
//!
//! One JSON object per line on stdout, discriminated by `type`.

use crate::schema::JsonSchema;
use crate::types::{JsonObject, JsonValue};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A Singer message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Describes the records of a stream
    Schema {
        /// Stream name
        stream: String,
        /// JSON schema of the records
        schema: JsonValue,
        /// Primary key properties
        key_properties: Vec<String>,
        /// Replication key, if incremental
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        bookmark_properties: Vec<String>,
    },
    /// One record
    Record {
        /// Stream name
        stream: String,
        /// Record data
        record: JsonObject,
        /// When the record was extracted
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_extracted: Option<String>,
    },
    /// State checkpoint
    State {
        /// Full tap state
        value: JsonValue,
    },
}

impl Message {
    /// Create a schema message
    pub fn schema(
        stream: impl Into<String>,
        schema: &JsonSchema,
        key_properties: &[&str],
        replication_key: Option<&str>,
    ) -> Self {
        Self::Schema {
            stream: stream.into(),
            schema: schema.to_json(),
            key_properties: key_properties.iter().map(ToString::to_string).collect(),
            bookmark_properties: replication_key
                .into_iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Create a record message stamped with the extraction time
    pub fn record(
        stream: impl Into<String>,
        record: JsonObject,
        extracted: DateTime<Utc>,
    ) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
            time_extracted: Some(extracted.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }

    /// Create a state message
    pub fn state(value: JsonValue) -> Self {
        Self::State { value }
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Stream the message belongs to, if any
    pub fn stream(&self) -> Option<&str> {
        match self {
            Self::Schema { stream, .. } | Self::Record { stream, .. } => Some(stream),
            Self::State { .. } => None,
        }
    }
}
