//! Singer catalog types
//!
//! Discovery emits a catalog; `--catalog` reads one back to decide which
//! streams and top-level properties to sync. Selection follows both Singer
//! conventions: a stream-level `selected` flag and root breadcrumb metadata.

use crate::error::{Error, Result};
use crate::schema::JsonSchema;
use crate::types::{JsonObject, JsonValue, ReplicationMethod};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A Singer catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Catalog entries, one per stream
    pub streams: Vec<CatalogEntry>,
}

/// One stream in a catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stream identifier
    pub tap_stream_id: String,
    /// Stream name
    pub stream: String,
    /// JSON schema of the records
    pub schema: JsonValue,
    /// Primary key properties
    #[serde(default)]
    pub key_properties: Vec<String>,
    /// Replication key, if incremental
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,
    /// Replication method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_method: Option<ReplicationMethod>,
    /// Legacy stream-level selection flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
    /// Breadcrumb metadata
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

/// A breadcrumb metadata entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Path into the schema; empty for the stream itself
    pub breadcrumb: Vec<String>,
    /// Metadata values
    pub metadata: JsonObject,
}

impl MetadataEntry {
    fn flag(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(JsonValue::as_bool)
    }

    fn inclusion(&self) -> Option<&str> {
        self.metadata.get("inclusion").and_then(JsonValue::as_str)
    }
}

impl CatalogEntry {
    /// Build the discovery entry for a stream
    pub fn discovered(
        name: &str,
        schema: &JsonSchema,
        key_properties: &[&str],
        replication_key: Option<&str>,
    ) -> Self {
        let replication_method = if replication_key.is_some() {
            ReplicationMethod::Incremental
        } else {
            ReplicationMethod::FullTable
        };

        let mut root = JsonObject::new();
        root.insert("inclusion".to_string(), "available".into());
        root.insert("selected-by-default".to_string(), true.into());
        root.insert(
            "table-key-properties".to_string(),
            key_properties.iter().map(|k| JsonValue::from(*k)).collect(),
        );
        root.insert(
            "forced-replication-method".to_string(),
            serde_json::to_value(replication_method).unwrap_or_default(),
        );
        if let Some(key) = replication_key {
            root.insert(
                "valid-replication-keys".to_string(),
                JsonValue::Array(vec![key.into()]),
            );
        }

        let mut metadata = vec![MetadataEntry {
            breadcrumb: Vec::new(),
            metadata: root,
        }];

        for property in schema.property_names() {
            let automatic =
                key_properties.contains(&property) || replication_key == Some(property);
            let mut meta = JsonObject::new();
            meta.insert(
                "inclusion".to_string(),
                if automatic { "automatic" } else { "available" }.into(),
            );
            metadata.push(MetadataEntry {
                breadcrumb: vec!["properties".to_string(), property.to_string()],
                metadata: meta,
            });
        }

        Self {
            tap_stream_id: name.to_string(),
            stream: name.to_string(),
            schema: schema.to_json(),
            key_properties: key_properties.iter().map(ToString::to_string).collect(),
            replication_key: replication_key.map(ToString::to_string),
            replication_method: Some(replication_method),
            selected: None,
            metadata,
        }
    }

    fn root_metadata(&self) -> Option<&MetadataEntry> {
        self.metadata.iter().find(|m| m.breadcrumb.is_empty())
    }

    fn property_metadata(&self, property: &str) -> Option<&MetadataEntry> {
        self.metadata.iter().find(|m| {
            m.breadcrumb.len() == 2 && m.breadcrumb[0] == "properties" && m.breadcrumb[1] == property
        })
    }

    /// Whether the stream is selected for sync
    pub fn is_selected(&self) -> bool {
        if let Some(root) = self.root_metadata() {
            if let Some(selected) = root.flag("selected") {
                return selected;
            }
        }
        if let Some(selected) = self.selected {
            return selected;
        }
        self.root_metadata()
            .and_then(|root| root.flag("selected-by-default"))
            .unwrap_or(false)
    }

    /// Whether a top-level property should be kept in records
    pub fn is_property_selected(&self, property: &str) -> bool {
        let Some(entry) = self.property_metadata(property) else {
            return true;
        };
        match entry.inclusion() {
            Some("automatic") => true,
            Some("unsupported") => false,
            _ => entry
                .flag("selected")
                .or_else(|| entry.flag("selected-by-default"))
                .unwrap_or(true),
        }
    }

    /// Drop deselected top-level properties from a record
    pub fn filter_record(&self, record: &mut JsonObject) {
        if !self
            .metadata
            .iter()
            .any(|m| m.breadcrumb.len() == 2 && m.flag("selected") == Some(false))
        {
            return;
        }
        record.retain(|key, _| self.is_property_selected(key));
    }
}

impl Catalog {
    /// Load a catalog from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::catalog(format!("Failed to read catalog {}: {e}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    /// Parse a catalog from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::catalog(format!("Invalid catalog: {e}")))
    }

    /// Find an entry by stream id
    pub fn get(&self, tap_stream_id: &str) -> Option<&CatalogEntry> {
        self.streams.iter().find(|s| s.tap_stream_id == tap_stream_id)
    }

    /// Selected entries keyed by stream id
    pub fn selected(&self) -> HashMap<&str, &CatalogEntry> {
        self.streams
            .iter()
            .filter(|s| s.is_selected())
            .map(|s| (s.tap_stream_id.as_str(), s))
            .collect()
    }

    /// Pretty JSON for `--discover`
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }
}
