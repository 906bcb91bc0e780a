//! Schema types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// JSON Schema primitive type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

/// One property of a record or config schema.
///
/// HubSpot leaves almost any field empty on some record, so every builder
/// produces a `[type, "null"]` union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaProperty {
    #[serde(rename = "type")]
    pub types: Vec<JsonType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Format hint such as `date-time`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Credential values are masked by UIs
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub secret: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, SchemaProperty>>,

    #[serde(
        rename = "additionalProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaProperty>>,
}

impl SchemaProperty {
    /// Nullable property of the given type
    pub fn nullable(json_type: JsonType) -> Self {
        let types = if json_type == JsonType::Null {
            vec![JsonType::Null]
        } else {
            vec![json_type, JsonType::Null]
        };

        Self {
            types,
            description: None,
            format: None,
            default: None,
            secret: false,
            properties: None,
            additional_properties: None,
            items: None,
        }
    }

    pub fn string() -> Self {
        Self::nullable(JsonType::String)
    }

    pub fn integer() -> Self {
        Self::nullable(JsonType::Integer)
    }

    pub fn number() -> Self {
        Self::nullable(JsonType::Number)
    }

    pub fn boolean() -> Self {
        Self::nullable(JsonType::Boolean)
    }

    /// ISO-8601 timestamp
    pub fn datetime() -> Self {
        Self::string().with_format("date-time")
    }

    /// Object with known fields; unknown fields are still accepted
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaProperty)>,
        K: Into<String>,
    {
        let properties = properties
            .into_iter()
            .map(|(name, prop)| (name.into(), prop))
            .collect();

        Self {
            properties: Some(properties),
            ..Self::free_object()
        }
    }

    /// Object whose keys are only known at sync time, like CRM `properties`
    pub fn free_object() -> Self {
        Self {
            additional_properties: Some(true),
            ..Self::nullable(JsonType::Object)
        }
    }

    pub fn array(items: SchemaProperty) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::nullable(JsonType::Array)
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn is_nullable(&self) -> bool {
        self.types.contains(&JsonType::Null)
    }

    /// The type other than `null`, if there is one
    pub fn value_type(&self) -> Option<JsonType> {
        self.types.iter().copied().find(|t| *t != JsonType::Null)
    }
}

/// Top-level object schema of a stream or of the config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema {
    #[serde(rename = "type")]
    pub json_type: JsonType,

    #[serde(default)]
    pub properties: BTreeMap<String, SchemaProperty>,

    #[serde(rename = "additionalProperties", default = "default_true")]
    pub additional_properties: bool,
}

fn default_true() -> bool {
    true
}

impl Default for JsonSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonSchema {
    pub fn new() -> Self {
        Self {
            json_type: JsonType::Object,
            properties: BTreeMap::new(),
            additional_properties: true,
        }
    }

    /// Add a property, builder style
    #[must_use]
    pub fn property(mut self, name: &str, property: SchemaProperty) -> Self {
        self.properties.insert(name.to_string(), property);
        self
    }

    /// Top-level property names in sorted order
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn get_property(&self, name: &str) -> Option<&SchemaProperty> {
        self.properties.get(name)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
