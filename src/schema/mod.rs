//! JSON schema declarations
//!
//! Builders for the JSON schemas the tap publishes: the configuration
//! schema shown by `--about` and the per-stream record schemas emitted in
//! `SCHEMA` messages and the discovery catalog.

mod types;

pub use types::{JsonSchema, JsonType, SchemaProperty};
