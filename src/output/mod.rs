//! Output module
//!
//! Singer messages and the JSON lines writer that puts them on stdout.
//!
//! # Overview
//!
//! - `Message` - SCHEMA, RECORD and STATE messages
//! - `MessageWriter` - newline-delimited JSON output with per-type counts
//! - `parse_messages` - reads output back, used by tests and `--test`

mod message;
mod writer;

pub use message::Message;
pub use writer::{parse_messages, MessageWriter, WriterStats};
