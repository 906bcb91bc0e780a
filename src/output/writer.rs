//! JSON lines writer
//!
//! Serializes Singer messages to any `Write` target. The binary hands it a
//! locked stdout; tests hand it a `Vec<u8>`.

use super::message::Message;
use crate::error::{Error, Result};
use std::io::Write;

/// Counts of messages written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// SCHEMA messages written
    pub schemas: usize,
    /// RECORD messages written
    pub records: usize,
    /// STATE messages written
    pub states: usize,
}

/// Writes Singer messages as JSON lines
#[derive(Debug)]
pub struct MessageWriter<W: Write> {
    out: W,
    stats: WriterStats,
}

impl<W: Write> MessageWriter<W> {
    /// Create a new writer
    pub fn new(out: W) -> Self {
        Self {
            out,
            stats: WriterStats::default(),
        }
    }

    /// Write one message followed by a newline
    pub fn write(&mut self, message: &Message) -> Result<()> {
        serde_json::to_writer(&mut self.out, message)
            .map_err(|e| Error::output(format!("Failed to serialize message: {e}")))?;
        self.out.write_all(b"\n")?;

        match message {
            Message::Schema { .. } => self.stats.schemas += 1,
            Message::Record { .. } => self.stats.records += 1,
            Message::State { .. } => {
                self.stats.states += 1;
                // State must reach the target unbuffered
                self.out.flush()?;
            }
        }

        Ok(())
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().map_err(Error::from)
    }

    /// Message counts so far
    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    /// Consume the writer, returning the inner target
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Parse JSON lines back into messages
pub fn parse_messages(output: &[u8]) -> Result<Vec<Message>> {
    output
        .split(|b| *b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(|line| serde_json::from_slice(line).map_err(Error::from))
        .collect()
}
