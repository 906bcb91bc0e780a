//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - Runs the selected streams and writes Singer messages
//! - `SyncConfig` - Record cap, STATE interval and start date
//! - `SyncStats` - Counters for a run
//!
//! Streams run one after another in discovery order. A stream with a parent
//! reads one context per parent record collected earlier in the run. The
//! parent is read even when only the child is selected; its records are
//! then neither emitted nor bookmarked.

mod types;

pub use types::{SyncConfig, SyncStats};

use crate::catalog::{Catalog, CatalogEntry};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::output::{Message, MessageWriter};
use crate::pagination::{NextPage, PaginationState};
use crate::state::{compare_replication_values, StateManager};
use crate::streams::{HubspotStream, ReadContext};
use crate::types::{JsonObject, JsonValue};
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How one stream is read in a run
#[derive(Debug, Clone, Copy)]
struct StreamPlan<'a> {
    /// Catalog entry, when a catalog was given
    entry: Option<&'a CatalogEntry>,
    /// Emit SCHEMA/RECORD/STATE and advance bookmarks
    emit: bool,
    /// Collect child contexts for a dependent stream
    collect_children: bool,
}

/// Outcome of reading one context
#[derive(Debug, Default)]
struct ContextOutcome {
    emitted: usize,
    limit_reached: bool,
}

/// Sync engine for orchestrating data extraction
pub struct SyncEngine<W: Write> {
    /// HTTP client
    client: HttpClient,
    /// State manager
    state: StateManager,
    /// Sync configuration
    config: SyncConfig,
    /// Statistics
    stats: SyncStats,
    /// Message output
    writer: MessageWriter<W>,
}

impl<W: Write> SyncEngine<W> {
    /// Create a new sync engine
    pub fn new(client: HttpClient, state: StateManager, out: W) -> Self {
        Self {
            client,
            state,
            config: SyncConfig::default(),
            stats: SyncStats::default(),
            writer: MessageWriter::new(out),
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Consume the engine, returning the output target
    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }

    /// Sync every selected stream.
    ///
    /// Without a catalog every stream is selected.
    pub async fn run(
        &mut self,
        streams: &[Box<dyn HubspotStream>],
        catalog: Option<&Catalog>,
    ) -> Result<SyncStats> {
        let start = Instant::now();

        let is_selected = |name: &str| {
            catalog.map_or(true, |c| c.get(name).is_some_and(CatalogEntry::is_selected))
        };

        let needed_parents: HashSet<&str> = streams
            .iter()
            .filter(|s| is_selected(s.name()))
            .filter_map(|s| s.parent_stream())
            .collect();

        let mut child_contexts: HashMap<&str, Vec<JsonObject>> = HashMap::new();

        for stream in streams {
            let name = stream.name();
            let plan = StreamPlan {
                entry: catalog.and_then(|c| c.get(name)),
                emit: is_selected(name),
                collect_children: needed_parents.contains(name),
            };

            if !plan.emit && !plan.collect_children {
                debug!(stream = name, "Skipping unselected stream");
                continue;
            }

            let parent_contexts = stream
                .parent_stream()
                .and_then(|parent| child_contexts.get(parent))
                .map_or(&[][..], Vec::as_slice);

            let children = self
                .sync_stream(stream.as_ref(), plan, parent_contexts)
                .await?;

            if plan.collect_children {
                child_contexts.insert(name, children);
            }
        }

        self.writer.flush()?;
        self.stats
            .set_duration(u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX));

        info!(
            records = self.stats.records_synced,
            pages = self.stats.pages_fetched,
            streams = self.stats.streams_synced,
            duration_ms = self.stats.duration_ms,
            "Sync completed"
        );

        Ok(self.stats.clone())
    }

    /// Sync one stream, returning the child contexts it produced
    async fn sync_stream(
        &mut self,
        stream: &dyn HubspotStream,
        plan: StreamPlan<'_>,
        parent_contexts: &[JsonObject],
    ) -> Result<Vec<JsonObject>> {
        let name = stream.name();
        info!(stream = name, emit = plan.emit, "Starting sync for stream");

        if plan.emit {
            self.writer.write(&Message::schema(
                name,
                &stream.schema(),
                stream.key_properties(),
                stream.replication_key(),
            ))?;
        }

        let partitions = stream.partitions(parent_contexts);
        if partitions.is_empty() {
            info!(stream = name, "No contexts to read");
        } else {
            stream.prepare(&self.client).await?;
        }

        let mut children = Vec::new();
        let mut emitted = 0;

        for partition in &partitions {
            let outcome = self
                .sync_context(stream, plan, partition.as_ref(), emitted, &mut children)
                .await?;
            emitted += outcome.emitted;
            self.stats.add_partition();

            if outcome.limit_reached {
                info!(stream = name, max_records = self.config.max_records, "Record limit reached");
                break;
            }
        }

        if plan.emit {
            self.emit_state().await?;
            self.stats.add_stream();
        }

        info!(stream = name, records = emitted, "Completed sync for stream");
        Ok(children)
    }

    /// Read every page of one context
    async fn sync_context(
        &mut self,
        stream: &dyn HubspotStream,
        plan: StreamPlan<'_>,
        partition: Option<&JsonObject>,
        already_emitted: usize,
        children: &mut Vec<JsonObject>,
    ) -> Result<ContextOutcome> {
        let name = stream.name();
        let replication_key = stream.replication_key();

        let mut starting_value = match self.state.get_bookmark(name, partition).await {
            Some(bookmark) => Some(bookmark),
            None => self.config.start_date.clone().map(JsonValue::String),
        };
        let sorted = stream.is_sorted(&ReadContext {
            starting_value: starting_value.as_ref(),
            partition,
        });
        debug!(stream = name, ?partition, ?starting_value, sorted, "Reading context");

        let mut outcome = ContextOutcome::default();
        let mut max_value: Option<JsonValue> = None;
        // Replication value of the last record read in sorted order
        let mut last_value: Option<JsonValue> = None;
        let mut since_state = 0;
        let mut pagination = PaginationState::new();

        'pages: loop {
            let ctx = ReadContext {
                starting_value: starting_value.as_ref(),
                partition,
            };
            let request = stream.build_request(&ctx, &pagination)?;
            let body = request.send(&self.client).await?;
            self.stats.add_page();

            let records = stream.extract_records(&body)?;
            let count = records.len();
            debug!(stream = name, page = pagination.page, count, "Fetched page");

            for record in records {
                let Some(mut record) = stream.post_process(record, partition) else {
                    self.stats.add_dropped();
                    continue;
                };

                if plan.collect_children {
                    children.extend(stream.child_context(&record));
                }

                let replication = replication_key
                    .and_then(|key| record.get(key).map(|value| (key, value)))
                    .filter(|(_, value)| !value.is_null());

                if sorted {
                    if let Some((_, value)) = replication {
                        last_value = Some(value.clone());
                    }
                }

                if !plan.emit {
                    continue;
                }

                if let Some((key, value)) = replication {
                    if sorted {
                        self.state.advance_bookmark(name, partition, key, value).await;
                    } else if is_newer(value, max_value.as_ref()) {
                        max_value = Some(value.clone());
                    }
                }

                if let Some(entry) = plan.entry {
                    entry.filter_record(&mut record);
                }
                self.writer.write(&Message::record(name, record, Utc::now()))?;
                self.stats.add_records(1);
                outcome.emitted += 1;
                since_state += 1;

                if sorted && self.config.state_every > 0 && since_state >= self.config.state_every
                {
                    self.emit_state().await?;
                    since_state = 0;
                }

                if self.config.max_records > 0
                    && already_emitted + outcome.emitted >= self.config.max_records
                {
                    outcome.limit_reached = true;
                    break 'pages;
                }
            }

            match stream.paginator().process_response(&body, count, &mut pagination) {
                NextPage::Continue { .. } if sorted && stream.query_exhausted(&pagination) => {
                    let Some(restart) = last_value.take() else {
                        break;
                    };
                    if starting_value.as_ref() == Some(&restart) {
                        return Err(Error::Other(format!(
                            "{name}: more records share {restart} than one query can page through"
                        )));
                    }
                    info!(stream = name, from = %restart, "Query result cap reached, restarting from last value");
                    starting_value = Some(restart);
                    pagination = PaginationState::new();
                }
                NextPage::Continue { .. } => {}
                NextPage::Done => break,
            }
        }

        if let (Some(key), Some(value)) = (replication_key, max_value) {
            if outcome.limit_reached {
                warn!(stream = name, "Stopped before the end of an unsorted stream, bookmark kept");
            } else {
                self.state.advance_bookmark(name, partition, key, &value).await;
            }
        }

        Ok(outcome)
    }

    async fn emit_state(&mut self) -> Result<()> {
        let value = self.state.to_value().await?;
        self.writer.write(&Message::state(value))
    }
}

/// Whether `value` is a usable bookmark beyond `current`
fn is_newer(value: &JsonValue, current: Option<&JsonValue>) -> bool {
    if value.is_null() {
        return false;
    }
    current.map_or(true, |current| {
        compare_replication_values(value, current) == Ordering::Greater
    })
}

#[cfg(test)]
mod tests;
