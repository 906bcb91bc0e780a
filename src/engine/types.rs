//! Engine types
//!
//! Configuration and statistics for the sync engine.

/// Configuration for sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum records per stream (0 = unlimited)
    pub max_records: usize,
    /// Emit STATE every N records on sorted streams (0 = only at stream end)
    pub state_every: usize,
    /// Starting value for streams without a bookmark
    pub start_date: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_records: 0,
            state_every: 1000,
            start_date: None,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max records
    #[must_use]
    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = max;
        self
    }

    /// Set the STATE interval for sorted streams
    #[must_use]
    pub fn with_state_every(mut self, every: usize) -> Self {
        self.state_every = every;
        self
    }

    /// Set the effective start date
    #[must_use]
    pub fn with_start_date(mut self, start_date: Option<String>) -> Self {
        self.start_date = start_date;
        self
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Records emitted
    pub records_synced: usize,
    /// Records dropped by post-processing
    pub records_dropped: usize,
    /// Pages fetched
    pub pages_fetched: usize,
    /// Streams synced
    pub streams_synced: usize,
    /// Contexts read, one per unpartitioned stream or partition
    pub partitions_synced: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records
    pub fn add_records(&mut self, count: usize) {
        self.records_synced += count;
    }

    /// Add a dropped record
    pub fn add_dropped(&mut self) {
        self.records_dropped += 1;
    }

    /// Add a page
    pub fn add_page(&mut self) {
        self.pages_fetched += 1;
    }

    /// Add a stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Add a partition
    pub fn add_partition(&mut self) {
        self.partitions_synced += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}
