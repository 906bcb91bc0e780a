//! State management module
//!
//! Handles bookmark tracking for incremental syncs.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - Singer bookmarks with per-partition tracking
//! - `StateManager` - Shared, async-safe access for the engine and streams
//! - `compare_replication_values` - Ordering used to advance bookmarks

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{compare_replication_values, PartitionState, Partitions, State, StreamState};

#[cfg(test)]
mod manager_tests;
