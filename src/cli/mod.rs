//! CLI module
//!
//! Command-line interface for running the tap.
//!
//! # Modes
//!
//! - `--about` - Print tap metadata and the config schema
//! - `--discover` - Print the catalog
//! - `--test` - Check the connection
//! - default - Sync the selected streams

mod commands;
mod runner;

pub use commands::{Cli, Mode};
pub use runner::Runner;
