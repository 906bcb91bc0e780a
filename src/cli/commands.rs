//! CLI arguments
//!
//! Follows Singer tap conventions: the mode is picked by flags, not
//! subcommands.

use clap::Parser;
use std::path::PathBuf;

/// Singer tap for HubSpot
#[derive(Parser, Debug)]
#[command(name = "tap-hubspot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Inline config JSON
    #[arg(long, conflicts_with = "config")]
    pub config_json: Option<String>,

    /// State file (JSON)
    #[arg(short, long)]
    pub state: Option<PathBuf>,

    /// Inline state JSON
    #[arg(long, conflicts_with = "state")]
    pub state_json: Option<String>,

    /// Catalog file selecting streams (JSON)
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Print the discovery catalog
    #[arg(long, conflicts_with_all = ["about", "test"])]
    pub discover: bool,

    /// Print tap metadata and the config schema
    #[arg(long, conflicts_with = "test")]
    pub about: bool,

    /// Check the connection and exit
    #[arg(long)]
    pub test: bool,

    /// Maximum records per stream
    #[arg(long)]
    pub max_records: Option<usize>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// What the invocation asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Print metadata
    About,
    /// Print the catalog
    Discover,
    /// Connection test
    Test,
    /// Extract records
    Sync,
}

impl Cli {
    /// Mode selected by the flags
    pub fn mode(&self) -> Mode {
        if self.about {
            Mode::About
        } else if self.discover {
            Mode::Discover
        } else if self.test {
            Mode::Test
        } else {
            Mode::Sync
        }
    }
}
