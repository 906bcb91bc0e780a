//! CLI runner - executes the selected mode

use crate::catalog::Catalog;
use crate::cli::commands::{Cli, Mode};
use crate::config::TapConfig;
use crate::engine::{SyncConfig, SyncEngine};
use crate::error::{Error, Result};
use crate::state::StateManager;
use crate::tap::TapHubspot;
use std::io::{BufWriter, Write};
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command, writing messages to stdout
    pub async fn run(&self) -> Result<()> {
        self.run_with_output(BufWriter::new(std::io::stdout())).await
    }

    /// Run the CLI command, writing messages to `out`
    pub async fn run_with_output<W: Write>(&self, mut out: W) -> Result<()> {
        let tap = TapHubspot::new(self.load_config()?);

        match self.cli.mode() {
            Mode::About => {
                writeln!(out, "{}", serde_json::to_string_pretty(&tap.about())?)?;
                out.flush()?;
                Ok(())
            }
            Mode::Discover => {
                writeln!(out, "{}", tap.catalog().to_json_pretty()?)?;
                out.flush()?;
                Ok(())
            }
            Mode::Test => self.test_connection(&tap, out).await,
            Mode::Sync => self.sync(&tap, out).await,
        }
    }

    /// Load configuration. Inline JSON wins over a file; neither means defaults.
    fn load_config(&self) -> Result<TapConfig> {
        if let Some(json) = &self.cli.config_json {
            return TapConfig::from_json(json);
        }
        match &self.cli.config {
            Some(path) => TapConfig::from_file(path),
            None => Ok(TapConfig::default()),
        }
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Load the catalog, if one was given
    fn load_catalog(&self) -> Result<Option<Catalog>> {
        self.cli
            .catalog
            .as_ref()
            .map(|path| Catalog::from_file(path))
            .transpose()
    }

    /// Check connection
    async fn test_connection<W: Write>(&self, tap: &TapHubspot, mut out: W) -> Result<()> {
        let client = tap.connect(tap.http_config())?;
        let result = tap.check_connection(&client).await;

        writeln!(out, "{}", serde_json::to_string(&result)?)?;
        out.flush()?;

        if result.success {
            info!("Connection test succeeded");
            Ok(())
        } else {
            Err(Error::Other(format!(
                "Connection test failed: {}",
                result.message.unwrap_or_default()
            )))
        }
    }

    /// Extract records for every selected stream
    async fn sync<W: Write>(&self, tap: &TapHubspot, out: W) -> Result<()> {
        let state = self.load_state()?;
        let catalog = self.load_catalog()?;
        let client = tap.connect(tap.http_config())?;

        let start_date = tap.effective_start_date()?;
        info!(start_date = ?start_date, "Starting sync");

        let config = SyncConfig::new()
            .with_max_records(self.cli.max_records.unwrap_or(0))
            .with_start_date(start_date);

        let streams = tap.discover_streams();
        let mut engine = SyncEngine::new(client, state, out).with_config(config);
        engine.run(&streams, catalog.as_ref()).await?;
        Ok(())
    }
}
