//! Shared command-line plumbing for the counter tasks

use std::path::PathBuf;

use clap::Args;
use helpers::{config::HarnessConfig, logging, setup_script, ScriptSetup};

/// Options every task accepts
#[derive(Debug, Args)]
pub struct NetworkArgs {
    /// Path to a harness TOML file
    #[arg(short, long, env = "COUNTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Network defaults to use when no config file is given
    #[arg(long, env = "COUNTER_NETWORK", default_value = helpers::config::HARDHAT)]
    pub network: String,

    /// Directory for chain state and deployment records
    #[arg(short, long, env = "COUNTER_DATA_DIR", default_value = ".devnet")]
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl NetworkArgs {
    /// Resolve the configuration. A config file wins over `--network`; the
    /// data directory is filled in when the file does not set one.
    pub fn load_config(&self) -> anyhow::Result<HarnessConfig> {
        let mut config = HarnessConfig::load_or_default(self.config.as_deref(), &self.network)?;
        if config.network.data_dir.is_none() {
            config.network.data_dir = Some(self.data_dir.join("chain"));
        }
        if config.deployments.dir.is_none() {
            config.deployments.dir = Some(self.data_dir.join("deployments"));
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        config.logging.json |= self.json_logs;
        Ok(config)
    }

    /// Load config, initialize logging and connect to the network
    pub async fn setup(&self) -> anyhow::Result<ScriptSetup> {
        let config = self.load_config()?;
        logging::init(&config.logging.level, config.logging.json)?;
        Ok(setup_script(&config).await?)
    }
}
