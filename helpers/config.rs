//! Harness configuration
//!
//! Loaded from a TOML file; every section has defaults so an empty file (or no
//! file) yields a working local development setup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::block::WaitOptions;
use crate::errors::{HarnessError, Result};

/// Name of the network that gets faucet funding before tests
pub const LOCALFHENIX: &str = "localfhenix";
pub const HARDHAT: &str = "hardhat";

/// Full harness configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub network: NetworkSettings,

    #[serde(default)]
    pub confirmation: ConfirmationSettings,

    #[serde(default)]
    pub deployments: DeploymentSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl HarnessConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HarnessError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise the defaults for `network`
    pub fn load_or_default(path: Option<&Path>, network: &str) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::for_network(network)?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Defaults for a named network
    pub fn for_network(network: &str) -> Result<Self> {
        match network {
            HARDHAT => Ok(Self::hardhat()),
            LOCALFHENIX => Ok(Self::localfhenix()),
            other => Err(HarnessError::Config(format!("unknown network {other}"))),
        }
    }

    /// In-process network with funded accounts and fast blocks
    pub fn hardhat() -> Self {
        Self::default()
    }

    /// Local FHE-enabled node: accounts start empty and draw from the faucet
    pub fn localfhenix() -> Self {
        Self {
            network: NetworkSettings {
                name: LOCALFHENIX.to_string(),
                block_time_ms: 1_000,
                funded: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.name.is_empty() {
            return Err(HarnessError::Config("network.name must not be empty".to_string()));
        }
        if self.network.block_time_ms == 0 {
            return Err(HarnessError::Config("network.block_time_ms must be positive".to_string()));
        }
        if self.network.accounts == 0 {
            return Err(HarnessError::Config("network.accounts must be positive".to_string()));
        }
        if self.confirmation.poll_interval_ms == 0 {
            return Err(HarnessError::Config(
                "confirmation.poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Barrier options derived from the `[confirmation]` section
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            poll_interval: Duration::from_millis(self.confirmation.poll_interval_ms),
            timeout: self
                .confirmation
                .timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            cancel: None,
        }
    }

    /// Where the chain snapshot for this network lives, if persistence is on
    pub fn chain_snapshot_path(&self) -> Option<PathBuf> {
        self.network
            .data_dir
            .as_ref()
            .map(|dir| dir.join(&self.network.name).join("chain.json"))
    }

    /// Where deployment records for this network live, if persistence is on
    pub fn deployments_path(&self) -> Option<PathBuf> {
        self.deployments
            .dir
            .as_ref()
            .map(|dir| dir.join(&self.network.name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub name: String,
    /// Interval between produced blocks
    pub block_time_ms: u64,
    /// Number of signing accounts
    pub accounts: usize,
    /// Whether accounts start with a balance
    pub funded: bool,
    /// Persist chain state here so separate task runs share it
    pub data_dir: Option<PathBuf>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            name: HARDHAT.to_string(),
            block_time_ms: 100,
            accounts: 10,
            funded: true,
            data_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationSettings {
    pub poll_interval_ms: u64,
    /// `None` or `0` waits indefinitely
    pub timeout_ms: Option<u64>,
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            timeout_ms: Some(60_000),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSettings {
    /// Record deployments under `<dir>/<network>/`; in memory when omitted
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
