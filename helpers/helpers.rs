//! Common helper functions for the counter scripts and tests

use std::sync::Arc;

pub mod block;
pub mod codec;
pub mod config;
pub mod devnet;
pub mod errors;
pub mod logging;
pub mod provider;
pub mod registry;
pub mod sealing;
pub mod types;
pub mod workflow;

pub use block::{wait_for_block, Confirmation, WaitOptions};
pub use codec::Session;
pub use config::HarnessConfig;
pub use devnet::DevNetwork;
pub use errors::{HarnessError, Result};
pub use registry::{DeployOptions, Deployment, DeploymentRegistry, Deployments};
pub use types::{AccountIndex, Address, BlockHeight, Ciphertext, Plaintext};
pub use workflow::Environment;

use crate::provider::{ChainOracle, ContractFactory};

/// Script setup: the workflows plus a handle on the network behind them
pub struct ScriptSetup {
    pub env: Environment,
    pub devnet: Arc<DevNetwork>,
}

impl ScriptSetup {
    /// Stop the network and flush its state to disk
    pub async fn finish(self) -> Result<()> {
        self.devnet.shutdown().await
    }
}

/// Start (or resume) the development network described by `config` and wire
/// a deployment registry to it
pub async fn setup_script(config: &HarnessConfig) -> Result<ScriptSetup> {
    let devnet = DevNetwork::start(&config.network, config.chain_snapshot_path()).await?;

    let factory: Arc<dyn ContractFactory> = devnet.clone();
    let chain: Arc<dyn ChainOracle> = devnet.clone();
    let deployments: Arc<dyn DeploymentRegistry> = match config.deployments_path() {
        Some(dir) => Arc::new(Deployments::in_directory(factory, chain, dir)),
        None => Arc::new(Deployments::in_memory(factory, chain)),
    };

    let env = Environment::from_devnet(devnet.clone(), deployments, config);
    Ok(ScriptSetup { env, devnet })
}
