//! Deployment registry
//!
//! Records deployed contracts by logical name so later task runs can look them
//! up. Records are JSON files at `<dir>/<Name>.json` or, without a directory,
//! kept in memory for the lifetime of the process.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{HarnessError, Result};
use crate::provider::{ChainOracle, ContractFactory};
use crate::types::{Account, Address, BlockHeight};

/// A recorded deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub name: String,
    pub address: Address,
    pub deployer: Address,
    /// Chain height observed right before the deployment was sent
    pub block: BlockHeight,
}

#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub from: Account,
    /// Reuse an existing record instead of deploying again
    pub skip_if_already_deployed: bool,
}

impl DeployOptions {
    pub fn new(from: Account) -> Self {
        Self {
            from,
            skip_if_already_deployed: false,
        }
    }
}

#[async_trait]
pub trait DeploymentRegistry: Send + Sync {
    async fn deploy(&self, name: &str, options: DeployOptions) -> Result<Deployment>;

    /// Look up a previous deployment; fails with `NotDeployed`
    async fn get(&self, name: &str) -> Result<Deployment>;
}

enum Store {
    Memory(Mutex<BTreeMap<String, Deployment>>),
    Directory(PathBuf),
}

impl Store {
    async fn load(&self, name: &str) -> Result<Option<Deployment>> {
        match self {
            Store::Memory(records) => Ok(records.lock().get(name).cloned()),
            Store::Directory(dir) => {
                let path = dir.join(format!("{name}.json"));
                match tokio::fs::read(&path).await {
                    Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    async fn save(&self, deployment: &Deployment) -> Result<()> {
        match self {
            Store::Memory(records) => {
                records
                    .lock()
                    .insert(deployment.name.clone(), deployment.clone());
                Ok(())
            }
            Store::Directory(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                let path = dir.join(format!("{}.json", deployment.name));
                let json = serde_json::to_vec_pretty(deployment)?;
                tokio::fs::write(path, json).await?;
                Ok(())
            }
        }
    }
}

/// Registry that deploys through a [`ContractFactory`] and records the result
pub struct Deployments {
    factory: Arc<dyn ContractFactory>,
    chain: Arc<dyn ChainOracle>,
    store: Store,
}

impl Deployments {
    pub fn in_memory(factory: Arc<dyn ContractFactory>, chain: Arc<dyn ChainOracle>) -> Self {
        Self {
            factory,
            chain,
            store: Store::Memory(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn in_directory(
        factory: Arc<dyn ContractFactory>,
        chain: Arc<dyn ChainOracle>,
        dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            factory,
            chain,
            store: Store::Directory(dir.into()),
        }
    }
}

#[async_trait]
impl DeploymentRegistry for Deployments {
    async fn deploy(&self, name: &str, options: DeployOptions) -> Result<Deployment> {
        if options.skip_if_already_deployed {
            if let Some(existing) = self.store.load(name).await? {
                info!(name, address = %existing.address, "reusing existing deployment");
                return Ok(existing);
            }
        }

        let block = self.chain.current_height().await?;
        let address = self.factory.create(name, &options.from).await?;
        let deployment = Deployment {
            name: name.to_string(),
            address,
            deployer: options.from.address,
            block,
        };
        self.store.save(&deployment).await?;
        info!(name, %address, deployer = %deployment.deployer, "deployed contract");
        Ok(deployment)
    }

    async fn get(&self, name: &str) -> Result<Deployment> {
        self.store
            .load(name)
            .await?
            .ok_or_else(|| HarnessError::NotDeployed(name.to_string()))
    }
}
