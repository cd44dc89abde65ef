//! Counter workflows
//!
//! [`Environment`] bundles the collaborators a task or test needs. The two
//! workflows are:
//! - [`Environment::add_count`]: encrypt, submit `add`, wait for the next block
//! - [`Environment::get_count`]: call `getCounter` with a fresh session's
//!   public key and decrypt the result
//!
//! Errors from any step abort the workflow unchanged. Nothing is retried here.

use std::sync::Arc;

use tracing::info;

use crate::block::{wait_for_block, Confirmation, WaitOptions};
use crate::config::{HarnessConfig, LOCALFHENIX};
use crate::devnet::{DevNetwork, ADD, COUNTER, GET_COUNTER};
use crate::errors::{HarnessError, Result};
use crate::provider::{
    resolve_account, AccountProvider, ChainOracle, ContractInvoker, EncryptionService, Faucet,
};
use crate::registry::{DeployOptions, Deployment, DeploymentRegistry};
use crate::types::{Account, AccountIndex, Address, BlockHeight, CallArg, CallOutput, ContractCall, Plaintext};

#[derive(Clone)]
pub struct Environment {
    pub network: String,
    pub chain: Arc<dyn ChainOracle>,
    pub contracts: Arc<dyn ContractInvoker>,
    pub accounts: Arc<dyn AccountProvider>,
    pub encryption: Arc<dyn EncryptionService>,
    pub deployments: Arc<dyn DeploymentRegistry>,
    pub faucet: Option<Arc<dyn Faucet>>,
    pub wait: WaitOptions,
}

impl Environment {
    /// Wire every collaborator to a development network
    pub fn from_devnet(
        devnet: Arc<DevNetwork>,
        deployments: Arc<dyn DeploymentRegistry>,
        config: &HarnessConfig,
    ) -> Self {
        Self {
            network: config.network.name.clone(),
            chain: devnet.clone(),
            contracts: devnet.clone(),
            accounts: devnet.clone(),
            encryption: devnet.clone(),
            deployments,
            faucet: Some(devnet as Arc<dyn Faucet>),
            wait: config.wait_options(),
        }
    }

    pub fn with_wait_options(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    pub async fn account(&self, index: AccountIndex) -> Result<Account> {
        resolve_account(self.accounts.as_ref(), index).await
    }

    /// Bounded wait for the chain to pass `target` (or the current height)
    pub async fn wait_for_block(&self, target: Option<BlockHeight>) -> Result<BlockHeight> {
        wait_for_block(self.chain.as_ref(), target, &self.wait)
            .await?
            .into_result()
    }

    /// Like [`Self::wait_for_block`] but hands back the tri-state outcome
    pub async fn confirm(&self, target: Option<BlockHeight>) -> Result<Confirmation> {
        wait_for_block(self.chain.as_ref(), target, &self.wait).await
    }

    /// Add `amount` to the counter at `address` as `account`. Returns once the
    /// increment has been mined.
    pub async fn add_count(
        &self,
        address: &Address,
        account: AccountIndex,
        amount: Plaintext,
    ) -> Result<()> {
        let signer = self.account(account).await?;
        let session = self.encryption.create_session(address).await?;
        let encrypted = session.encrypt(amount)?;

        let receipt = self
            .contracts
            .submit(
                address,
                &signer,
                ContractCall::new(ADD, vec![CallArg::Encrypted(encrypted)]),
            )
            .await?;
        info!(tx = %receipt.tx_hash, %address, signer = %signer.address, "add submitted");

        let height = self.wait_for_block(None).await?;
        info!(tx = %receipt.tx_hash, %height, "add confirmed");
        Ok(())
    }

    /// Read and decrypt the counter at `address` as `account`
    pub async fn get_count(&self, address: &Address, account: AccountIndex) -> Result<Plaintext> {
        let signer = self.account(account).await?;
        let session = self.encryption.create_session(address).await?;

        let output = self
            .contracts
            .call(
                address,
                &signer,
                ContractCall::new(GET_COUNTER, vec![CallArg::PublicKey(session.public_key())]),
            )
            .await?;
        let CallOutput::Encrypted(encrypted) = output else {
            return Err(HarnessError::Decoding(
                "getCounter returned no ciphertext".to_string(),
            ));
        };

        session.decrypt(address, &encrypted)
    }

    /// Deploy a fresh counter from `from`
    pub async fn deploy_counter(&self, from: AccountIndex) -> Result<Deployment> {
        let deployer = self.account(from).await?;
        self.deployments
            .deploy(COUNTER, DeployOptions::new(deployer))
            .await
    }

    /// Address of the most recent counter deployment
    pub async fn counter_address(&self) -> Result<Address> {
        Ok(self.deployments.get(COUNTER).await?.address)
    }

    /// On `localfhenix`, top up an empty account from the faucet and wait for
    /// the funding block. Returns whether funds were requested.
    pub async fn ensure_funded(&self, index: AccountIndex) -> Result<bool> {
        if self.network != LOCALFHENIX {
            return Ok(false);
        }
        let Some(faucet) = &self.faucet else {
            return Ok(false);
        };

        let account = self.account(index).await?;
        if self.accounts.balance(&account.address).await? != 0 {
            return Ok(false);
        }

        info!(address = %account.address, "balance for signer is 0 - getting tokens from faucet");
        faucet.request_funds(&account.address).await?;
        self.wait_for_block(None).await?;
        Ok(true)
    }
}
