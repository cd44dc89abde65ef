//! In-process development network
//!
//! Stands in for the chain node, signer, deployment framework and encryption
//! service during scripts and tests. Blocks are produced on a fixed interval;
//! submitted transactions wait in a pending pool and take effect in the next
//! block, so a write is only visible to reads after a block has passed.
//!
//! With a snapshot path the chain state (height, accounts, contracts and the
//! network key) is written to JSON after every block, so separate task runs
//! operate on the same chain.

mod counter;
mod network_key;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub use counter::{CounterContract, ADD, GET_COUNTER, NAME as COUNTER};
pub use network_key::NetworkKey;

use crate::codec::Session;
use crate::config::NetworkSettings;
use crate::errors::{HarnessError, Result};
use crate::provider::{
    AccountProvider, ChainOracle, ContractFactory, ContractInvoker, EncryptionService, Faucet,
};
use crate::types::{
    Account, Address, BlockHeight, CallOutput, Ciphertext, ContractCall, PublicKeyHandle, Receipt,
    TxHash,
};

/// Balance of every account on a funded network
pub const INITIAL_BALANCE: u128 = 10_000 * ONE_TOKEN;
/// Amount credited per faucet request
pub const FAUCET_AMOUNT: u128 = 100 * ONE_TOKEN;
const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

const ACCOUNT_DOMAIN: &[u8] = b"fhe-counter-devnet-account";

enum PendingTx {
    Call {
        hash: TxHash,
        address: Address,
        call: ContractCall,
    },
    Fund {
        address: Address,
        amount: u128,
    },
}

#[derive(Serialize, Deserialize)]
struct ChainState {
    height: BlockHeight,
    nonce: u64,
    network_key: NetworkKey,
    accounts: Vec<Address>,
    balances: BTreeMap<Address, u128>,
    contracts: BTreeMap<Address, CounterContract>,
    #[serde(skip)]
    pending: Vec<PendingTx>,
}

impl ChainState {
    fn fresh(settings: &NetworkSettings) -> Self {
        let accounts: Vec<Address> = (0..settings.accounts).map(derive_account).collect();
        let balances = if settings.funded {
            accounts.iter().map(|a| (*a, INITIAL_BALANCE)).collect()
        } else {
            BTreeMap::new()
        };
        Self {
            height: BlockHeight(0),
            nonce: 0,
            network_key: NetworkKey::generate(),
            accounts,
            balances,
            contracts: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    fn check_signer(&self, from: &Account) -> Result<()> {
        if self.accounts.get(from.index.0) != Some(&from.address) {
            return Err(HarnessError::SubmissionRejected(format!(
                "unknown signer {} at index {}",
                from.address, from.index
            )));
        }
        Ok(())
    }

    fn check_funds(&self, from: &Account) -> Result<()> {
        if self.balances.get(&from.address).copied().unwrap_or(0) == 0 {
            return Err(HarnessError::SubmissionRejected(format!(
                "insufficient funds for gas: {} has no balance",
                from.address
            )));
        }
        Ok(())
    }

    /// Include every pending transaction in a new block
    fn mine(&mut self) -> BlockHeight {
        let pending = std::mem::take(&mut self.pending);
        for tx in pending {
            match tx {
                PendingTx::Call {
                    hash,
                    address,
                    call,
                } => match self.contracts.get_mut(&address) {
                    Some(contract) => {
                        if let Err(err) = contract.execute(&address, &self.network_key, &call) {
                            warn!(%hash, %err, "transaction reverted");
                        }
                    }
                    None => warn!(%hash, %address, "transaction target disappeared"),
                },
                PendingTx::Fund { address, amount } => {
                    *self.balances.entry(address).or_default() += amount;
                }
            }
        }
        self.height = self.height.next();
        self.height
    }
}

struct Inner {
    state: Mutex<ChainState>,
    snapshot: Option<PathBuf>,
    write_lock: tokio::sync::Mutex<()>,
    reachable: AtomicBool,
    mining_paused: AtomicBool,
}

impl Inner {
    fn ensure_reachable(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(HarnessError::ChainUnavailable(
                "development network is not reachable".to_string(),
            ))
        }
    }

    fn mine(&self) -> BlockHeight {
        self.state.lock().mine()
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        let json = {
            let state = self.state.lock();
            serde_json::to_vec_pretty(&*state)?
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, json).await?;
        tokio::fs::rename(&staging, path).await?;
        Ok(())
    }
}

/// In-process chain implementing every collaborator interface
pub struct DevNetwork {
    inner: Arc<Inner>,
    producer: JoinHandle<()>,
}

impl DevNetwork {
    /// Start the network, resuming from `snapshot` if the file exists.
    /// Must be called from within a tokio runtime.
    pub async fn start(settings: &NetworkSettings, snapshot: Option<PathBuf>) -> Result<Arc<Self>> {
        let state = match &snapshot {
            Some(path) if path.exists() => {
                let state = load_snapshot(path).await?;
                info!(path = %path.display(), height = %state.height, "resumed development network");
                state
            }
            _ => ChainState::fresh(settings),
        };

        let inner = Arc::new(Inner {
            state: Mutex::new(state),
            snapshot,
            write_lock: tokio::sync::Mutex::new(()),
            reachable: AtomicBool::new(true),
            mining_paused: AtomicBool::new(false),
        });
        inner.persist().await?;

        let block_time = Duration::from_millis(settings.block_time_ms);
        let producer = tokio::spawn(produce_blocks(inner.clone(), block_time));
        info!(network = %settings.name, ?block_time, "development network started");

        Ok(Arc::new(Self { inner, producer }))
    }

    /// Network with default settings and no persistence
    pub async fn ephemeral() -> Result<Arc<Self>> {
        Self::start(&NetworkSettings::default(), None).await
    }

    pub fn network_key(&self) -> PublicKeyHandle {
        self.inner.state.lock().network_key.public_handle()
    }

    /// Mine a block immediately, regardless of the producer schedule
    pub async fn mine_block(&self) -> Result<BlockHeight> {
        let height = self.inner.mine();
        self.inner.persist().await?;
        Ok(height)
    }

    /// Stop automatic block production; the height stalls until resumed
    pub fn pause_mining(&self) {
        self.inner.mining_paused.store(true, Ordering::SeqCst);
    }

    /// Restart automatic block production after [`Self::pause_mining`]
    pub fn resume_mining(&self) {
        self.inner.mining_paused.store(false, Ordering::SeqCst);
    }

    /// Simulate the node going offline (`false`) or coming back (`true`)
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn pending_transactions(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Stored, network-sealed counter of a deployed contract
    pub fn raw_counter(&self, address: &Address) -> Result<Ciphertext> {
        self.inner
            .state
            .lock()
            .contracts
            .get(address)
            .map(|contract| contract.stored_counter().clone())
            .ok_or_else(|| HarnessError::SubmissionRejected(format!("no contract at {address}")))
    }

    /// Stop block production and write a final snapshot
    pub async fn shutdown(&self) -> Result<()> {
        self.pause_mining();
        self.producer.abort();
        self.inner.persist().await
    }
}

impl Drop for DevNetwork {
    fn drop(&mut self) {
        self.producer.abort();
    }
}

async fn produce_blocks(inner: Arc<Inner>, block_time: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + block_time, block_time);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if inner.mining_paused.load(Ordering::SeqCst) {
            continue;
        }
        let height = inner.mine();
        debug!(%height, "mined block");
        if let Err(err) = inner.persist().await {
            warn!(%err, "failed to persist chain snapshot");
        }
    }
}

async fn load_snapshot(path: &Path) -> Result<ChainState> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn derive_account(index: usize) -> Address {
    let digest: [u8; 32] = Sha256::new()
        .chain_update(ACCOUNT_DOMAIN)
        .chain_update((index as u64).to_be_bytes())
        .finalize()
        .into();
    last_20(&digest)
}

fn derive_contract_address(deployer: &Address, nonce: u64) -> Address {
    let digest: [u8; 32] = Sha256::new()
        .chain_update(deployer.as_bytes())
        .chain_update(nonce.to_be_bytes())
        .finalize()
        .into();
    last_20(&digest)
}

fn derive_tx_hash(from: &Address, to: &Address, call: &ContractCall, nonce: u64) -> TxHash {
    TxHash(
        Sha256::new()
            .chain_update(from.as_bytes())
            .chain_update(to.as_bytes())
            .chain_update(call.method.as_bytes())
            .chain_update(nonce.to_be_bytes())
            .finalize()
            .into(),
    )
}

fn last_20(digest: &[u8; 32]) -> Address {
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    Address(address)
}

#[async_trait]
impl ChainOracle for DevNetwork {
    async fn current_height(&self) -> Result<BlockHeight> {
        self.inner.ensure_reachable()?;
        Ok(self.inner.state.lock().height)
    }
}

#[async_trait]
impl ContractInvoker for DevNetwork {
    async fn submit(&self, address: &Address, from: &Account, call: ContractCall) -> Result<Receipt> {
        self.inner.ensure_reachable()?;
        let mut state = self.inner.state.lock();
        state.check_signer(from)?;
        state.check_funds(from)?;
        if !state.contracts.contains_key(address) {
            return Err(HarnessError::SubmissionRejected(format!("no contract at {address}")));
        }
        CounterContract::validate(address, &state.network_key, &call)?;

        state.nonce += 1;
        let hash = derive_tx_hash(&from.address, address, &call, state.nonce);
        let submitted_at = state.height;
        debug!(%hash, %address, method = %call.method, %submitted_at, "transaction pending");
        state.pending.push(PendingTx::Call {
            hash,
            address: *address,
            call,
        });

        Ok(Receipt {
            tx_hash: hash,
            from: from.address,
            submitted_at,
        })
    }

    async fn call(&self, address: &Address, from: &Account, call: ContractCall) -> Result<CallOutput> {
        self.inner.ensure_reachable()?;
        let state = self.inner.state.lock();
        state.check_signer(from)?;
        let contract = state
            .contracts
            .get(address)
            .ok_or_else(|| HarnessError::SubmissionRejected(format!("no contract at {address}")))?;
        contract.query(address, &state.network_key, &call)
    }
}

#[async_trait]
impl AccountProvider for DevNetwork {
    async fn list_accounts(&self) -> Result<Vec<Address>> {
        self.inner.ensure_reachable()?;
        Ok(self.inner.state.lock().accounts.clone())
    }

    async fn balance(&self, address: &Address) -> Result<u128> {
        self.inner.ensure_reachable()?;
        Ok(self
            .inner
            .state
            .lock()
            .balances
            .get(address)
            .copied()
            .unwrap_or(0))
    }
}

#[async_trait]
impl Faucet for DevNetwork {
    async fn request_funds(&self, address: &Address) -> Result<()> {
        self.inner.ensure_reachable()?;
        info!(%address, amount = FAUCET_AMOUNT, "faucet funding queued");
        self.inner.state.lock().pending.push(PendingTx::Fund {
            address: *address,
            amount: FAUCET_AMOUNT,
        });
        Ok(())
    }
}

#[async_trait]
impl EncryptionService for DevNetwork {
    async fn create_session(&self, address: &Address) -> Result<Session> {
        self.inner.ensure_reachable()?;
        Ok(Session::new(*address, self.network_key()))
    }
}

#[async_trait]
impl ContractFactory for DevNetwork {
    async fn create(&self, name: &str, from: &Account) -> Result<Address> {
        self.inner.ensure_reachable()?;
        if name != COUNTER {
            return Err(HarnessError::SubmissionRejected(format!(
                "no contract artifact named {name}"
            )));
        }

        let address = {
            let mut state = self.inner.state.lock();
            state.check_signer(from)?;
            state.check_funds(from)?;
            state.nonce += 1;
            let address = derive_contract_address(&from.address, state.nonce);
            let contract = CounterContract::deploy(&address, &state.network_key)?;
            state.contracts.insert(address, contract);
            address
        };
        self.inner.persist().await?;
        Ok(address)
    }
}
