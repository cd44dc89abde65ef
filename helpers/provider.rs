//! Interfaces to the chain, signer and encryption collaborators
//!
//! The harness only talks to the outside world through these traits. The
//! in-process [`DevNetwork`](crate::devnet::DevNetwork) implements all of them.

use async_trait::async_trait;

use crate::codec::Session;
use crate::errors::{HarnessError, Result};
use crate::types::{Account, AccountIndex, Address, BlockHeight, CallOutput, ContractCall, Receipt};

/// Read-only view of chain progress
#[async_trait]
pub trait ChainOracle: Send + Sync {
    async fn current_height(&self) -> Result<BlockHeight>;
}

/// Contract invocation surface
#[async_trait]
pub trait ContractInvoker: Send + Sync {
    /// Submit a state-mutating call. Returns once the transaction is accepted
    /// into the pending pool, not when it is mined.
    async fn submit(&self, address: &Address, from: &Account, call: ContractCall) -> Result<Receipt>;

    /// Execute a read-only call against the latest mined state
    async fn call(&self, address: &Address, from: &Account, call: ContractCall) -> Result<CallOutput>;
}

/// Ordered signing identities
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Accounts in a stable order for the lifetime of the process
    async fn list_accounts(&self) -> Result<Vec<Address>>;

    async fn balance(&self, address: &Address) -> Result<u128>;
}

/// Source of test funds on development networks
#[async_trait]
pub trait Faucet: Send + Sync {
    async fn request_funds(&self, address: &Address) -> Result<()>;
}

/// Hands out encryption sessions bound to one contract address
#[async_trait]
pub trait EncryptionService: Send + Sync {
    async fn create_session(&self, address: &Address) -> Result<Session>;
}

/// Instantiates contracts by logical name
#[async_trait]
pub trait ContractFactory: Send + Sync {
    async fn create(&self, name: &str, from: &Account) -> Result<Address>;
}

/// Resolve an account index against the provider's ordered list
pub async fn resolve_account(
    accounts: &dyn AccountProvider,
    index: AccountIndex,
) -> Result<Account> {
    let available = accounts.list_accounts().await?;
    available
        .get(index.0)
        .map(|address| Account {
            index,
            address: *address,
        })
        .ok_or(HarnessError::UnknownAccount {
            index,
            available: available.len(),
        })
}
