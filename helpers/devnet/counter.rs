//! Confidential counter contract executed by the development network
//!
//! Methods:
//! - `add(encrypted amount)`: adds to the stored total with wrapping 32-bit
//!   arithmetic, the same as an encrypted `uint32` add. Called read-only it
//!   is validated and returns nothing.
//! - `getCounter(public key)`: returns the total sealed for that key

use serde::{Deserialize, Serialize};

use super::network_key::NetworkKey;
use crate::errors::{HarnessError, Result};
use crate::types::{Address, CallArg, CallOutput, Ciphertext, ContractCall};

pub const NAME: &str = "Counter";
pub const ADD: &str = "add";
pub const GET_COUNTER: &str = "getCounter";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterContract {
    /// Running total, sealed to the network key
    counter: Ciphertext,
}

impl CounterContract {
    pub fn deploy(address: &Address, key: &NetworkKey) -> Result<Self> {
        Ok(Self {
            counter: key.seal(address, 0)?,
        })
    }

    pub fn stored_counter(&self) -> &Ciphertext {
        &self.counter
    }

    /// Check a state-mutating call before it is queued
    pub fn validate(address: &Address, key: &NetworkKey, call: &ContractCall) -> Result<()> {
        match (call.method.as_str(), call.args.as_slice()) {
            (ADD, [CallArg::Encrypted(amount)]) => key
                .open(address, amount)
                .map(|_| ())
                .map_err(|e| HarnessError::SubmissionRejected(format!("add: invalid ciphertext ({e})"))),
            (ADD, _) => Err(HarnessError::SubmissionRejected(
                "add expects one encrypted argument".to_string(),
            )),
            (method, _) => Err(HarnessError::SubmissionRejected(format!(
                "Counter has no mutating method {method}"
            ))),
        }
    }

    /// Apply a validated state-mutating call
    pub fn execute(&mut self, address: &Address, key: &NetworkKey, call: &ContractCall) -> Result<()> {
        Self::validate(address, key, call)?;
        if let [CallArg::Encrypted(amount)] = call.args.as_slice() {
            let current = key.open(address, &self.counter)?;
            let amount = key.open(address, amount)?;
            self.counter = key.seal(address, current.wrapping_add(amount))?;
        }
        Ok(())
    }

    /// Serve a read-only call
    pub fn query(&self, address: &Address, key: &NetworkKey, call: &ContractCall) -> Result<CallOutput> {
        match (call.method.as_str(), call.args.as_slice()) {
            (GET_COUNTER, [CallArg::PublicKey(reader)]) => {
                let total = key.open(address, &self.counter)?;
                Ok(CallOutput::Encrypted(key.seal_for(address, total, reader)?))
            }
            (GET_COUNTER, _) => Err(HarnessError::SubmissionRejected(
                "getCounter expects a public key".to_string(),
            )),
            (ADD, _) => {
                Self::validate(address, key, call)?;
                Ok(CallOutput::Empty)
            }
            (method, _) => Err(HarnessError::SubmissionRejected(format!(
                "Counter has no view method {method}"
            ))),
        }
    }
}
