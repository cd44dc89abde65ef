//! Core value types passed between the harness and its collaborators

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::HarnessError;

/// Height of the chain, as reported by the chain oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    pub fn next(self) -> Self {
        BlockHeight(self.0 + 1)
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 20-byte contract or account address, rendered as `0x`-prefixed hex
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)
            .map_err(|e| HarnessError::Serialization(format!("invalid address {s}: {e}")))?;
        let array: [u8; 20] = bytes.try_into().map_err(|_| {
            HarnessError::Serialization(format!("address {s} must be 20 bytes"))
        })?;
        Ok(Address(array))
    }
}

impl TryFrom<String> for Address {
    type Error = HarnessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

/// Position of a signer in the account provider's ordered list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountIndex(pub usize);

impl fmt::Display for AccountIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountIndex {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(AccountIndex)
    }
}

/// A resolved signing identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    pub index: AccountIndex,
    pub address: Address,
}

/// Unencrypted counter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plaintext(pub u64);

impl Plaintext {
    /// Narrow to the contract's 32-bit confidential integer width
    pub fn to_u32(self) -> Option<u32> {
        u32::try_from(self.0).ok()
    }
}

impl From<u32> for Plaintext {
    fn from(value: u32) -> Self {
        Plaintext(u64::from(value))
    }
}

impl fmt::Display for Plaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque encrypted payload. Only the codec and the network look inside.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ciphertext(Vec<u8>);

impl Ciphertext {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Ciphertext(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ciphertext({} bytes)", self.0.len())
    }
}

impl TryFrom<String> for Ciphertext {
    type Error = HarnessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        hex::decode(&value)
            .map(Ciphertext)
            .map_err(|e| HarnessError::Serialization(format!("invalid ciphertext hex: {e}")))
    }
}

impl From<Ciphertext> for String {
    fn from(ciphertext: Ciphertext) -> Self {
        hex::encode(ciphertext.0)
    }
}

/// X25519 public key a session hands to the contract so results can be
/// sealed for it
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKeyHandle(pub [u8; 32]);

impl fmt::Display for PublicKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyHandle({self})")
    }
}

impl TryFrom<String> for PublicKeyHandle {
    type Error = HarnessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let digits = value.strip_prefix("0x").unwrap_or(&value);
        let bytes = hex::decode(digits)
            .map_err(|e| HarnessError::Serialization(format!("invalid public key: {e}")))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| HarnessError::Serialization("public key must be 32 bytes".to_string()))?;
        Ok(PublicKeyHandle(array))
    }
}

impl From<PublicKeyHandle> for String {
    fn from(key: PublicKeyHandle) -> Self {
        key.to_string()
    }
}

/// Transaction hash returned on submission
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({self})")
    }
}

/// Acknowledgement that a state-mutating call entered the pending pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub from: Address,
    /// Chain height when the transaction was accepted; it is mined in a later block
    pub submitted_at: BlockHeight,
}

/// Argument to a contract method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    Encrypted(Ciphertext),
    PublicKey(PublicKeyHandle),
}

/// A contract method invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub method: String,
    pub args: Vec<CallArg>,
}

impl ContractCall {
    pub fn new(method: impl Into<String>, args: Vec<CallArg>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

/// Value returned by a read-only contract call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutput {
    Encrypted(Ciphertext),
    /// The method returns nothing, e.g. a dry run of a mutating call
    Empty,
}
