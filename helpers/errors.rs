//! Error types shared by the harness workflows

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{AccountIndex, BlockHeight};

/// Result alias used throughout the helpers crate
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors surfaced by the confirmation barrier, the codec and the workflows
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The chain oracle or contract surface could not be reached
    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),

    /// The contract rejected a state-mutating call
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    /// Plaintext could not be encrypted (out of range, bad key material)
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Ciphertext could not be decrypted by this session
    #[error("decoding error: {0}")]
    Decoding(String),

    /// The confirmation barrier hit its deadline
    #[error("block {target} not confirmed after {waited_ms}ms (last seen {last_seen})")]
    ConfirmationTimeout {
        target: BlockHeight,
        last_seen: BlockHeight,
        waited_ms: u128,
    },

    /// The confirmation barrier was cancelled by its caller
    #[error("wait for block {target} cancelled")]
    Cancelled { target: BlockHeight },

    #[error("unknown account index {index} ({available} accounts available)")]
    UnknownAccount { index: AccountIndex, available: usize },

    #[error("no deployment named {0}")]
    NotDeployed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("config not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for HarnessError {
    fn from(err: serde_json::Error) -> Self {
        HarnessError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for HarnessError {
    fn from(err: toml::de::Error) -> Self {
        HarnessError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for HarnessError {
    fn from(err: toml::ser::Error) -> Self {
        HarnessError::Serialization(err.to_string())
    }
}
