//! The network's own encryption key
//!
//! Every ciphertext a contract stores or computes on is sealed to this key. The
//! key also re-seals results for readers who present their public key.

use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::errors::{HarnessError, Result};
use crate::sealing;
use crate::types::{Address, Ciphertext, PublicKeyHandle};

#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkKey {
    secret: StaticSecret,
}

impl NetworkKey {
    pub fn generate() -> Self {
        Self {
            secret: sealing::generate_secret(),
        }
    }

    pub fn public_handle(&self) -> PublicKeyHandle {
        PublicKeyHandle(PublicKey::from(&self.secret).to_bytes())
    }

    fn public_key(&self) -> PublicKey {
        PublicKey::from(&self.secret)
    }

    /// Open a ciphertext that includes a stanza for the network
    pub fn open(&self, address: &Address, ciphertext: &Ciphertext) -> Result<u32> {
        sealing::open(&self.secret, address, ciphertext)
    }

    /// Seal a value only the network can read
    pub fn seal(&self, address: &Address, value: u32) -> Result<Ciphertext> {
        sealing::seal(value, address, &[self.public_key()])
    }

    /// Seal a value for `reader` only
    pub fn seal_for(&self, address: &Address, value: u32, reader: &PublicKeyHandle) -> Result<Ciphertext> {
        sealing::seal(value, address, &[PublicKey::from(reader.0)])
    }
}

impl TryFrom<String> for NetworkKey {
    type Error = HarnessError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        let bytes = hex::decode(&value)
            .map_err(|e| HarnessError::Serialization(format!("invalid network key: {e}")))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| HarnessError::Serialization("network key must be 32 bytes".to_string()))?;
        Ok(Self {
            secret: StaticSecret::from(array),
        })
    }
}

impl From<NetworkKey> for String {
    fn from(key: NetworkKey) -> Self {
        hex::encode(key.secret.to_bytes())
    }
}
