//! Encrypted value codec
//!
//! A [`Session`] owns the key material for one contract address. It encrypts
//! plaintext counter values for submission and decrypts values the contract
//! sealed for the session's public key. Sessions are created per workflow
//! invocation and their secret is zeroized when dropped.

use std::fmt;

use x25519_dalek::{PublicKey, StaticSecret};

use crate::errors::{HarnessError, Result};
use crate::sealing;
use crate::types::{Address, Ciphertext, Plaintext, PublicKeyHandle};

pub struct Session {
    address: Address,
    secret: StaticSecret,
    public_key: PublicKey,
    network_key: PublicKey,
}

impl Session {
    /// Allocate fresh key material for `address` on the network whose
    /// encryption key is `network_key`
    pub fn new(address: Address, network_key: PublicKeyHandle) -> Self {
        let secret = sealing::generate_secret();
        let public_key = PublicKey::from(&secret);
        Self {
            address,
            secret,
            public_key,
            network_key: PublicKey::from(network_key.0),
        }
    }

    /// Handle passed to the contract so it can seal results for this session
    pub fn public_key(&self) -> PublicKeyHandle {
        PublicKeyHandle(self.public_key.to_bytes())
    }

    /// Encrypt a counter value for this session's contract.
    ///
    /// The envelope is readable by the network (so the contract can operate on
    /// it) and by this session.
    pub fn encrypt(&self, value: Plaintext) -> Result<Ciphertext> {
        let narrow = value.to_u32().ok_or_else(|| {
            HarnessError::Encoding(format!("{value} does not fit in a 32-bit confidential integer"))
        })?;
        sealing::seal(narrow, &self.address, &[self.network_key, self.public_key])
    }

    /// Decrypt a ciphertext sealed for this session. Idempotent.
    pub fn decrypt(&self, address: &Address, ciphertext: &Ciphertext) -> Result<Plaintext> {
        if *address != self.address {
            return Err(HarnessError::Decoding(format!(
                "session is bound to {}, not {address}",
                self.address
            )));
        }
        sealing::open(&self.secret, address, ciphertext).map(Plaintext::from)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}
