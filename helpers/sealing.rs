//! Sealed envelopes for confidential u32 values
//!
//! A ciphertext carries one stanza per recipient and a single encrypted body:
//!
//! ```text
//! version(1) | count(1) | count * [ephemeral_pk(32) | nonce(12) | wrapped_key(48)]
//!            | body_nonce(12) | body(4 + 16)
//! ```
//!
//! Each stanza wraps the content key under a key derived (HKDF-SHA256) from an
//! X25519 exchange between a fresh ephemeral key and the recipient. The body is
//! ChaCha20-Poly1305 over the little-endian value, with the contract address as
//! associated data, so an envelope opened against another address fails.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::errors::{HarnessError, Result};
use crate::types::{Address, Ciphertext};

const VERSION: u8 = 1;
const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const WRAPPED_KEY_SIZE: usize = KEY_SIZE + TAG_SIZE;
const STANZA_SIZE: usize = KEY_SIZE + NONCE_SIZE + WRAPPED_KEY_SIZE;
const BODY_SIZE: usize = 4 + TAG_SIZE;

const STANZA_INFO: &[u8] = b"fhe-counter-stanza-v1";
const BODY_DOMAIN: &[u8] = b"fhe-counter-body-v1";

/// Generate a fresh X25519 secret from the thread RNG
pub fn generate_secret() -> StaticSecret {
    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    rand::rng().fill_bytes(&mut bytes[..]);
    StaticSecret::from(*bytes)
}

/// Seal `value` for every key in `recipients`, bound to `address`
pub fn seal(value: u32, address: &Address, recipients: &[PublicKey]) -> Result<Ciphertext> {
    if recipients.is_empty() {
        return Err(HarnessError::Encoding("no recipients for sealed value".to_string()));
    }
    let count = u8::try_from(recipients.len())
        .map_err(|_| HarnessError::Encoding("too many recipients".to_string()))?;

    let mut content_key = Zeroizing::new([0u8; KEY_SIZE]);
    rand::rng().fill_bytes(&mut content_key[..]);

    let mut out = Vec::with_capacity(2 + recipients.len() * STANZA_SIZE + NONCE_SIZE + BODY_SIZE);
    out.push(VERSION);
    out.push(count);

    for recipient in recipients {
        let ephemeral = generate_secret();
        let ephemeral_pk = PublicKey::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(recipient);
        let kek = derive_stanza_key(shared.as_bytes(), &ephemeral_pk, recipient)?;

        let nonce = random_nonce();
        let wrapped = ChaCha20Poly1305::new(Key::from_slice(&kek[..]))
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &content_key[..],
                    aad: address.as_bytes(),
                },
            )
            .map_err(|_| HarnessError::Encoding("failed to wrap content key".to_string()))?;

        out.extend_from_slice(ephemeral_pk.as_bytes());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&wrapped);
    }

    let body_nonce = random_nonce();
    let body = ChaCha20Poly1305::new(Key::from_slice(&content_key[..]))
        .encrypt(
            Nonce::from_slice(&body_nonce),
            Payload {
                msg: &value.to_le_bytes(),
                aad: &body_aad(address),
            },
        )
        .map_err(|_| HarnessError::Encoding("failed to encrypt value".to_string()))?;

    out.extend_from_slice(&body_nonce);
    out.extend_from_slice(&body);
    Ok(Ciphertext::from_bytes(out))
}

/// Open an envelope with `secret`. Fails unless one of the stanzas was sealed
/// for the matching public key and the envelope is bound to `address`.
pub fn open(secret: &StaticSecret, address: &Address, ciphertext: &Ciphertext) -> Result<u32> {
    let bytes = ciphertext.as_bytes();
    if bytes.len() < 2 {
        return Err(HarnessError::Decoding("ciphertext too short".to_string()));
    }
    if bytes[0] != VERSION {
        return Err(HarnessError::Decoding(format!("unsupported ciphertext version {}", bytes[0])));
    }
    let count = bytes[1] as usize;
    let expected = 2 + count * STANZA_SIZE + NONCE_SIZE + BODY_SIZE;
    if count == 0 || bytes.len() != expected {
        return Err(HarnessError::Decoding(format!(
            "malformed ciphertext: {} bytes for {count} stanzas",
            bytes.len()
        )));
    }

    let own_pk = PublicKey::from(secret);
    let stanzas = &bytes[2..2 + count * STANZA_SIZE];
    let content_key = stanzas
        .chunks_exact(STANZA_SIZE)
        .find_map(|stanza| unwrap_stanza(secret, &own_pk, address, stanza))
        .ok_or_else(|| {
            HarnessError::Decoding("ciphertext was not sealed for this session".to_string())
        })?;

    let body_start = 2 + count * STANZA_SIZE;
    let body_nonce = &bytes[body_start..body_start + NONCE_SIZE];
    let body = &bytes[body_start + NONCE_SIZE..];
    let plain = ChaCha20Poly1305::new(Key::from_slice(&content_key[..]))
        .decrypt(
            Nonce::from_slice(body_nonce),
            Payload {
                msg: body,
                aad: &body_aad(address),
            },
        )
        .map_err(|_| HarnessError::Decoding("ciphertext body failed authentication".to_string()))?;

    let value: [u8; 4] = plain
        .as_slice()
        .try_into()
        .map_err(|_| HarnessError::Decoding("unexpected plaintext width".to_string()))?;
    Ok(u32::from_le_bytes(value))
}

fn unwrap_stanza(
    secret: &StaticSecret,
    own_pk: &PublicKey,
    address: &Address,
    stanza: &[u8],
) -> Option<Zeroizing<[u8; KEY_SIZE]>> {
    let ephemeral_bytes: [u8; KEY_SIZE] = stanza[..KEY_SIZE].try_into().ok()?;
    let ephemeral_pk = PublicKey::from(ephemeral_bytes);
    let nonce = &stanza[KEY_SIZE..KEY_SIZE + NONCE_SIZE];
    let wrapped = &stanza[KEY_SIZE + NONCE_SIZE..];

    let shared = secret.diffie_hellman(&ephemeral_pk);
    let kek = derive_stanza_key(shared.as_bytes(), &ephemeral_pk, own_pk).ok()?;
    let key = ChaCha20Poly1305::new(Key::from_slice(&kek[..]))
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: wrapped,
                aad: address.as_bytes(),
            },
        )
        .ok()?;

    let mut content_key = Zeroizing::new([0u8; KEY_SIZE]);
    if key.len() != KEY_SIZE {
        return None;
    }
    content_key.copy_from_slice(&key);
    Some(content_key)
}

fn derive_stanza_key(
    shared: &[u8; 32],
    ephemeral_pk: &PublicKey,
    recipient: &PublicKey,
) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(ephemeral_pk.as_bytes());
    salt[32..].copy_from_slice(recipient.as_bytes());

    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    Hkdf::<Sha256>::new(Some(&salt[..]), &shared[..])
        .expand(STANZA_INFO, &mut okm[..])
        .map_err(|_| HarnessError::Encoding("key derivation failed".to_string()))?;
    Ok(okm)
}

fn body_aad(address: &Address) -> Vec<u8> {
    let mut aad = Vec::with_capacity(BODY_DOMAIN.len() + 20);
    aad.extend_from_slice(BODY_DOMAIN);
    aad.extend_from_slice(address.as_bytes());
    aad
}

fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(byte: u8) -> Address {
        Address([byte; 20])
    }

    #[test]
    fn recipient_opens_sealed_value() {
        let secret = generate_secret();
        let sealed = seal(42, &address(1), &[PublicKey::from(&secret)]).unwrap();
        assert_eq!(open(&secret, &address(1), &sealed).unwrap(), 42);
    }

    #[test]
    fn every_recipient_can_open() {
        let first = generate_secret();
        let second = generate_secret();
        let sealed = seal(
            7,
            &address(1),
            &[PublicKey::from(&first), PublicKey::from(&second)],
        )
        .unwrap();
        assert_eq!(open(&first, &address(1), &sealed).unwrap(), 7);
        assert_eq!(open(&second, &address(1), &sealed).unwrap(), 7);
    }

    #[test]
    fn stranger_cannot_open() {
        let owner = generate_secret();
        let stranger = generate_secret();
        let sealed = seal(7, &address(1), &[PublicKey::from(&owner)]).unwrap();
        let err = open(&stranger, &address(1), &sealed).unwrap_err();
        assert!(matches!(err, HarnessError::Decoding(_)));
    }

    #[test]
    fn envelope_is_bound_to_address() {
        let secret = generate_secret();
        let sealed = seal(7, &address(1), &[PublicKey::from(&secret)]).unwrap();
        let err = open(&secret, &address(2), &sealed).unwrap_err();
        assert!(matches!(err, HarnessError::Decoding(_)));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let secret = generate_secret();
        let sealed = seal(7, &address(1), &[PublicKey::from(&secret)]).unwrap();
        let mut bytes = sealed.as_bytes().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let err = open(&secret, &address(1), &Ciphertext::from_bytes(bytes)).unwrap_err();
        assert!(matches!(err, HarnessError::Decoding(_)));
    }

    #[test]
    fn truncated_ciphertext_is_malformed() {
        let secret = generate_secret();
        let err = open(&secret, &address(1), &Ciphertext::from_bytes(vec![VERSION, 1, 0])).unwrap_err();
        assert!(matches!(err, HarnessError::Decoding(_)));
    }

    #[test]
    fn sealing_without_recipients_fails() {
        let err = seal(1, &address(1), &[]).unwrap_err();
        assert!(matches!(err, HarnessError::Encoding(_)));
    }
}
