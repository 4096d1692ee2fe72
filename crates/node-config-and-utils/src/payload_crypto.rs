//! Symmetric payload encryption for envelopes that leave the node.
//!
//! The key is derived from the node secret with HKDF-SHA256 and the payload
//! is XORed with a ChaCha20 keystream. The encrypted form is
//! `nonce (12 bytes) || ciphertext`.
//!
//! There is no authentication tag: decrypting with the wrong secret yields
//! different bytes rather than an error. Nodes sharing an itinerary must
//! share the secret.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

/// ChaCha20 nonce size (96 bits).
pub const PAYLOAD_NONCE_SIZE: usize = 12;
/// ChaCha20 key size (256 bits).
pub const PAYLOAD_KEY_SIZE: usize = 32;

const KDF_SALT: &[u8] = b"edgebus-payload-v1";
const KDF_INFO: &[u8] = b"envelope payload";

/// Errors returned by payload encryption.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadCryptoError {
    #[error("node secret is empty")]
    EmptySecret,
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("encrypted payload too short: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Encrypts and decrypts payload bytes with a key derived from the node secret.
#[derive(Clone)]
pub struct PayloadCipher {
    key: [u8; PAYLOAD_KEY_SIZE],
}

impl std::fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCipher").finish_non_exhaustive()
    }
}

impl PayloadCipher {
    /// Derive the payload key from a secret.
    pub fn from_secret(secret: &str) -> Result<Self, PayloadCryptoError> {
        if secret.is_empty() {
            return Err(PayloadCryptoError::EmptySecret);
        }
        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), secret.as_bytes());
        let mut key = [0u8; PAYLOAD_KEY_SIZE];
        hk.expand(KDF_INFO, &mut key)
            .map_err(|_| PayloadCryptoError::KeyDerivation)?;
        Ok(Self { key })
    }

    /// Encrypt with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut nonce = [0u8; PAYLOAD_NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);
        self.encrypt_with_nonce(&nonce, plaintext)
    }

    /// Encrypt with a caller-provided nonce. Intended for deterministic tests.
    pub fn encrypt_with_nonce(&self, nonce: &[u8; PAYLOAD_NONCE_SIZE], plaintext: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAYLOAD_NONCE_SIZE + plaintext.len());
        out.extend_from_slice(nonce);
        out.extend_from_slice(plaintext);
        self.apply(nonce, &mut out[PAYLOAD_NONCE_SIZE..]);
        out
    }

    /// Decrypt `nonce || ciphertext`.
    pub fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>, PayloadCryptoError> {
        if encrypted.len() < PAYLOAD_NONCE_SIZE {
            return Err(PayloadCryptoError::Truncated {
                expected: PAYLOAD_NONCE_SIZE,
                actual: encrypted.len(),
            });
        }
        let (nonce_bytes, ciphertext) = encrypted.split_at(PAYLOAD_NONCE_SIZE);
        let mut nonce = [0u8; PAYLOAD_NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);

        let mut plaintext = ciphertext.to_vec();
        self.apply(&nonce, &mut plaintext);
        Ok(plaintext)
    }

    fn apply(&self, nonce: &[u8; PAYLOAD_NONCE_SIZE], buf: &mut [u8]) {
        let mut cipher = ChaCha20::new(&self.key.into(), &(*nonce).into());
        cipher.apply_keystream(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let cipher = PayloadCipher::from_secret("node-secret").unwrap();
        let plaintext = br#"{"temperature":21.5}"#;

        let encrypted = cipher.encrypt(plaintext);
        assert_ne!(&encrypted[PAYLOAD_NONCE_SIZE..], plaintext);
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn test_wrong_secret_yields_different_bytes_without_error() {
        let sender = PayloadCipher::from_secret("right").unwrap();
        let receiver = PayloadCipher::from_secret("wrong").unwrap();
        let plaintext = b"sensor reading 42";

        let encrypted = sender.encrypt(plaintext);
        let decrypted = receiver.decrypt(&encrypted).unwrap();

        assert_eq!(decrypted.len(), plaintext.len());
        assert_ne!(decrypted, plaintext);
    }

    #[test]
    fn test_same_nonce_is_deterministic() {
        let cipher = PayloadCipher::from_secret("node-secret").unwrap();
        let nonce = [9u8; PAYLOAD_NONCE_SIZE];

        let a = cipher.encrypt_with_nonce(&nonce, b"abc");
        let b = cipher.encrypt_with_nonce(&nonce, b"abc");
        assert_eq!(a, b);
        assert_eq!(&a[..PAYLOAD_NONCE_SIZE], &nonce);
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let cipher = PayloadCipher::from_secret("node-secret").unwrap();
        assert_ne!(cipher.encrypt(b"abc"), cipher.encrypt(b"abc"));
    }

    #[test]
    fn test_empty_payload_round_trip() {
        let cipher = PayloadCipher::from_secret("node-secret").unwrap();
        let encrypted = cipher.encrypt(b"");
        assert_eq!(encrypted.len(), PAYLOAD_NONCE_SIZE);
        assert!(cipher.decrypt(&encrypted).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_payload_is_rejected() {
        let cipher = PayloadCipher::from_secret("node-secret").unwrap();
        let err = cipher.decrypt(&[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            PayloadCryptoError::Truncated {
                expected: PAYLOAD_NONCE_SIZE,
                actual: 3
            }
        );
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert_eq!(
            PayloadCipher::from_secret("").unwrap_err(),
            PayloadCryptoError::EmptySecret
        );
    }
}
