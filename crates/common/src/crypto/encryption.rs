//! AES-256-GCM cipher for OAuth token material.
//!
//! Tokens are persisted as opaque base64 strings so the connection store can
//! keep them in ordinary TEXT columns:
//!
//! - [`TokenCipher`]: AES-256-GCM encryption/decryption keyed by a
//!   process-wide 32-byte secret
//! - [`EncryptedPayload`]: serializable container (nonce + ciphertext)
//!
//! Decryption is authenticated: a payload produced under a different key, or
//! tampered with in storage, fails with [`CryptoError::DecryptionFailed`]
//! rather than yielding corrupted plaintext.
//!
//! ## Usage
//!
//! ```rust
//! use billbridge_common::crypto::TokenCipher;
//!
//! let key = TokenCipher::generate_key();
//! let cipher = TokenCipher::new(key)?;
//!
//! let stored = cipher.encrypt_str("refresh-token-value")?;
//! let recovered = cipher.decrypt_str(&stored)?;
//! assert_eq!(recovered, "refresh-token-value");
//! # Ok::<(), billbridge_common::crypto::CryptoError>(())
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const ALGORITHM: &str = "AES-256-GCM";

/// Errors raised by [`TokenCipher`].
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The configured key has the wrong length or shape.
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    /// Encryption failed (should not occur with a valid key).
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Authenticated decryption failed: wrong key or tampered payload.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The stored payload could not be decoded into an [`EncryptedPayload`].
    #[error("malformed encrypted payload: {0}")]
    MalformedPayload(String),
}

/// Serializable encrypted data container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub algorithm: String,
}

/// AES-256-GCM cipher keyed by a process-wide secret.
pub struct TokenCipher {
    key: Vec<u8>,
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").field("key", &"[REDACTED]").finish()
    }
}

impl TokenCipher {
    /// Create a cipher from a raw 32-byte key.
    pub fn new(key: Vec<u8>) -> Result<Self, CryptoError> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "key must be exactly {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CryptoError::InvalidKey(format!("failed to initialise cipher: {e}")))?;

        Ok(Self { key, cipher })
    }

    /// Create a cipher from a 64-character hex-encoded key.
    pub fn from_hex(hex_key: &str) -> Result<Self, CryptoError> {
        let key = hex::decode(hex_key.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("key is not valid hex: {e}")))?;
        Self::new(key)
    }

    /// Generate a random 32-byte symmetric key.
    #[must_use]
    pub fn generate_key() -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    /// Encrypt bytes into an [`EncryptedPayload`].
    pub fn encrypt(&self, data: &[u8]) -> Result<EncryptedPayload, CryptoError> {
        let nonce_bytes = Self::generate_nonce();
        let ciphertext = self
            .cipher
            .encrypt(&Nonce::from(nonce_bytes), data)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(EncryptedPayload {
            nonce: nonce_bytes.to_vec(),
            ciphertext,
            algorithm: ALGORITHM.to_string(),
        })
    }

    /// Decrypt an [`EncryptedPayload`] back into raw bytes.
    pub fn decrypt(&self, payload: &EncryptedPayload) -> Result<Vec<u8>, CryptoError> {
        if payload.algorithm != ALGORITHM {
            return Err(CryptoError::MalformedPayload(format!(
                "unsupported algorithm: {}",
                payload.algorithm
            )));
        }

        let nonce_array: [u8; NONCE_LEN] = payload.nonce.as_slice().try_into().map_err(|_| {
            CryptoError::MalformedPayload(format!(
                "nonce must be exactly {NONCE_LEN} bytes for {ALGORITHM}"
            ))
        })?;

        self.cipher
            .decrypt(&Nonce::from(nonce_array), payload.ciphertext.as_ref())
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }

    /// Encrypt a UTF-8 string and encode the payload as base64 for storage.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<String, CryptoError> {
        let payload = self.encrypt(plaintext.as_bytes())?;
        let serialized = serde_json::to_vec(&payload)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        Ok(BASE64.encode(serialized))
    }

    /// Decode a base64 storage string and decrypt the contained payload.
    pub fn decrypt_str(&self, stored: &str) -> Result<String, CryptoError> {
        let decoded = BASE64
            .decode(stored)
            .map_err(|e| CryptoError::MalformedPayload(format!("base64 decode failed: {e}")))?;
        let payload: EncryptedPayload = serde_json::from_slice(&decoded)
            .map_err(|e| CryptoError::MalformedPayload(e.to_string()))?;
        let plaintext = self.decrypt(&payload)?;
        String::from_utf8(plaintext)
            .map_err(|e| CryptoError::DecryptionFailed(format!("plaintext is not UTF-8: {e}")))
    }

    /// Short fingerprint of the current key for startup logging.
    #[must_use]
    pub fn key_fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(&self.key);
        let digest = hasher.finalize();
        BASE64.encode(&digest[..8])
    }

    fn generate_nonce() -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }
}
