//! Payload sealing with ChaCha20-Poly1305.
//!
//! Audit entries carry the raw command a human approved or denied. That
//! command can contain secrets (tokens in shell invocations, internal
//! paths), so it is sealed at rest: a fresh random nonce per seal, output
//! layout `nonce (12 bytes) || ciphertext || auth tag`.

use crate::{CryptoError, ForemanResult};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};

/// Nonce length prepended to every sealed payload.
pub const NONCE_LEN: usize = 12;

/// 256-bit sealing key.
///
/// The raw key never appears in `Debug` output and is zeroed on drop.
#[derive(Clone)]
pub struct SealingKey {
    key: [u8; 32],
}

impl SealingKey {
    /// Create a key from exactly 32 raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] for any other length.
    pub fn from_bytes(bytes: &[u8]) -> ForemanResult<Self> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength { len: bytes.len() }.into());
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Generate a random key.
    pub fn generate() -> Self {
        let key = ChaCha20Poly1305::generate_key(&mut OsRng);
        Self { key: key.into() }
    }
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl Drop for SealingKey {
    fn drop(&mut self) {
        self.key.fill(0);
    }
}

/// Seal a plaintext. Returns `nonce || ciphertext`.
///
/// Two seals of the same plaintext with the same key produce different
/// outputs because the nonce is random per call.
pub fn seal(key: &SealingKey, plaintext: &[u8]) -> ForemanResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new((&key.key).into());
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::SealFailed {
            reason: e.to_string(),
        })?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a sealed payload produced by [`seal`].
///
/// # Errors
///
/// - [`CryptoError::CiphertextTooShort`] when the input cannot even hold
///   the nonce
/// - [`CryptoError::OpenFailed`] when the key is wrong or the payload was
///   tampered with
pub fn open_sealed(key: &SealingKey, sealed: &[u8]) -> ForemanResult<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(CryptoError::CiphertextTooShort {
            len: sealed.len(),
            min: NONCE_LEN,
        }
        .into());
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = ChaCha20Poly1305::new((&key.key).into());
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| {
            CryptoError::OpenFailed {
                reason: e.to_string(),
            }
            .into()
        })
}

// =============================================================================
// TESTS
// =============================================================================
