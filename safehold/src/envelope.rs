//! Authenticated encryption envelope for safe files.
//!
//! On-disk format: `[12-byte nonce][ciphertext with 16-byte auth tag]`.
//! The nonce is generated fresh on every seal and is never derived from the
//! payload, so it cannot repeat for a given key in practice. This layout is
//! stable; changing it would break existing safe files.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{Result, SafeholdError};
use crate::kdf::MasterKey;

/// Nonce size for AES-GCM (96 bits = 12 bytes)
pub const NONCE_LEN: usize = 12;
/// Authentication tag size for AES-GCM (128 bits = 16 bytes)
pub const TAG_LEN: usize = 16;

/// Encrypt a payload under the master key.
///
/// Returns the full envelope, nonce prepended to the ciphertext.
pub fn seal(key: &MasterKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| SafeholdError::Encryption(format!("Invalid key: {}", e)))?;

    // Generate random nonce
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| SafeholdError::Encryption(format!("Encryption failed: {}", e)))?;

    // Prepend nonce to ciphertext
    let mut envelope = nonce_bytes.to_vec();
    envelope.extend(ciphertext);
    Ok(envelope)
}

/// Decrypt an envelope under the master key.
///
/// Fails with `Decryption` on tag mismatch, truncation, or corruption.
/// A wrong key and a corrupted file are deliberately indistinguishable.
pub fn open(key: &MasterKey, envelope: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if envelope.len() < NONCE_LEN + TAG_LEN {
        return Err(SafeholdError::Decryption);
    }

    let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| SafeholdError::Encryption(format!("Invalid key: {}", e)))?;

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| SafeholdError::Decryption)?;

    Ok(Zeroizing::new(plaintext))
}
