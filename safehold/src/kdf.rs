//! Master key derivation and passphrase verification.
//!
//! The master key is derived from the user's passphrase via Argon2id with a
//! workspace-specific salt. The workspace also stores a verifier, a SHA-256
//! digest of the key under a fixed domain prefix, so that unlock can reject a
//! wrong passphrase fast and uniformly without attempting any safe
//! decryption.

use argon2::{Algorithm, Argon2, Params, Version};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SafeholdError};

/// Salt size in bytes (128 bits)
pub const SALT_LEN: usize = 16;
/// Key size in bytes (256-bit key for AES-256)
pub const KEY_LEN: usize = 32;
/// Verifier size in bytes (SHA-256 digest)
pub const VERIFIER_LEN: usize = 32;

/// Argon2id parameters for key derivation.
/// These are chosen to balance security and usability:
/// - Memory: 64 MB (provides strong resistance to GPU attacks)
/// - Time: 3 iterations (reasonable delay on modern hardware)
/// - Parallelism: 4 lanes (utilizes multi-core CPUs)
const ARGON2_MEMORY_COST: u32 = 65536; // 64 MB in KiB
const ARGON2_TIME_COST: u32 = 3;
const ARGON2_PARALLELISM: u32 = 4;

/// Domain prefix keeping the verifier digest distinct from any other use of
/// the master key bytes.
const VERIFIER_DOMAIN: &[u8] = b"safehold-verifier-v1";

/// A 256-bit master key with automatic zeroization on drop.
///
/// This wrapper ensures that the key material is securely erased from memory
/// when the session ends or the holding context is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LEN],
}

impl MasterKey {
    /// Create a new MasterKey from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { key: bytes }
    }

    /// Get the key as a byte slice for cryptographic operations.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the actual key material
        f.debug_struct("MasterKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive a master key from a passphrase using Argon2id.
///
/// The derivation is deterministic for a given (passphrase, salt) pair and
/// intentionally slow to resist brute-force attacks.
pub fn derive_key(passphrase: &[u8], salt: &[u8; SALT_LEN]) -> Result<MasterKey> {
    let params = Params::new(
        ARGON2_MEMORY_COST,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM,
        Some(KEY_LEN),
    )
    .map_err(|e| SafeholdError::Encryption(format!("Invalid Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key_bytes = [0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase, salt, &mut key_bytes)
        .map_err(|e| SafeholdError::Encryption(format!("Key derivation failed: {}", e)))?;

    debug!("Derived {}-byte master key from passphrase", key_bytes.len());
    let key = MasterKey::from_bytes(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}

/// Compute the stored verifier for a master key.
pub fn compute_verifier(key: &MasterKey) -> [u8; VERIFIER_LEN] {
    let digest = Sha256::new()
        .chain_update(VERIFIER_DOMAIN)
        .chain_update(key.as_bytes())
        .finalize();
    digest.into()
}

/// Check a candidate key against the workspace's stored verifier.
///
/// Comparison is constant-time with respect to the verifier contents.
pub fn verify_key(key: &MasterKey, stored: &[u8; VERIFIER_LEN]) -> bool {
    let expected = compute_verifier(key);
    expected.as_slice().ct_eq(stored.as_slice()).into()
}
