//! Zeroed-on-every-exit byte buffer for plaintext secrets.
//!
//! `SecureBuffer` holds decrypted safe contents and passphrase bytes. Its
//! storage is overwritten with zeros on `clear()` and on drop, so plaintext
//! never outlives the scope that needed it, even when an operation fails
//! partway through.

use zeroize::Zeroize;

/// A byte buffer that zeroes its contents on clear and on drop.
///
/// Reads after `clear()` return an empty slice, never stale data.
#[derive(Default)]
pub struct SecureBuffer {
    bytes: Vec<u8>,
}

impl SecureBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Create a buffer holding a copy of `data`.
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            bytes: data.to_vec(),
        }
    }

    /// Replace the contents, zeroing the previous bytes first.
    pub fn set(&mut self, data: &[u8]) {
        self.bytes.zeroize();
        self.bytes.extend_from_slice(data);
    }

    /// Borrow the current contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Overwrite every byte with zero and release the contents.
    pub fn clear(&mut self) {
        // Vec::zeroize wipes the live bytes before truncating to empty.
        self.bytes.zeroize();
    }
}

impl Drop for SecureBuffer {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecureBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log buffer contents
        f.debug_struct("SecureBuffer")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
