//! Safe lifecycle: a named encrypted record with an explicit Closed/Open
//! state machine.
//!
//! A safe holds a password and free-form metadata. Plaintext exists in
//! memory only while the safe is Open; `close()` (and drop) zeroizes both
//! buffers. `save()` persists via the atomic temp-file-then-rename sequence,
//! so a crash mid-write never leaves a half-written safe.
//!
//! The sealed payload frames the two fields as
//! `password_len: u32 LE || password || metadata`, which lets arbitrary
//! byte strings round-trip exactly.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::context::Context;
use crate::envelope;
use crate::error::{Result, SafeholdError};
use crate::secure::SecureBuffer;
use crate::workspace::write_file_atomic;

/// Length of the payload framing header
const PAYLOAD_HEADER_LEN: usize = 4;

/// State of a safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafeState {
    /// No plaintext in memory; the buffers are zeroed.
    Closed,
    /// Buffers hold the decrypted payload (or fresh-empty content for a
    /// newly created safe).
    Open,
}

/// A named encrypted record in a workspace.
pub struct Safe<'ctx> {
    ctx: &'ctx Context,
    name: String,
    path: PathBuf,
    state: SafeState,
    password: SecureBuffer,
    metadata: SecureBuffer,
}

impl std::fmt::Debug for Safe<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // SecureBuffer's Debug impl redacts the contents
        f.debug_struct("Safe")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("state", &self.state)
            .field("password", &self.password)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl<'ctx> Safe<'ctx> {
    /// Create a handle for the safe named `name`.
    ///
    /// The context's workspace must be initialized. Nothing is read from
    /// disk until `open()`.
    pub fn new(ctx: &'ctx Context, name: &str) -> Result<Self> {
        validate_name(name)?;

        let workspace = ctx
            .workspace()
            .ok_or_else(|| SafeholdError::Workspace("workspace is not initialized".into()))?;

        Ok(Self {
            ctx,
            name: name.to_string(),
            path: workspace.safe_path(name),
            state: SafeState::Closed,
            password: SecureBuffer::new(),
            metadata: SecureBuffer::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SafeState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SafeState::Open
    }

    /// Open the safe, decrypting its file into memory.
    ///
    /// With `create = true` a missing file yields a fresh empty safe (not
    /// yet persisted); with `create = false` it fails with `NotFound`.
    /// Opening an already-open safe is a `State` error. A tag mismatch
    /// (wrong master key or corrupted file) fails with `Decryption` and
    /// leaves the safe Closed with empty buffers.
    pub fn open(&mut self, create: bool) -> Result<()> {
        if self.state == SafeState::Open {
            return Err(SafeholdError::State(format!(
                "safe '{}' is already open",
                self.name
            )));
        }

        let key = self
            .ctx
            .master_key()
            .ok_or(SafeholdError::Authentication)?;

        if !self.path.exists() {
            if !create {
                return Err(SafeholdError::NotFound(self.name.clone()));
            }
            self.password.clear();
            self.metadata.clear();
            self.state = SafeState::Open;
            debug!("Created new safe '{}'", self.name);
            return Ok(());
        }

        let blob = fs::read(&self.path)?;
        let payload = envelope::open(key, &blob)?;
        let (password, metadata) = decode_payload(&payload)?;

        self.password = password;
        self.metadata = metadata;
        self.state = SafeState::Open;
        debug!("Opened safe '{}'", self.name);
        Ok(())
    }

    /// The password, or `None` while Closed.
    pub fn password(&self) -> Option<&[u8]> {
        match self.state {
            SafeState::Open => Some(self.password.as_bytes()),
            SafeState::Closed => None,
        }
    }

    /// The metadata, or `None` while Closed.
    pub fn metadata(&self) -> Option<&[u8]> {
        match self.state {
            SafeState::Open => Some(self.metadata.as_bytes()),
            SafeState::Closed => None,
        }
    }

    /// Set the password. Fails with a `State` error while Closed.
    pub fn set_password(&mut self, value: &[u8]) -> Result<()> {
        self.require_open("set password")?;
        self.password.set(value);
        Ok(())
    }

    /// Set the metadata. Fails with a `State` error while Closed.
    pub fn set_metadata(&mut self, value: &[u8]) -> Result<()> {
        self.require_open("set metadata")?;
        self.metadata.set(value);
        Ok(())
    }

    /// Encrypt the current contents under a fresh nonce and persist them
    /// atomically.
    ///
    /// On failure the previous on-disk version is left untouched.
    pub fn save(&self) -> Result<()> {
        self.require_open("save")?;

        let key = self
            .ctx
            .master_key()
            .ok_or(SafeholdError::Authentication)?;

        // The frame header is a u32
        if self.password.len() > u32::MAX as usize {
            return Err(SafeholdError::State(format!(
                "password in safe '{}' exceeds the storable size",
                self.name
            )));
        }

        let payload = encode_payload(self.password.as_bytes(), self.metadata.as_bytes());
        let blob = envelope::seal(key, &payload)?;

        write_file_atomic(&self.path, &blob)?;
        info!("Saved safe '{}'", self.name);
        Ok(())
    }

    /// Zero both buffers and return to Closed. Idempotent.
    ///
    /// Unsaved edits are lost; callers must `save()` first to persist them.
    pub fn close(&mut self) {
        self.password.clear();
        self.metadata.clear();
        self.state = SafeState::Closed;
        debug!("Closed safe '{}'", self.name);
    }

    /// Remove the safe's file from the workspace.
    ///
    /// Valid only while Closed; fails with `NotFound` if nothing was ever
    /// persisted under this name.
    pub fn delete(self) -> Result<()> {
        if self.state == SafeState::Open {
            return Err(SafeholdError::State(format!(
                "cannot delete safe '{}' while open",
                self.name
            )));
        }
        if !self.path.exists() {
            return Err(SafeholdError::NotFound(self.name.clone()));
        }
        fs::remove_file(&self.path)?;
        info!("Deleted safe '{}'", self.name);
        Ok(())
    }

    fn require_open(&self, operation: &str) -> Result<()> {
        if self.state == SafeState::Closed {
            return Err(SafeholdError::State(format!(
                "cannot {} on closed safe '{}'",
                operation, self.name
            )));
        }
        Ok(())
    }
}

// SecureBuffer zeroizes on drop, so dropping an Open safe without close()
// still meets the zeroing contract.

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(SafeholdError::State(format!(
            "invalid safe name '{}'",
            name
        )));
    }
    Ok(())
}

fn encode_payload(password: &[u8], metadata: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut payload = Vec::with_capacity(PAYLOAD_HEADER_LEN + password.len() + metadata.len());
    payload.extend_from_slice(&(password.len() as u32).to_le_bytes());
    payload.extend_from_slice(password);
    payload.extend_from_slice(metadata);
    Zeroizing::new(payload)
}

fn decode_payload(payload: &[u8]) -> Result<(SecureBuffer, SecureBuffer)> {
    if payload.len() < PAYLOAD_HEADER_LEN {
        return Err(SafeholdError::Decryption);
    }

    let (header, rest) = payload.split_at(PAYLOAD_HEADER_LEN);
    let mut len_bytes = [0u8; PAYLOAD_HEADER_LEN];
    len_bytes.copy_from_slice(header);
    let password_len = u32::from_le_bytes(len_bytes) as usize;

    if password_len > rest.len() {
        return Err(SafeholdError::Decryption);
    }

    let (password, metadata) = rest.split_at(password_len);
    Ok((
        SecureBuffer::from_slice(password),
        SecureBuffer::from_slice(metadata),
    ))
}
