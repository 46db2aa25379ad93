//! Session context: binds a workspace, a passphrase-acquisition capability,
//! and the derived master key.
//!
//! The context is the sole holder of the master key. `init()` establishes a
//! fresh workspace (or is a no-op on an existing one), `unlock()` derives and
//! verifies a candidate key for an existing workspace, and `end()` or drop
//! zeroizes the key.

use std::path::PathBuf;

use rand::RngCore;
use tracing::{debug, info, warn};

use crate::error::{Result, SafeholdError};
use crate::kdf::{self, MasterKey, SALT_LEN};
use crate::secure::SecureBuffer;
use crate::workspace::Workspace;

/// Capability for acquiring the master passphrase.
///
/// The engine never solicits passphrases itself; the host application
/// supplies this capability at context construction. `confirm = true` means
/// "ask twice and require equality" and is used only at first-time setup.
/// Provider failures (user cancellation, confirmation mismatch) surface as
/// `SafeholdError::Prompt` and are propagated unchanged.
pub trait PassphraseProvider {
    fn acquire(&self, confirm: bool) -> Result<SecureBuffer>;
}

/// A session binding a workspace to an unlocked (or not yet unlocked)
/// master key.
pub struct Context {
    root: PathBuf,
    workspace: Option<Workspace>,
    provider: Box<dyn PassphraseProvider>,
    master_key: Option<MasterKey>,
}

impl Context {
    /// Create a context for the workspace rooted at `root`.
    ///
    /// No filesystem access happens until `init()` or `unlock()`.
    pub fn new(root: impl Into<PathBuf>, provider: Box<dyn PassphraseProvider>) -> Self {
        Self {
            root: root.into(),
            workspace: None,
            provider,
            master_key: None,
        }
    }

    /// Initialize the workspace, prompting for the initial master passphrase
    /// on first use.
    ///
    /// Idempotent: if the workspace already exists this loads its
    /// configuration without prompting and without touching any file. On
    /// first initialization the passphrase is acquired with confirmation,
    /// the salt is generated, and the verifier is stored; the derived key is
    /// installed so the fresh session is already unlocked.
    pub fn init(&mut self) -> Result<()> {
        if self.workspace.is_some() {
            return Ok(());
        }

        if Workspace::exists(&self.root) {
            debug!("Workspace already initialized at {:?}", self.root);
            self.workspace = Some(Workspace::load(&self.root)?);
            return Ok(());
        }

        let passphrase = self.provider.acquire(true)?;

        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);

        let key = kdf::derive_key(passphrase.as_bytes(), &salt)?;
        let verifier = kdf::compute_verifier(&key);

        self.workspace = Some(Workspace::create(&self.root, salt, verifier)?);
        self.master_key = Some(key);

        info!("Workspace initialized at {:?}", self.root);
        Ok(())
    }

    /// Unlock the session by deriving and verifying the master key.
    ///
    /// On a wrong passphrase this fails with `Authentication` and leaves no
    /// key installed. Verification happens against the stored verifier, so a
    /// wrong passphrase is rejected uniformly without touching any safe.
    pub fn unlock(&mut self) -> Result<()> {
        self.ensure_workspace()?;

        let passphrase = self.provider.acquire(false)?;

        let workspace = self
            .workspace
            .as_ref()
            .ok_or_else(|| SafeholdError::Workspace("workspace is not initialized".into()))?;

        let key = kdf::derive_key(passphrase.as_bytes(), workspace.salt())?;

        if !kdf::verify_key(&key, workspace.verifier()) {
            warn!("Master passphrase verification failed");
            return Err(SafeholdError::Authentication);
        }

        self.master_key = Some(key);
        debug!("Session unlocked");
        Ok(())
    }

    /// Whether a master key is currently installed.
    pub fn is_unlocked(&self) -> bool {
        self.master_key.is_some()
    }

    /// End the session, zeroizing the master key.
    ///
    /// Dropping the context gives the same guarantee.
    pub fn end(&mut self) {
        // MasterKey implements ZeroizeOnDrop, so memory is securely erased
        self.master_key = None;
        debug!("Session ended");
    }

    /// The loaded workspace, if `init()` or `unlock()` has run.
    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    pub(crate) fn master_key(&self) -> Option<&MasterKey> {
        self.master_key.as_ref()
    }

    fn ensure_workspace(&mut self) -> Result<()> {
        if self.workspace.is_some() {
            return Ok(());
        }
        if !Workspace::exists(&self.root) {
            return Err(SafeholdError::Workspace(format!(
                "no workspace initialized at {:?}",
                self.root
            )));
        }
        self.workspace = Some(Workspace::load(&self.root)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::Path;
    use std::rc::Rc;

    struct StaticProvider {
        passphrase: Vec<u8>,
        prompts: Rc<Cell<usize>>,
    }

    impl StaticProvider {
        fn boxed(passphrase: &[u8], prompts: Rc<Cell<usize>>) -> Box<dyn PassphraseProvider> {
            Box::new(Self {
                passphrase: passphrase.to_vec(),
                prompts,
            })
        }
    }

    impl PassphraseProvider for StaticProvider {
        fn acquire(&self, _confirm: bool) -> Result<SecureBuffer> {
            self.prompts.set(self.prompts.get() + 1);
            Ok(SecureBuffer::from_slice(&self.passphrase))
        }
    }

    struct CancellingProvider;

    impl PassphraseProvider for CancellingProvider {
        fn acquire(&self, _confirm: bool) -> Result<SecureBuffer> {
            Err(SafeholdError::Prompt("cancelled by user".into()))
        }
    }

    fn context(root: &Path, passphrase: &[u8], prompts: Rc<Cell<usize>>) -> Context {
        Context::new(root, StaticProvider::boxed(passphrase, prompts))
    }

    #[test]
    fn test_init_creates_workspace_and_unlocks() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("workspace");
        let prompts = Rc::new(Cell::new(0));

        let mut ctx = context(&root, b"master passphrase", prompts.clone());
        ctx.init().unwrap();

        assert!(root.is_dir());
        assert!(ctx.is_unlocked());
        assert_eq!(prompts.get(), 1);
    }

    #[test]
    fn test_init_is_idempotent_and_does_not_reprompt() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("workspace");
        let prompts = Rc::new(Cell::new(0));

        let mut ctx = context(&root, b"master passphrase", prompts.clone());
        ctx.init().unwrap();
        let salt = *ctx.workspace().unwrap().salt();
        let verifier = *ctx.workspace().unwrap().verifier();

        // Same context
        ctx.init().unwrap();
        assert_eq!(prompts.get(), 1);

        // Fresh context over the same root
        let mut ctx2 = context(&root, b"master passphrase", prompts.clone());
        ctx2.init().unwrap();
        assert_eq!(prompts.get(), 1, "re-init must not prompt");
        assert_eq!(ctx2.workspace().unwrap().salt(), &salt);
        assert_eq!(ctx2.workspace().unwrap().verifier(), &verifier);
        assert!(!ctx2.is_unlocked(), "re-init does not install a key");
    }

    #[test]
    fn test_unlock_with_correct_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("workspace");
        let prompts = Rc::new(Cell::new(0));

        context(&root, b"master passphrase", prompts.clone())
            .init()
            .unwrap();

        let mut ctx = context(&root, b"master passphrase", prompts);
        ctx.unlock().unwrap();
        assert!(ctx.is_unlocked());
    }

    #[test]
    fn test_unlock_with_wrong_passphrase_installs_no_key() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("workspace");
        let prompts = Rc::new(Cell::new(0));

        context(&root, b"master passphrase", prompts.clone())
            .init()
            .unwrap();

        let mut ctx = context(&root, b"wrong passphrase", prompts);
        let err = ctx.unlock().unwrap_err();
        assert!(matches!(err, SafeholdError::Authentication));
        assert!(!ctx.is_unlocked());
    }

    #[test]
    fn test_unlock_without_workspace_fails() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("missing");
        let prompts = Rc::new(Cell::new(0));

        let mut ctx = context(&root, b"master passphrase", prompts.clone());
        let err = ctx.unlock().unwrap_err();
        assert!(matches!(err, SafeholdError::Workspace(_)));
        assert_eq!(prompts.get(), 0, "no prompt before the workspace check");
    }

    #[test]
    fn test_prompt_error_propagates_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("workspace");

        let mut ctx = Context::new(&root, Box::new(CancellingProvider));
        let err = ctx.init().unwrap_err();
        assert!(matches!(err, SafeholdError::Prompt(_)));
        assert!(!Workspace::exists(&root), "cancelled init writes nothing");
    }

    #[test]
    fn test_end_clears_master_key() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("workspace");
        let prompts = Rc::new(Cell::new(0));

        let mut ctx = context(&root, b"master passphrase", prompts);
        ctx.init().unwrap();
        assert!(ctx.is_unlocked());

        ctx.end();
        assert!(!ctx.is_unlocked());
    }
}
