//! Local, single-user encrypted secret-storage engine.
//!
//! Safehold stores named safes, each holding a password and free-form
//! metadata, in a per-user on-disk workspace. Everything is protected by one
//! master passphrase, transformed via Argon2id into an AES-256-GCM key.
//!
//! The engine is deliberately small and synchronous. It consumes a
//! [`PassphraseProvider`] capability (the host decides how passphrases are
//! solicited) and exposes the safe lifecycle:
//!
//! ```no_run
//! use safehold::{Context, PassphraseProvider, Result, Safe, SecureBuffer};
//!
//! struct Stdin;
//! impl PassphraseProvider for Stdin {
//!     fn acquire(&self, _confirm: bool) -> Result<SecureBuffer> {
//!         // read from the terminal, a pinentry, an agent...
//!         Ok(SecureBuffer::from_slice(b"master passphrase"))
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let mut ctx = Context::new("/home/user/.safehold", Box::new(Stdin));
//!     ctx.init()?;
//!
//!     let mut safe = Safe::new(&ctx, "mail")?;
//!     safe.open(true)?;
//!     safe.set_password(b"hunter2")?;
//!     safe.save()?;
//!     safe.close();
//!     Ok(())
//! }
//! ```
//!
//! Plaintext lives only in [`SecureBuffer`]s, which are zeroed on close, on
//! error, and on drop. Safe files are written atomically (temp file, fsync,
//! rename), so a crash never leaves a half-written safe.

pub mod context;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod safe;
pub mod secure;
pub mod workspace;

pub use context::{Context, PassphraseProvider};
pub use error::{Result, SafeholdError};
pub use kdf::MasterKey;
pub use safe::{Safe, SafeState};
pub use secure::SecureBuffer;
pub use workspace::Workspace;
