use thiserror::Error;

/// Errors surfaced by the safe engine.
///
/// Decryption failures intentionally carry no detail: a tag mismatch caused
/// by a wrong master key is indistinguishable from one caused by a corrupted
/// file, and keeping it that way avoids turning the error into an oracle.
#[derive(Error, Debug)]
pub enum SafeholdError {
    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("authentication failed")]
    Authentication,

    #[error("safe not found: {0}")]
    NotFound(String),

    #[error("decryption failed")]
    Decryption,

    #[error("invalid state: {0}")]
    State(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("prompt error: {0}")]
    Prompt(String),
}

pub type Result<T> = std::result::Result<T, SafeholdError>;
