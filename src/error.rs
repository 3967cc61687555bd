//! Engine error taxonomy.
//!
//! Every failure the batch engine can surface is one of these variants, so
//! observers and tests can match on the kind of failure rather than parse
//! message strings. The CLI layer wraps these in `anyhow` for display.

/// Errors produced by the cipher-batch engine.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    /// A batch is already running or paused; `start` is rejected, not queued.
    #[error("a batch is already running")]
    AlreadyBusy,

    /// Rejected before any work began: unsupported parameter combination,
    /// empty passphrase, or an invalid file list.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The input is not a batchseal container, or the container is corrupt
    /// at the framing level. Raised before any key material is derived.
    #[error("unrecognized container: {0}")]
    Format(String),

    /// The container names an algorithm, mode, key size, or derivation cost
    /// this build does not support. Raised before any key material is derived.
    #[error("unsupported container parameters: {0}")]
    Unsupported(String),

    /// A chunk failed tag verification. Wrong passphrase and tampering are
    /// deliberately not distinguished.
    #[error("authentication failed: wrong passphrase or tampered data")]
    Authentication,

    /// Underlying read/write/permission failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Key derivation misconfiguration (cost out of bounds, bad output
    /// length). Never raised for any passphrase content.
    #[error("key derivation misconfigured: {0}")]
    KeyDerivation(String),
}

/// Engine-side result alias.
pub type Result<T, E = CipherError> = std::result::Result<T, E>;
