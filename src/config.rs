//! Global configuration constants.
//!
//! Cryptographic parameters, the container format identifiers, and the
//! processing limits used throughout batchseal.

/// Application name used in user-facing output.
pub const APP_NAME: &str = "batchseal";

/// Extension appended to encrypted output files.
pub const FILE_EXTENSION: &str = ".enc";

/// Extension appended when decrypting a file that does not carry
/// [`FILE_EXTENSION`], so the source is never clobbered.
pub const DECRYPTED_EXTENSION: &str = ".dec";

// === Container format ===

/// Magic bytes identifying a batchseal container.
pub const MAGIC_BYTES: [u8; 4] = *b"BSL1";

/// Current container format version.
///
/// Bumped whenever the header layout or chunk framing changes; decryption
/// rejects any other value before touching ciphertext.
pub const CURRENT_VERSION: u16 = 0x0001;

/// Total serialized header length in bytes (fixed layout).
pub const HEADER_LEN: usize = 76;

/// Length of the salt stored in the header.
pub const SALT_LEN: usize = 32;

/// Length of the nonce field in the header.
///
/// Sized for the largest supported nonce (XChaCha20's 24 bytes); shorter
/// nonces are zero-padded on disk.
pub const NONCE_FIELD_LEN: usize = 24;

/// Trailing bytes of each nonce reserved for the chunk counter.
pub const NONCE_COUNTER_LEN: usize = 8;

/// AEAD authentication tag length (both supported cipher families).
pub const TAG_LEN: usize = 16;

// === Processing ===

/// Maximum plaintext bytes processed per chunk.
///
/// Bounds peak memory regardless of file size and sets the granularity of
/// pause/abort/stop responsiveness.
pub const CHUNK_SIZE: usize = 256 * 1024;

/// Upper bound on a framed chunk read back from disk.
///
/// Covers the worst case of an incompressible chunk plus zstd framing and
/// the authentication tag; anything larger is a corrupt container.
pub const MAX_FRAME_LEN: usize = CHUNK_SIZE + CHUNK_SIZE / 128 + 512;

/// Zstd compression level for chunk compression.
pub const ZSTD_LEVEL: i32 = 3;

/// Capacity of the broadcast event channel.
///
/// A consumer that falls further behind than this lags and skips events;
/// the worker never waits on it.
pub const EVENT_CAPACITY: usize = 1024;

// === Argon2id defaults and bounds ===
// Bounds are enforced both on request validation and on headers read back
// from disk, so a hostile header cannot demand unbounded derivation work.

/// Default Argon2id memory cost in KiB (64 MiB).
pub const ARGON_MEMORY: u32 = 64 * 1024;

/// Default Argon2id time cost (iterations).
pub const ARGON_TIME: u32 = 3;

/// Default Argon2id parallelism (lanes).
pub const ARGON_THREADS: u32 = 4;

/// Minimum accepted Argon2id memory cost in KiB (8 MiB).
pub const ARGON_MEMORY_MIN: u32 = 8 * 1024;

/// Maximum accepted Argon2id memory cost in KiB (1 GiB).
pub const ARGON_MEMORY_MAX: u32 = 1024 * 1024;

/// Maximum accepted Argon2id time cost.
pub const ARGON_TIME_MAX: u32 = 16;

/// Maximum accepted Argon2id parallelism.
pub const ARGON_THREADS_MAX: u32 = 16;

// === Algorithm identifiers (container header) ===

/// Header id for the AES family.
pub const ALGORITHM_AES: u8 = 0x01;

/// Header id for the XChaCha20 family.
pub const ALGORITHM_XCHACHA20: u8 = 0x02;

/// Header id for Galois/Counter Mode.
pub const MODE_GCM: u8 = 0x01;

/// Header id for Poly1305.
pub const MODE_POLY1305: u8 = 0x02;
