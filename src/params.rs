//! Cipher parameter selection and validation.
//!
//! A batch request names an algorithm, key size, mode, and compression
//! choice. Only a closed set of combinations is supported; everything is
//! validated here before any file is touched, and the same types are
//! reconstructed from a container header on the decrypt path.

use clap::ValueEnum;
use strum::Display;

use crate::config::{
    ALGORITHM_AES, ALGORITHM_XCHACHA20, ARGON_MEMORY, ARGON_MEMORY_MAX, ARGON_MEMORY_MIN, ARGON_THREADS, ARGON_THREADS_MAX, ARGON_TIME, ARGON_TIME_MAX, MODE_GCM, MODE_POLY1305,
};
use crate::error::{CipherError, Result};

/// Cipher family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, ValueEnum)]
pub enum Algorithm {
    /// AES block cipher (128- or 256-bit key).
    #[strum(serialize = "AES")]
    #[value(name = "aes")]
    Aes,

    /// XChaCha20 stream cipher (256-bit key).
    #[strum(serialize = "XChaCha20")]
    #[value(name = "xchacha20")]
    XChaCha20,
}

/// Mode of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, ValueEnum)]
pub enum Mode {
    /// Galois/Counter Mode (AES only).
    #[strum(serialize = "GCM")]
    #[value(name = "gcm")]
    Gcm,

    /// Poly1305 authenticator (XChaCha20 only).
    #[strum(serialize = "Poly1305")]
    #[value(name = "poly1305")]
    Poly1305,
}

/// Argon2id cost parameters.
///
/// Recorded in the container header at encrypt time so decryption can
/// reproduce the key; bounded in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfCost {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Time cost (iterations).
    pub time: u32,
    /// Parallelism (lanes).
    pub parallelism: u32,
}

impl Default for KdfCost {
    fn default() -> Self {
        Self { memory_kib: ARGON_MEMORY, time: ARGON_TIME, parallelism: ARGON_THREADS }
    }
}

impl KdfCost {
    /// Checks the cost triple against the accepted bounds.
    pub fn validate(&self) -> Result<()> {
        if !(ARGON_MEMORY_MIN..=ARGON_MEMORY_MAX).contains(&self.memory_kib) {
            return Err(CipherError::KeyDerivation(format!("memory cost {} KiB out of range", self.memory_kib)));
        }
        if self.time == 0 || self.time > ARGON_TIME_MAX {
            return Err(CipherError::KeyDerivation(format!("time cost {} out of range", self.time)));
        }
        if self.parallelism == 0 || self.parallelism > ARGON_THREADS_MAX {
            return Err(CipherError::KeyDerivation(format!("parallelism {} out of range", self.parallelism)));
        }
        Ok(())
    }
}

/// Full parameter set for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherParameters {
    pub algorithm: Algorithm,
    /// Key size in bits.
    pub key_size: u32,
    pub mode: Mode,
    /// Compress plaintext chunks before sealing.
    pub compress: bool,
    pub kdf: KdfCost,
}

impl Default for CipherParameters {
    /// The defaults handed to callers that do not override them (the
    /// settings surface of the engine).
    fn default() -> Self {
        Self { algorithm: Algorithm::Aes, key_size: 256, mode: Mode::Gcm, compress: false, kdf: KdfCost::default() }
    }
}

impl CipherParameters {
    /// Resolves the algorithm/key-size/mode triple against the supported
    /// set, rejecting everything else.
    pub fn suite(&self) -> Result<CipherSuite> {
        match (self.algorithm, self.key_size, self.mode) {
            (Algorithm::Aes, 128, Mode::Gcm) => Ok(CipherSuite::Aes128Gcm),
            (Algorithm::Aes, 256, Mode::Gcm) => Ok(CipherSuite::Aes256Gcm),
            (Algorithm::XChaCha20, 256, Mode::Poly1305) => Ok(CipherSuite::XChaCha20Poly1305),
            (algorithm, key_size, mode) => Err(CipherError::InvalidParameters(format!("unsupported combination: {algorithm}-{key_size}-{mode}"))),
        }
    }

    /// Validates the whole parameter set: suite membership and KDF bounds.
    pub fn validate(&self) -> Result<()> {
        self.suite()?;
        self.kdf.validate()
    }
}

/// One of the supported cipher suites, resolved from [`CipherParameters`]
/// or from a container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CipherSuite {
    #[strum(serialize = "AES-128-GCM")]
    Aes128Gcm,
    #[strum(serialize = "AES-256-GCM")]
    Aes256Gcm,
    #[strum(serialize = "XChaCha20-Poly1305")]
    XChaCha20Poly1305,
}

impl CipherSuite {
    /// Key length in bytes.
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128Gcm => 16,
            Self::Aes256Gcm | Self::XChaCha20Poly1305 => 32,
        }
    }

    /// Nonce length in bytes (12 for GCM, 24 for XChaCha20).
    pub const fn nonce_len(self) -> usize {
        match self {
            Self::Aes128Gcm | Self::Aes256Gcm => 12,
            Self::XChaCha20Poly1305 => 24,
        }
    }

    /// Header algorithm id.
    pub const fn algorithm_id(self) -> u8 {
        match self {
            Self::Aes128Gcm | Self::Aes256Gcm => ALGORITHM_AES,
            Self::XChaCha20Poly1305 => ALGORITHM_XCHACHA20,
        }
    }

    /// Header mode id.
    pub const fn mode_id(self) -> u8 {
        match self {
            Self::Aes128Gcm | Self::Aes256Gcm => MODE_GCM,
            Self::XChaCha20Poly1305 => MODE_POLY1305,
        }
    }

    /// The parameter triple this suite corresponds to.
    pub const fn components(self) -> (Algorithm, u32, Mode) {
        match self {
            Self::Aes128Gcm => (Algorithm::Aes, 128, Mode::Gcm),
            Self::Aes256Gcm => (Algorithm::Aes, 256, Mode::Gcm),
            Self::XChaCha20Poly1305 => (Algorithm::XChaCha20, 256, Mode::Poly1305),
        }
    }

    /// Reconstructs a suite from header ids (key size in bytes).
    pub fn from_ids(algorithm: u8, key_bytes: u8, mode: u8) -> Result<Self> {
        match (algorithm, key_bytes, mode) {
            (ALGORITHM_AES, 16, MODE_GCM) => Ok(Self::Aes128Gcm),
            (ALGORITHM_AES, 32, MODE_GCM) => Ok(Self::Aes256Gcm),
            (ALGORITHM_XCHACHA20, 32, MODE_POLY1305) => Ok(Self::XChaCha20Poly1305),
            _ => Err(CipherError::Unsupported(format!("algorithm {algorithm:#04x} / key {key_bytes} bytes / mode {mode:#04x}"))),
        }
    }
}

/// Direction of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    /// Progress label for status events.
    #[inline]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Encrypt => "Encrypting",
            Self::Decrypt => "Decrypting",
        }
    }
}

impl std::fmt::Display for Direction {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_are_supported() {
        let params = CipherParameters::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.suite().unwrap(), CipherSuite::Aes256Gcm);
    }

    #[test]
    fn supported_set_is_closed() {
        let mut params = CipherParameters::default();

        params.key_size = 192;
        assert!(matches!(params.suite(), Err(CipherError::InvalidParameters(_))));

        params.key_size = 128;
        params.algorithm = Algorithm::XChaCha20;
        params.mode = Mode::Poly1305;
        assert!(matches!(params.suite(), Err(CipherError::InvalidParameters(_))));

        params.algorithm = Algorithm::Aes;
        params.mode = Mode::Poly1305;
        assert!(matches!(params.suite(), Err(CipherError::InvalidParameters(_))));
    }

    #[test]
    fn kdf_bounds_enforced() {
        let mut params = CipherParameters::default();
        params.kdf.memory_kib = 1024;
        assert!(matches!(params.validate(), Err(CipherError::KeyDerivation(_))));

        params.kdf = KdfCost { memory_kib: ARGON_MEMORY_MIN, time: 0, parallelism: 1 };
        assert!(matches!(params.validate(), Err(CipherError::KeyDerivation(_))));
    }

    #[test]
    fn suite_ids_round_trip() {
        for suite in [CipherSuite::Aes128Gcm, CipherSuite::Aes256Gcm, CipherSuite::XChaCha20Poly1305] {
            let rebuilt = CipherSuite::from_ids(suite.algorithm_id(), u8::try_from(suite.key_len()).unwrap(), suite.mode_id()).unwrap();
            assert_eq!(rebuilt, suite);
        }

        assert!(matches!(CipherSuite::from_ids(0x7f, 32, MODE_GCM), Err(CipherError::Unsupported(_))));
    }
}
