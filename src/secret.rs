//! Secret material wrappers.
//!
//! The passphrase and every derived key live behind `secrecy` boxes so they
//! are zeroized on drop and redacted from any debug output.

use secrecy::{ExposeSecret, SecretBox};

/// A batch passphrase, held as opaque secret bytes.
pub struct Passphrase {
    inner: SecretBox<Vec<u8>>,
}

impl Passphrase {
    pub fn new(passphrase: &str) -> Self {
        Self::from_bytes(passphrase.as_bytes().to_vec())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { inner: SecretBox::new(Box::new(bytes)) }
    }

    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.expose_secret().is_empty()
    }
}

impl std::fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Passphrase([redacted])")
    }
}

/// A symmetric key produced by key derivation, consumed by the cipher unit
/// and never persisted.
pub struct DerivedKey {
    inner: SecretBox<Vec<u8>>,
}

impl DerivedKey {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { inner: SecretBox::new(Box::new(bytes)) }
    }

    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DerivedKey([... {} bytes ...])", self.inner.expose_secret().len())
    }
}
