use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};

use crate::error::{CipherError, Result};

/// XChaCha20-Poly1305 chunk sealer.
///
/// The 192-bit nonce leaves plenty of room for the random per-file prefix
/// next to the 64-bit chunk counter.
pub struct XChaCha {
    inner: XChaCha20Poly1305,
}

impl XChaCha {
    #[inline]
    pub fn new(key: &[u8]) -> Result<Self> {
        let inner = XChaCha20Poly1305::new_from_slice(key).map_err(|_| CipherError::KeyDerivation("bad XChaCha20 key length".into()))?;
        Ok(Self { inner })
    }

    #[inline]
    pub fn seal(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.inner.encrypt(XNonce::from_slice(nonce), plaintext).map_err(|_| CipherError::Io(std::io::Error::other("xchacha20-poly1305 encryption failed")))
    }

    #[inline]
    pub fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.inner.decrypt(XNonce::from_slice(nonce), ciphertext).map_err(|_| CipherError::Authentication)
    }
}
