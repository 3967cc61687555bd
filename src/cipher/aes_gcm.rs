use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};

use crate::error::{CipherError, Result};

/// AES-128-GCM chunk sealer.
pub struct Aes128 {
    inner: Aes128Gcm,
}

impl Aes128 {
    #[inline]
    pub fn new(key: &[u8]) -> Result<Self> {
        let inner = Aes128Gcm::new_from_slice(key).map_err(|_| CipherError::KeyDerivation("bad AES-128 key length".into()))?;
        Ok(Self { inner })
    }

    #[inline]
    pub fn seal(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.inner.encrypt(Nonce::from_slice(nonce), plaintext).map_err(|_| CipherError::Io(std::io::Error::other("aes-gcm encryption failed")))
    }

    #[inline]
    pub fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.inner.decrypt(Nonce::from_slice(nonce), ciphertext).map_err(|_| CipherError::Authentication)
    }
}

/// AES-256-GCM chunk sealer.
pub struct Aes256 {
    inner: Aes256Gcm,
}

impl Aes256 {
    #[inline]
    pub fn new(key: &[u8]) -> Result<Self> {
        let inner = Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::KeyDerivation("bad AES-256 key length".into()))?;
        Ok(Self { inner })
    }

    #[inline]
    pub fn seal(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.inner.encrypt(Nonce::from_slice(nonce), plaintext).map_err(|_| CipherError::Io(std::io::Error::other("aes-gcm encryption failed")))
    }

    #[inline]
    pub fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.inner.decrypt(Nonce::from_slice(nonce), ciphertext).map_err(|_| CipherError::Authentication)
    }
}
