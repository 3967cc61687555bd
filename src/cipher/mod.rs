//! Authenticated chunk encryption.
//!
//! One [`ChunkCipher`] is built per file from the derived key and the
//! file's base nonce, then seals or opens chunks by index. The per-chunk
//! nonce is the file's random prefix followed by the 64-bit big-endian
//! chunk counter, so no (key, nonce) pair ever repeats within a file, and
//! the per-file salt guarantees distinct keys across files.

use crate::config::{NONCE_COUNTER_LEN, NONCE_FIELD_LEN, TAG_LEN};
use crate::error::{CipherError, Result};
use crate::params::CipherSuite;
use crate::secret::DerivedKey;

mod aes_gcm;
mod xchacha;

pub use aes_gcm::{Aes128, Aes256};
pub use xchacha::XChaCha;

enum Inner {
    Aes128(Aes128),
    Aes256(Aes256),
    XChaCha(XChaCha),
}

/// Suite-dispatched chunk sealer for one file stream.
pub struct ChunkCipher {
    suite: CipherSuite,
    inner: Inner,
    base_nonce: [u8; NONCE_FIELD_LEN],
}

impl ChunkCipher {
    /// Builds a cipher for `suite` from the derived key and the file's
    /// base nonce (the meaningful prefix from the container header).
    pub fn new(suite: CipherSuite, key: &DerivedKey, nonce: &[u8]) -> Result<Self> {
        if key.expose().len() != suite.key_len() {
            return Err(CipherError::KeyDerivation(format!("key length {} does not fit {suite}", key.expose().len())));
        }
        if nonce.len() != suite.nonce_len() {
            return Err(CipherError::InvalidParameters(format!("nonce length {} does not fit {suite}", nonce.len())));
        }

        let inner = match suite {
            CipherSuite::Aes128Gcm => Inner::Aes128(Aes128::new(key.expose())?),
            CipherSuite::Aes256Gcm => Inner::Aes256(Aes256::new(key.expose())?),
            CipherSuite::XChaCha20Poly1305 => Inner::XChaCha(XChaCha::new(key.expose())?),
        };

        let mut base_nonce = [0u8; NONCE_FIELD_LEN];
        base_nonce[..nonce.len()].copy_from_slice(nonce);

        Ok(Self { suite, inner, base_nonce })
    }

    /// Nonce for chunk `index`: file prefix followed by the counter.
    fn chunk_nonce(&self, index: u64) -> [u8; NONCE_FIELD_LEN] {
        let mut nonce = self.base_nonce;
        let len = self.suite.nonce_len();
        nonce[len - NONCE_COUNTER_LEN..len].copy_from_slice(&index.to_be_bytes());
        nonce
    }

    /// Encrypts and authenticates one chunk.
    pub fn seal(&self, index: u64, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.chunk_nonce(index);
        let nonce = &nonce[..self.suite.nonce_len()];

        match &self.inner {
            Inner::Aes128(cipher) => cipher.seal(nonce, plaintext),
            Inner::Aes256(cipher) => cipher.seal(nonce, plaintext),
            Inner::XChaCha(cipher) => cipher.seal(nonce, plaintext),
        }
    }

    /// Verifies and decrypts one chunk; any mismatch is an
    /// [`CipherError::Authentication`].
    pub fn open(&self, index: u64, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < TAG_LEN {
            return Err(CipherError::Authentication);
        }

        let nonce = self.chunk_nonce(index);
        let nonce = &nonce[..self.suite.nonce_len()];

        match &self.inner {
            Inner::Aes128(cipher) => cipher.open(nonce, ciphertext),
            Inner::Aes256(cipher) => cipher.open(nonce, ciphertext),
            Inner::XChaCha(cipher) => cipher.open(nonce, ciphertext),
        }
    }
}
