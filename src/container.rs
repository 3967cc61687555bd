//! On-disk container codec.
//!
//! An encrypted file is a fixed-layout header followed by length-prefixed
//! authenticated chunks:
//!
//! ```text
//! [Header, 76 bytes]
//!   magic "BSL1" (4) | version u16 BE (2)
//!   algorithm u8 | key size in bytes u8 | mode u8 | compress u8
//!   kdf memory KiB u32 BE | kdf time u8 | kdf parallelism u8
//!   salt (32) | nonce field (24, zero-padded) | reserved (4)
//! [Chunk 0]  length u32 BE | ciphertext + tag
//! [Chunk 1]  length u32 BE | ciphertext + tag
//! ...
//! ```
//!
//! Header validation happens in full before any key material is derived:
//! unknown magic or version is a [`CipherError::Format`], a recognized
//! container built with parameters this build does not support is
//! [`CipherError::Unsupported`].

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::{CURRENT_VERSION, HEADER_LEN, MAGIC_BYTES, MAX_FRAME_LEN, NONCE_COUNTER_LEN, NONCE_FIELD_LEN, SALT_LEN, TAG_LEN};
use crate::error::{CipherError, Result};
use crate::params::{CipherParameters, CipherSuite, KdfCost};

/// Parsed or to-be-written container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    suite: CipherSuite,
    compress: bool,
    kdf: KdfCost,
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_FIELD_LEN],
}

impl Header {
    /// Builds the header for a new encrypted file.
    pub fn new(params: &CipherParameters, salt: [u8; SALT_LEN], nonce: [u8; NONCE_FIELD_LEN]) -> Result<Self> {
        let suite = params.suite()?;
        // The cost triple is stored in single-byte fields; out-of-bounds
        // values must never be silently truncated into the header.
        params.kdf.validate()?;
        Ok(Self { suite, compress: params.compress, kdf: params.kdf, salt, nonce })
    }

    pub const fn suite(&self) -> CipherSuite {
        self.suite
    }

    pub const fn compress(&self) -> bool {
        self.compress
    }

    pub const fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// The meaningful prefix of the nonce field for this suite.
    pub fn nonce(&self) -> &[u8] {
        &self.nonce[..self.suite.nonce_len()]
    }

    /// Reconstructs the parameter set recorded at encrypt time, used to
    /// reproduce the key on the decrypt path.
    pub fn parameters(&self) -> CipherParameters {
        let (algorithm, key_size, mode) = self.suite.components();
        CipherParameters { algorithm, key_size, mode, compress: self.compress, kdf: self.kdf }
    }

    /// Serializes the fixed layout.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&MAGIC_BYTES);
        bytes[4..6].copy_from_slice(&CURRENT_VERSION.to_be_bytes());
        bytes[6] = self.suite.algorithm_id();
        bytes[7] = self.suite.key_len() as u8;
        bytes[8] = self.suite.mode_id();
        bytes[9] = u8::from(self.compress);
        bytes[10..14].copy_from_slice(&self.kdf.memory_kib.to_be_bytes());
        bytes[14] = self.kdf.time as u8;
        bytes[15] = self.kdf.parallelism as u8;
        bytes[16..16 + SALT_LEN].copy_from_slice(&self.salt);
        bytes[48..48 + NONCE_FIELD_LEN].copy_from_slice(&self.nonce);
        // bytes[72..76] reserved, zero
        bytes
    }

    /// Parses and validates a serialized header.
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self> {
        if bytes[0..4] != MAGIC_BYTES {
            return Err(CipherError::Format("bad magic bytes".into()));
        }

        let version = u16::from_be_bytes([bytes[4], bytes[5]]);
        if version != CURRENT_VERSION {
            return Err(CipherError::Format(format!("unknown container version {version:#06x}")));
        }

        let suite = CipherSuite::from_ids(bytes[6], bytes[7], bytes[8])?;

        let compress = match bytes[9] {
            0 => false,
            1 => true,
            flag => return Err(CipherError::Format(format!("bad compression flag {flag:#04x}"))),
        };

        let kdf = KdfCost { memory_kib: u32::from_be_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]), time: u32::from(bytes[14]), parallelism: u32::from(bytes[15]) };
        kdf.validate().map_err(|e| CipherError::Unsupported(format!("derivation cost: {e}")))?;

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[16..16 + SALT_LEN]);
        let mut nonce = [0u8; NONCE_FIELD_LEN];
        nonce.copy_from_slice(&bytes[48..48 + NONCE_FIELD_LEN]);

        Ok(Self { suite, compress, kdf, salt, nonce })
    }

    /// Reads and validates a header from the start of a stream.
    pub async fn read<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self> {
        let mut bytes = [0u8; HEADER_LEN];
        reader.read_exact(&mut bytes).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => CipherError::Format("container too short for a header".into()),
            _ => CipherError::Io(e),
        })?;

        Self::parse(&bytes)
    }

    /// Writes the serialized header to a stream.
    pub async fn write<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes()).await?;
        Ok(())
    }
}

/// Generates a random per-file base nonce for `suite`.
///
/// The trailing [`NONCE_COUNTER_LEN`] bytes of the active region are left
/// zero as the chunk counter space; bytes past the suite's nonce length
/// stay zero as on-disk padding.
pub fn generate_nonce(suite: CipherSuite) -> Result<[u8; NONCE_FIELD_LEN]> {
    use rand::TryRng;
    use rand::rngs::SysRng;

    let mut nonce = [0u8; NONCE_FIELD_LEN];
    let prefix = suite.nonce_len() - NONCE_COUNTER_LEN;
    SysRng.try_fill_bytes(&mut nonce[..prefix]).map_err(|e| CipherError::Io(std::io::Error::other(format!("rng failed: {e}"))))?;

    Ok(nonce)
}

/// Writes one length-prefixed chunk frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    Ok(())
}

/// Reads the next chunk frame, or `None` at a clean end of stream.
///
/// A partial length prefix, a truncated payload, or a length outside the
/// sane bounds all mean the container was cut short or corrupted.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_bytes = [0u8; 4];
    let mut filled = 0;
    while filled < len_bytes.len() {
        let n = reader.read(&mut len_bytes[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    match filled {
        0 => return Ok(None),
        4 => {}
        _ => return Err(CipherError::Format("truncated frame length".into())),
    }

    let len = u32::from_be_bytes(len_bytes) as usize;
    if len < TAG_LEN {
        return Err(CipherError::Format(format!("frame too short: {len} bytes")));
    }
    if len > MAX_FRAME_LEN {
        return Err(CipherError::Format(format!("frame too large: {len} bytes")));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => CipherError::Format("truncated frame payload".into()),
        _ => CipherError::Io(e),
    })?;

    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn sample_header(compress: bool) -> Header {
        let params = CipherParameters { compress, ..CipherParameters::default() };
        Header::new(&params, [3u8; SALT_LEN], generate_nonce(params.suite().unwrap()).unwrap()).unwrap()
    }

    #[test]
    fn header_round_trip() {
        let header = sample_header(true);
        let parsed = Header::parse(&header.to_bytes()).unwrap();

        assert_eq!(parsed, header);
        assert_eq!(parsed.suite(), CipherSuite::Aes256Gcm);
        assert!(parsed.compress());
        assert_eq!(parsed.nonce().len(), 12);
    }

    #[test]
    fn parameters_survive_round_trip() {
        let params = CipherParameters { compress: true, ..CipherParameters::default() };
        let header = Header::new(&params, [0u8; SALT_LEN], [0u8; NONCE_FIELD_LEN]).unwrap();
        let rebuilt = Header::parse(&header.to_bytes()).unwrap().parameters();

        assert_eq!(rebuilt, params);
    }

    #[test]
    fn bad_magic_is_format_error() {
        let mut bytes = sample_header(false).to_bytes();
        bytes[0] = b'X';

        assert!(matches!(Header::parse(&bytes), Err(CipherError::Format(_))));
    }

    #[test]
    fn unknown_version_is_format_error() {
        let mut bytes = sample_header(false).to_bytes();
        bytes[5] = 0x7f;

        assert!(matches!(Header::parse(&bytes), Err(CipherError::Format(_))));
    }

    #[test]
    fn unknown_algorithm_is_unsupported() {
        let mut bytes = sample_header(false).to_bytes();
        bytes[6] = 0x7f;

        assert!(matches!(Header::parse(&bytes), Err(CipherError::Unsupported(_))));
    }

    #[test]
    fn hostile_kdf_cost_is_unsupported() {
        let mut bytes = sample_header(false).to_bytes();
        bytes[10..14].copy_from_slice(&u32::MAX.to_be_bytes());

        assert!(matches!(Header::parse(&bytes), Err(CipherError::Unsupported(_))));
    }

    #[tokio::test]
    async fn short_stream_is_format_error() {
        let mut reader = Cursor::new(vec![0u8; 10]);

        assert!(matches!(Header::read(&mut reader).await, Err(CipherError::Format(_))));
    }

    #[tokio::test]
    async fn frame_round_trip() {
        let payload = vec![0xabu8; 100];
        let mut buffer = Cursor::new(Vec::new());
        write_frame(&mut buffer, &payload).await.unwrap();

        let mut reader = Cursor::new(buffer.into_inner());
        assert_eq!(read_frame(&mut reader).await.unwrap().unwrap(), payload);
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_payload_is_format_error() {
        let mut buffer = Cursor::new(Vec::new());
        write_frame(&mut buffer, &[0u8; 64]).await.unwrap();
        let mut bytes = buffer.into_inner();
        bytes.truncate(bytes.len() - 8);

        let mut reader = Cursor::new(bytes);
        assert!(matches!(read_frame(&mut reader).await, Err(CipherError::Format(_))));
    }

    #[tokio::test]
    async fn oversized_length_is_format_error() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());

        let mut reader = Cursor::new(bytes);
        assert!(matches!(read_frame(&mut reader).await, Err(CipherError::Format(_))));
    }

    #[test]
    fn nonce_counter_space_is_zero() {
        for suite in [CipherSuite::Aes128Gcm, CipherSuite::XChaCha20Poly1305] {
            let nonce = generate_nonce(suite).unwrap();
            assert!(nonce[suite.nonce_len() - NONCE_COUNTER_LEN..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn base_nonces_differ_across_files() {
        let a = generate_nonce(CipherSuite::XChaCha20Poly1305).unwrap();
        let b = generate_nonce(CipherSuite::XChaCha20Poly1305).unwrap();
        assert_ne!(a, b);
    }
}
