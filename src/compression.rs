//! Zstd chunk compression.
//!
//! Chunks are compressed independently so interruption granularity and
//! memory bounds stay per-chunk. Compression is applied whenever the
//! container flags it, even when a chunk grows — decryption keys off the
//! header flag alone.

use crate::config::{CHUNK_SIZE, ZSTD_LEVEL};
use crate::error::{CipherError, Result};

/// Compresses one plaintext chunk.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::bulk::compress(data, ZSTD_LEVEL).map_err(CipherError::Io)
}

/// Decompresses one chunk back to at most [`CHUNK_SIZE`] plaintext bytes.
///
/// The cap matches the encrypt-side chunking, so a genuine container can
/// never exceed it; anything that does is corrupt framing.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::bulk::decompress(data, CHUNK_SIZE).map_err(|e| CipherError::Format(format!("chunk decompression failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let data = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit.";
        let compressed = compress(data).unwrap();
        assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn empty_chunk_round_trips() {
        let compressed = compress(&[]).unwrap();
        assert!(decompress(&compressed).unwrap().is_empty());
    }

    #[test]
    fn compressible_data_shrinks() {
        let data = vec![b'a'; 64 * 1024];
        assert!(compress(&data).unwrap().len() < data.len());
    }

    #[test]
    fn incompressible_data_still_round_trips() {
        // Pseudo-random bytes typically expand slightly; the unit proceeds
        // with the compressed form regardless.
        let data: Vec<u8> = (0..4096u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
        let compressed = compress(&data).unwrap();
        assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn garbage_fails() {
        assert!(matches!(decompress(b"not zstd at all"), Err(CipherError::Format(_))));
    }
}
