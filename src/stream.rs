//! Streaming chunk transforms.
//!
//! Reads the input in bounded chunks, compresses (when flagged), seals or
//! opens each chunk with its counter nonce, and moves framed chunks
//! through the container codec. Memory stays constant regardless of file
//! size. After every chunk the unit reports progress and polls the control
//! token, so pause/abort/stop take effect within one chunk's work.
//!
//! On any failure — including a failed tag check mid-file — output already
//! written stays on disk; the caller decides what to do with it.

use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::batch::ProgressSink;
use crate::cipher::ChunkCipher;
use crate::compression;
use crate::config::{CHUNK_SIZE, HEADER_LEN};
use crate::container::{self, Header};
use crate::control::{ControlToken, Directive};
use crate::error::{CipherError, Result};
use crate::secret::DerivedKey;

/// How a stream transform ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The whole input was transformed.
    Finished,
    /// A stop-file request interrupted this file.
    Stopped,
    /// An abort request interrupted the batch.
    Aborted,
}

/// Encrypts `input` into `output` as a framed container.
///
/// Writes the header, then one sealed chunk per [`CHUNK_SIZE`] of input.
/// An empty input still produces one sealed empty chunk, so decryption
/// always has something to authenticate the passphrase against.
pub async fn encrypt_stream<R, W>(mut input: R, mut output: W, key: &DerivedKey, header: &Header, progress: &ProgressSink<'_>, token: &mut ControlToken, path: &Path) -> Result<StreamEnd>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let cipher = ChunkCipher::new(header.suite(), key, header.nonce())?;
    header.write(&mut output).await?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut index = 0u64;
    let mut processed = 0u64;

    loop {
        match token.checkpoint(path).await {
            Directive::Continue => {}
            Directive::StopFile => {
                output.flush().await?;
                return Ok(StreamEnd::Stopped);
            }
            Directive::Abort => {
                output.flush().await?;
                return Ok(StreamEnd::Aborted);
            }
        }

        let read = read_full(&mut input, &mut buffer).await?;
        if read == 0 && index > 0 {
            break;
        }

        let chunk = &buffer[..read];
        let payload = if header.compress() { compression::compress(chunk)? } else { chunk.to_vec() };
        let sealed = cipher.seal(index, &payload)?;
        container::write_frame(&mut output, &sealed).await?;

        index += 1;
        processed += read as u64;
        progress.report(processed);

        if read < CHUNK_SIZE {
            break;
        }
    }

    output.flush().await?;
    Ok(StreamEnd::Finished)
}

/// Decrypts a framed container into `output`.
///
/// The caller has already read (and validated) the header from `input`;
/// progress counts container bytes consumed, header included. Fails with
/// [`CipherError::Authentication`] the instant any chunk fails its tag
/// check, leaving prior output in place.
pub async fn decrypt_stream<R, W>(mut input: R, mut output: W, key: &DerivedKey, header: &Header, progress: &ProgressSink<'_>, token: &mut ControlToken, path: &Path) -> Result<StreamEnd>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let cipher = ChunkCipher::new(header.suite(), key, header.nonce())?;

    let mut index = 0u64;
    let mut consumed = HEADER_LEN as u64;

    loop {
        match token.checkpoint(path).await {
            Directive::Continue => {}
            Directive::StopFile => {
                output.flush().await?;
                return Ok(StreamEnd::Stopped);
            }
            Directive::Abort => {
                output.flush().await?;
                return Ok(StreamEnd::Aborted);
            }
        }

        let Some(frame) = container::read_frame(&mut input).await? else {
            break;
        };

        let payload = cipher.open(index, &frame)?;
        let plain = if header.compress() { compression::decompress(&payload)? } else { payload };
        output.write_all(&plain).await?;

        index += 1;
        consumed += 4 + frame.len() as u64;
        progress.report(consumed);
    }

    if index == 0 {
        return Err(CipherError::Format("container has no chunks".into()));
    }

    output.flush().await?;
    Ok(StreamEnd::Finished)
}

/// Fills `buffer` as far as the input allows; a short count means EOF.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let read = reader.read(&mut buffer[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }

    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::batch::Shared;
    use crate::config::{NONCE_FIELD_LEN, SALT_LEN};
    use crate::control::ControlRequest;
    use crate::event::EventBus;
    use crate::params::{CipherParameters, CipherSuite};

    struct Harness {
        shared: Arc<Shared>,
        events: EventBus,
        requests: flume::Sender<ControlRequest>,
        token: ControlToken,
    }

    fn harness() -> Harness {
        let shared = Arc::new(Shared::new());
        let events = EventBus::default();
        let (tx, rx) = flume::unbounded();
        let token = ControlToken::new(rx, Arc::clone(&shared), events.clone());
        Harness { shared, events, requests: tx, token }
    }

    fn suite_params(suite: CipherSuite, compress: bool) -> CipherParameters {
        let (algorithm, key_size, mode) = suite.components();
        CipherParameters { algorithm, key_size, mode, compress, ..CipherParameters::default() }
    }

    fn fixed_header(params: &CipherParameters) -> Header {
        Header::new(params, [9u8; SALT_LEN], [0u8; NONCE_FIELD_LEN]).unwrap()
    }

    fn key_for(suite: CipherSuite) -> DerivedKey {
        DerivedKey::from_vec(vec![0x5au8; suite.key_len()])
    }

    async fn encrypt_to_vec(harness: &mut Harness, data: &[u8], params: &CipherParameters, key: &DerivedKey) -> Vec<u8> {
        let header = fixed_header(params);
        let path = Path::new("input");
        let sink = ProgressSink::new(&harness.shared, &harness.events, path, data.len() as u64);
        let mut output = Cursor::new(Vec::new());

        let end = encrypt_stream(Cursor::new(data.to_vec()), &mut output, key, &header, &sink, &mut harness.token, path).await.unwrap();
        assert_eq!(end, StreamEnd::Finished);

        output.into_inner()
    }

    async fn decrypt_to_vec(harness: &mut Harness, container_bytes: &[u8], key: &DerivedKey) -> Result<Vec<u8>> {
        let mut reader = Cursor::new(container_bytes.to_vec());
        let header = Header::read(&mut reader).await?;
        let path = Path::new("input.enc");
        let sink = ProgressSink::new(&harness.shared, &harness.events, path, container_bytes.len() as u64);
        let mut output = Cursor::new(Vec::new());

        decrypt_stream(reader, &mut output, key, &header, &sink, &mut harness.token, path).await?;
        Ok(output.into_inner())
    }

    #[tokio::test]
    async fn round_trip_every_suite() {
        // Two full chunks plus a tail, so framing and counter nonces are
        // exercised across chunk boundaries.
        let data: Vec<u8> = (0..2 * CHUNK_SIZE + 333).map(|i| (i % 251) as u8).collect();

        for suite in [CipherSuite::Aes128Gcm, CipherSuite::Aes256Gcm, CipherSuite::XChaCha20Poly1305] {
            for compress in [false, true] {
                let mut harness = harness();
                let params = suite_params(suite, compress);
                let key = key_for(suite);

                let sealed = encrypt_to_vec(&mut harness, &data, &params, &key).await;
                let opened = decrypt_to_vec(&mut harness, &sealed, &key).await.unwrap();
                assert_eq!(opened, data, "{suite} compress={compress}");
            }
        }
    }

    #[tokio::test]
    async fn empty_input_round_trips() {
        let mut harness = harness();
        let params = suite_params(CipherSuite::Aes256Gcm, true);
        let key = key_for(CipherSuite::Aes256Gcm);

        let sealed = encrypt_to_vec(&mut harness, b"", &params, &key).await;
        // Header plus exactly one sealed (empty) chunk.
        assert!(sealed.len() > HEADER_LEN + 4);

        let opened = decrypt_to_vec(&mut harness, &sealed, &key).await.unwrap();
        assert!(opened.is_empty());
    }

    #[tokio::test]
    async fn wrong_key_fails_authentication() {
        let mut harness = harness();
        let params = suite_params(CipherSuite::Aes256Gcm, false);

        let sealed = encrypt_to_vec(&mut harness, b"secret payload", &params, &key_for(CipherSuite::Aes256Gcm)).await;
        let wrong = DerivedKey::from_vec(vec![0xa5u8; 32]);

        assert!(matches!(decrypt_to_vec(&mut harness, &sealed, &wrong).await, Err(CipherError::Authentication)));
    }

    #[tokio::test]
    async fn single_flipped_byte_fails_authentication() {
        let mut harness = harness();
        let params = suite_params(CipherSuite::Aes128Gcm, false);
        let key = key_for(CipherSuite::Aes128Gcm);

        let sealed = encrypt_to_vec(&mut harness, b"bytes worth protecting", &params, &key).await;

        for position in [HEADER_LEN + 4, sealed.len() - 1] {
            let mut tampered = sealed.clone();
            tampered[position] ^= 0x01;
            assert!(matches!(decrypt_to_vec(&mut harness, &tampered, &key).await, Err(CipherError::Authentication)));
        }
    }

    #[tokio::test]
    async fn truncated_container_is_format_error() {
        let mut harness = harness();
        let params = suite_params(CipherSuite::Aes256Gcm, false);
        let key = key_for(CipherSuite::Aes256Gcm);

        let mut sealed = encrypt_to_vec(&mut harness, b"some data", &params, &key).await;
        sealed.truncate(sealed.len() - 3);

        assert!(matches!(decrypt_to_vec(&mut harness, &sealed, &key).await, Err(CipherError::Format(_))));
    }

    #[tokio::test]
    async fn header_only_container_is_format_error() {
        let mut harness = harness();
        let params = suite_params(CipherSuite::Aes256Gcm, false);
        let key = key_for(CipherSuite::Aes256Gcm);

        let sealed = encrypt_to_vec(&mut harness, b"x", &params, &key).await;

        assert!(matches!(decrypt_to_vec(&mut harness, &sealed[..HEADER_LEN], &key).await, Err(CipherError::Format(_))));
    }

    #[tokio::test]
    async fn abort_interrupts_before_the_next_chunk() {
        let mut harness = harness();
        let params = suite_params(CipherSuite::Aes256Gcm, false);
        let key = key_for(CipherSuite::Aes256Gcm);
        let header = fixed_header(&params);
        let path = Path::new("input");
        let sink = ProgressSink::new(&harness.shared, &harness.events, path, 0);

        harness.requests.send(ControlRequest::Abort).unwrap();

        let mut output = Cursor::new(Vec::new());
        let end = encrypt_stream(Cursor::new(vec![0u8; CHUNK_SIZE]), &mut output, &key, &header, &sink, &mut harness.token, path).await.unwrap();

        assert_eq!(end, StreamEnd::Aborted);
        // Partial output (just the header) is left for the caller.
        assert_eq!(output.into_inner().len(), HEADER_LEN);
    }

    #[tokio::test]
    async fn stop_request_ends_only_this_stream() {
        let mut harness = harness();
        let params = suite_params(CipherSuite::Aes256Gcm, false);
        let key = key_for(CipherSuite::Aes256Gcm);
        let header = fixed_header(&params);
        let path = Path::new("input");
        let sink = ProgressSink::new(&harness.shared, &harness.events, path, 0);

        harness.requests.send(ControlRequest::StopFile(path.to_owned())).unwrap();

        let mut output = Cursor::new(Vec::new());
        let end = encrypt_stream(Cursor::new(vec![0u8; 64]), &mut output, &key, &header, &sink, &mut harness.token, path).await.unwrap();

        assert_eq!(end, StreamEnd::Stopped);
    }

    #[tokio::test]
    async fn paused_run_produces_identical_output() {
        let data: Vec<u8> = (0..CHUNK_SIZE + 100).map(|i| (i % 241) as u8).collect();
        let params = suite_params(CipherSuite::XChaCha20Poly1305, true);
        let key = key_for(CipherSuite::XChaCha20Poly1305);

        let mut plain_run = harness();
        let baseline = encrypt_to_vec(&mut plain_run, &data, &params, &key).await;

        // Pause before the first chunk, resume from another task a little
        // later; the sealed bytes must not differ in any way.
        let mut paused_run = harness();
        paused_run.requests.send(ControlRequest::Pause).unwrap();
        let resume = paused_run.requests.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            resume.send(ControlRequest::Resume).unwrap();
        });

        let paused = encrypt_to_vec(&mut paused_run, &data, &params, &key).await;
        assert_eq!(paused, baseline);
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_reaches_total() {
        let data = vec![7u8; CHUNK_SIZE + CHUNK_SIZE / 2];
        let mut harness = harness();
        let mut rx = harness.events.subscribe();
        let params = suite_params(CipherSuite::Aes256Gcm, false);
        let key = key_for(CipherSuite::Aes256Gcm);

        encrypt_to_vec(&mut harness, &data, &params, &key).await;

        let mut last = 0u64;
        while let Ok(event) = rx.try_recv() {
            if let crate::event::Event::Progress { bytes_processed, .. } = event {
                assert!(bytes_processed >= last);
                last = bytes_processed;
            }
        }
        assert_eq!(last, data.len() as u64);
    }
}
