//! Batchseal - batch file encryption with cooperative control.
//!
//! Turns a passphrase, a cipher selection, and an ordered list of files
//! into a sequence of chunked AEAD transforms running off the caller's
//! thread, with:
//! - AES-128/256-GCM and XChaCha20-Poly1305 suites
//! - Argon2id key derivation, one salt per file
//! - optional zstd chunk compression
//! - live per-file progress, pause/resume, batch abort, per-file stop

pub mod app;
pub mod batch;
pub mod cipher;
pub mod compression;
pub mod config;
pub mod container;
pub mod control;
pub mod error;
pub mod event;
pub mod kdf;
pub mod params;
pub mod secret;
pub mod stream;
pub mod ui;
