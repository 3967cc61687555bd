//! CLI driver.
//!
//! The non-GUI control surface over the batch engine: parses the
//! `encrypt`/`decrypt` subcommands, fills omitted parameters from the
//! defaults, starts the batch, renders events, and maps the outcome to an
//! exit code. Ctrl-C is wired to `abort`, so an interrupted run stops at
//! the next chunk boundary and exits with the abort code.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use crate::batch::{BatchController, BatchPhase, BatchRequest, JobState};
use crate::config::APP_NAME;
use crate::event::{Event, FileOutcome};
use crate::params::{Algorithm, CipherParameters, Direction, Mode};
use crate::secret::Passphrase;
use crate::ui;

/// Exit code when any file failed.
const EXIT_FAILED: u8 = 1;
/// Exit code for a rejected or misconfigured start.
const EXIT_USAGE: u8 = 2;
/// Exit code after a user abort, following the SIGINT convention.
const EXIT_ABORTED: u8 = 130;

#[derive(Subcommand)]
pub enum Commands {
    /// Encrypt files under one passphrase.
    Encrypt {
        passphrase: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Cipher family; defaults follow the built-in settings.
        #[arg(long, value_enum)]
        cipher: Option<Algorithm>,

        /// Key size in bits.
        #[arg(long)]
        keysize: Option<u32>,

        /// Mode of operation; inferred from the cipher when omitted.
        #[arg(long, value_enum)]
        mode: Option<Mode>,

        /// Compress chunks before encryption.
        #[arg(long)]
        compress: bool,

        /// Write outputs here instead of beside the inputs.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Decrypt previously encrypted files (parameters come from each
    /// container's header).
    Decrypt {
        passphrase: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write outputs here instead of beside the inputs.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Parser)]
#[command(name = APP_NAME, version, about = "Batch file encryption with pause, resume, abort, and per-file stop.")]
pub struct App {
    #[command(subcommand)]
    command: Commands,
}

impl App {
    pub fn init() -> Result<Self> {
        let subscriber = tracing_subscriber::fmt().with_file(true).with_line_number(true).finish();
        tracing::subscriber::set_global_default(subscriber).context("failed to install tracing subscriber")?;
        Ok(Self::parse())
    }

    pub async fn execute(self) -> Result<ExitCode> {
        let request = match self.command {
            Commands::Encrypt { passphrase, files, cipher, keysize, mode, compress, output_dir } => {
                let defaults = CipherParameters::default();
                let algorithm = cipher.unwrap_or(defaults.algorithm);
                let params = CipherParameters {
                    algorithm,
                    key_size: keysize.unwrap_or(defaults.key_size),
                    mode: mode.unwrap_or(match algorithm {
                        Algorithm::Aes => Mode::Gcm,
                        Algorithm::XChaCha20 => Mode::Poly1305,
                    }),
                    compress,
                    kdf: defaults.kdf,
                };
                BatchRequest { passphrase: Passphrase::new(&passphrase), paths: files, output_dir, params, direction: Direction::Encrypt }
            }
            Commands::Decrypt { passphrase, files, output_dir } => {
                BatchRequest { passphrase: Passphrase::new(&passphrase), paths: files, output_dir, params: CipherParameters::default(), direction: Direction::Decrypt }
            }
        };

        run(request).await
    }
}

async fn run(request: BatchRequest) -> Result<ExitCode> {
    let controller = Arc::new(BatchController::new());
    let mut events = controller.subscribe();

    if let Err(error) = controller.start(request) {
        ui::failure(&error.to_string());
        return Ok(ExitCode::from(EXIT_USAGE));
    }

    // Ctrl-C requests an abort; the worker honors it at the next chunk
    // boundary and the event loop below winds down normally.
    let aborter = Arc::clone(&controller);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            aborter.abort();
        }
    });

    let mut bar: Option<(PathBuf, ui::progress::Bar)> = None;
    loop {
        match events.recv().await {
            Ok(Event::Progress { path, bytes_processed, total_bytes }) => {
                if bar.as_ref().is_none_or(|(current, _)| current != &path) {
                    let name = path.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
                    bar = Some((path.clone(), ui::progress::Bar::new(total_bytes, &name)));
                }
                if let Some((_, bar)) = &bar {
                    bar.set(bytes_processed);
                }
            }
            Ok(Event::FileDone { path, outcome }) => {
                if let Some((current, finished)) = bar.take() {
                    if current == path {
                        finished.finish(&outcome.to_string());
                    } else {
                        bar = Some((current, finished));
                    }
                }
                match outcome {
                    FileOutcome::Completed => ui::success(&path.display().to_string()),
                    FileOutcome::Stopped => ui::note(&format!("stopped {}", path.display())),
                    FileOutcome::Aborted => ui::failure(&format!("aborted {}", path.display())),
                    // The Error event already named the failure.
                    FileOutcome::Failed => {}
                }
            }
            Ok(Event::Error { path, text }) => ui::failure(&format!("{}: {text}", path.display())),
            Ok(Event::Status { text }) => ui::note(&text),
            Ok(Event::BusyChanged { busy: false }) => break,
            Ok(Event::BusyChanged { .. }) => {}
            Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "event consumer lagged"),
            Err(RecvError::Closed) => break,
        }
    }

    let jobs = controller.jobs();
    let any_failed = jobs.iter().any(|job| job.state == JobState::Failed);

    if controller.phase() == BatchPhase::Aborted {
        Ok(ExitCode::from(EXIT_ABORTED))
    } else if any_failed {
        Ok(ExitCode::from(EXIT_FAILED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
