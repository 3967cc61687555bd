//! Batch controller and worker.
//!
//! The controller owns the batch lifecycle: it validates a request,
//! builds the job table, and hands everything to a worker task spawned on
//! the runtime, so the submitting context never blocks on cipher work.
//! Files are processed strictly in submission order, one at a time. The
//! caller steers the worker only through control requests
//! ([`pause`](BatchController::pause), [`resume`](BatchController::resume),
//! [`abort`](BatchController::abort),
//! [`stop_file`](BatchController::stop_file)) and observes it only through
//! the event channel and job snapshots.
//!
//! Failure isolation: a file that fails marks its own job `Failed` and the
//! batch moves on; only `abort` ends the batch early.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use strum::Display;
use tokio::io::{BufReader, BufWriter};

use crate::config::{DECRYPTED_EXTENSION, EVENT_CAPACITY, FILE_EXTENSION};
use crate::container::{self, Header};
use crate::control::{ControlRequest, ControlToken, Directive};
use crate::error::{CipherError, Result};
use crate::event::{EventBus, FileOutcome};
use crate::kdf;
use crate::params::{CipherParameters, Direction};
use crate::secret::Passphrase;
use crate::stream::{self, StreamEnd};

/// Everything needed to run one batch.
///
/// Owned by the worker for the batch lifetime; dropping it wipes the
/// passphrase bytes.
#[derive(Debug)]
pub struct BatchRequest {
    pub passphrase: Passphrase,
    /// Input files, processed in order after exact-path deduplication.
    pub paths: Vec<PathBuf>,
    /// Where outputs go; `None` places each output beside its input.
    pub output_dir: Option<PathBuf>,
    pub params: CipherParameters,
    pub direction: Direction,
}

/// Lifecycle of the batch as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BatchPhase {
    Idle,
    Running,
    Paused,
    Completed,
    Aborted,
}

/// Lifecycle of one file within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum JobState {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Stopped,
    Aborted,
}

/// One file operation inside a batch.
#[derive(Debug, Clone)]
pub struct FileJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub state: JobState,
    pub bytes_processed: u64,
    pub total_bytes: u64,
}

/// State shared between the controller (reads, phase check in `start`) and
/// the worker (all mutation).
pub struct Shared {
    phase: Mutex<BatchPhase>,
    jobs: Mutex<Vec<FileJob>>,
}

impl Shared {
    pub fn new() -> Self {
        Self { phase: Mutex::new(BatchPhase::Idle), jobs: Mutex::new(Vec::new()) }
    }

    pub fn phase(&self) -> BatchPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_phase(&self, phase: BatchPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    pub fn jobs(&self) -> Vec<FileJob> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn job_at(&self, index: usize) -> FileJob {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)[index].clone()
    }

    fn jobs_len(&self) -> usize {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub(crate) fn set_job_state(&self, source: &Path, state: JobState) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(job) = jobs.iter_mut().find(|job| job.source == source) {
            job.state = state;
        }
    }

    /// State change that only fires when the job is currently in `from`,
    /// so a pause between files cannot mislabel a pending job.
    pub(crate) fn transition_job(&self, source: &Path, from: JobState, to: JobState) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(job) = jobs.iter_mut().find(|job| job.source == source && job.state == from) {
            job.state = to;
        }
    }

    pub(crate) fn update_progress(&self, source: &Path, bytes_processed: u64) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(job) = jobs.iter_mut().find(|job| job.source == source) {
            job.bytes_processed = bytes_processed;
        }
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress reporter handed to the stream unit for one file: updates the
/// job table and emits a `Progress` event per chunk.
pub struct ProgressSink<'a> {
    shared: &'a Shared,
    events: &'a EventBus,
    path: &'a Path,
    total: u64,
}

impl<'a> ProgressSink<'a> {
    pub fn new(shared: &'a Shared, events: &'a EventBus, path: &'a Path, total: u64) -> Self {
        Self { shared, events, path, total }
    }

    pub fn report(&self, bytes_processed: u64) {
        self.shared.update_progress(self.path, bytes_processed);
        self.events.progress(self.path, bytes_processed, self.total);
    }
}

/// Control surface for batch encryption/decryption.
pub struct BatchController {
    events: EventBus,
    shared: Arc<Shared>,
    requests: Mutex<Option<flume::Sender<ControlRequest>>>,
}

impl BatchController {
    pub fn new() -> Self {
        Self { events: EventBus::new(EVENT_CAPACITY), shared: Arc::new(Shared::new()), requests: Mutex::new(None) }
    }

    /// Subscribes to the event channel. Subscribe before `start` to see
    /// the whole batch.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<crate::event::Event> {
        self.events.subscribe()
    }

    pub fn phase(&self) -> BatchPhase {
        self.shared.phase()
    }

    /// Snapshot of the job table.
    pub fn jobs(&self) -> Vec<FileJob> {
        self.shared.jobs()
    }

    /// Validates the request and launches the worker.
    ///
    /// Rejects with [`CipherError::AlreadyBusy`] while a batch is running
    /// or paused, and with [`CipherError::InvalidParameters`] for an empty
    /// passphrase, an unsupported parameter combination, or a file list
    /// with missing entries — all before any file is touched.
    pub fn start(&self, request: BatchRequest) -> Result<()> {
        let mut phase = self.shared.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*phase, BatchPhase::Running | BatchPhase::Paused) {
            return Err(CipherError::AlreadyBusy);
        }

        if request.passphrase.is_empty() {
            return Err(CipherError::InvalidParameters("empty passphrase".into()));
        }
        request.params.validate()?;

        let mut seen = hashbrown::HashSet::new();
        let mut claimed = hashbrown::HashSet::new();
        let mut jobs = Vec::new();
        for path in &request.paths {
            if !seen.insert(path.clone()) {
                continue;
            }

            let metadata = std::fs::metadata(path).map_err(|e| CipherError::InvalidParameters(format!("cannot read {}: {e}", path.display())))?;
            if !metadata.is_file() {
                return Err(CipherError::InvalidParameters(format!("not a regular file: {}", path.display())));
            }

            let destination = unique_path(output_path(path, request.output_dir.as_deref(), request.direction), &claimed);
            claimed.insert(destination.clone());

            jobs.push(FileJob { source: path.clone(), destination, state: JobState::Pending, bytes_processed: 0, total_bytes: metadata.len() });
        }

        if jobs.is_empty() {
            return Err(CipherError::InvalidParameters("no input files".into()));
        }

        let job_count = jobs.len();
        *self.shared.jobs.lock().unwrap_or_else(PoisonError::into_inner) = jobs;
        *phase = BatchPhase::Running;
        drop(phase);

        let (tx, rx) = flume::unbounded();
        *self.requests.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);

        self.events.busy(true);
        self.events.status(format!("{} {job_count} file(s)", request.direction.label()));
        tracing::info!(files = job_count, direction = %request.direction, "batch started");

        tokio::spawn(run_batch(Arc::clone(&self.shared), self.events.clone(), request, rx));

        Ok(())
    }

    /// Requests suspension at the next chunk boundary.
    pub fn pause(&self) {
        self.send(ControlRequest::Pause);
    }

    /// Leaves the paused state.
    pub fn resume(&self) {
        self.send(ControlRequest::Resume);
    }

    /// Stops the in-flight file as soon as possible and discards all
    /// pending jobs.
    pub fn abort(&self) {
        self.send(ControlRequest::Abort);
    }

    /// Stops one file: the running file is cut short and the batch moves
    /// on; a pending file is removed without starting; a terminal file is
    /// untouched.
    pub fn stop_file(&self, path: &Path) {
        self.send(ControlRequest::StopFile(path.to_owned()));
    }

    fn send(&self, request: ControlRequest) {
        if let Some(tx) = self.requests.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            // A dead receiver just means the batch already ended.
            let _ = tx.send(request);
        }
    }
}

impl Default for BatchController {
    fn default() -> Self {
        Self::new()
    }
}

/// The worker loop: one file at a time, in order, on the spawned task.
async fn run_batch(shared: Arc<Shared>, events: EventBus, request: BatchRequest, requests: flume::Receiver<ControlRequest>) {
    let mut token = ControlToken::new(requests, Arc::clone(&shared), events.clone());
    let mut aborted = false;

    for index in 0..shared.jobs_len() {
        let job = shared.job_at(index);
        let source = job.source.clone();

        // Control first: requests take priority over starting new work.
        match token.checkpoint(&source).await {
            Directive::Abort => {
                aborted = true;
                break;
            }
            Directive::StopFile => {
                shared.set_job_state(&source, JobState::Stopped);
                events.file_done(&source, FileOutcome::Stopped);
                continue;
            }
            Directive::Continue => {}
        }
        if token.is_stopped(&source) {
            shared.set_job_state(&source, JobState::Stopped);
            events.file_done(&source, FileOutcome::Stopped);
            continue;
        }

        shared.set_job_state(&source, JobState::Running);
        events.status(format!("{} {}", request.direction.label(), source.display()));
        tracing::debug!(file = %source.display(), "processing");

        match process_file(&shared, &events, &mut token, &request, &job).await {
            Ok(StreamEnd::Finished) => {
                shared.set_job_state(&source, JobState::Completed);
                events.file_done(&source, FileOutcome::Completed);
            }
            Ok(StreamEnd::Stopped) => {
                shared.set_job_state(&source, JobState::Stopped);
                events.file_done(&source, FileOutcome::Stopped);
            }
            Ok(StreamEnd::Aborted) => {
                shared.set_job_state(&source, JobState::Aborted);
                events.file_done(&source, FileOutcome::Aborted);
                aborted = true;
                break;
            }
            Err(error) => {
                // Partial output stays on disk; the caller discards it.
                tracing::warn!(file = %source.display(), %error, "file failed");
                shared.set_job_state(&source, JobState::Failed);
                events.error(&source, error.to_string());
                events.file_done(&source, FileOutcome::Failed);
            }
        }
    }

    shared.set_phase(if aborted { BatchPhase::Aborted } else { BatchPhase::Completed });

    let jobs = shared.jobs();
    let completed = jobs.iter().filter(|job| job.state == JobState::Completed).count();
    let failed = jobs.iter().filter(|job| job.state == JobState::Failed).count();
    let bytes: u64 = jobs.iter().filter(|job| job.state == JobState::Completed).map(|job| job.total_bytes).sum();
    events.status(format!("batch {}: {completed}/{} completed, {failed} failed ({})", if aborted { "aborted" } else { "finished" }, jobs.len(), bytesize::ByteSize::b(bytes)));
    events.busy(false);
}

/// Runs one file through derive + stream transform.
async fn process_file(shared: &Shared, events: &EventBus, token: &mut ControlToken, request: &BatchRequest, job: &FileJob) -> Result<StreamEnd> {
    let input = tokio::fs::File::open(&job.source).await?;
    let sink = ProgressSink::new(shared, events, &job.source, job.total_bytes);

    match request.direction {
        Direction::Encrypt => {
            let salt = kdf::generate_salt()?;
            let nonce = container::generate_nonce(request.params.suite()?)?;
            let key = kdf::derive(&request.passphrase, &salt, &request.params)?;
            tracing::debug!(file = %job.source.display(), salt = %hex::encode(&salt[..8]), "file key derived");
            let header = Header::new(&request.params, salt, nonce)?;

            let output = tokio::fs::File::create(&job.destination).await?;
            stream::encrypt_stream(BufReader::new(input), BufWriter::new(output), &key, &header, &sink, token, &job.source).await
        }
        Direction::Decrypt => {
            let mut reader = BufReader::new(input);
            // Header problems (foreign file, unsupported build) surface
            // before any key material is derived.
            let header = Header::read(&mut reader).await?;
            let key = kdf::derive(&request.passphrase, header.salt(), &header.parameters())?;

            let output = tokio::fs::File::create(&job.destination).await?;
            stream::decrypt_stream(reader, BufWriter::new(output), &key, &header, &sink, token, &job.source).await
        }
    }
}

/// Destination for one input path: `.enc` appended on encrypt, stripped on
/// decrypt (`.dec` appended when the input has no `.enc` suffix).
fn output_path(source: &Path, output_dir: Option<&Path>, direction: Direction) -> PathBuf {
    let name = source.file_name().map_or_else(|| "output".to_owned(), |n| n.to_string_lossy().into_owned());
    let new_name = match direction {
        Direction::Encrypt => format!("{name}{FILE_EXTENSION}"),
        Direction::Decrypt => name.strip_suffix(FILE_EXTENSION).map_or_else(|| format!("{name}{DECRYPTED_EXTENSION}"), str::to_owned),
    };

    match output_dir {
        Some(dir) => dir.join(new_name),
        None => source.parent().map_or_else(|| PathBuf::from(&new_name), |parent| parent.join(&new_name)),
    }
}

/// Never clobber anything: a taken destination gets a ` (2)`-style counter
/// before its extension.
fn unique_path(candidate: PathBuf, claimed: &hashbrown::HashSet<PathBuf>) -> PathBuf {
    if !candidate.exists() && !claimed.contains(&candidate) {
        return candidate;
    }

    let stem = candidate.file_stem().map_or_else(|| "output".to_owned(), |s| s.to_string_lossy().into_owned());
    let extension = candidate.extension().map(|e| e.to_string_lossy().into_owned());

    let mut counter = 2u32;
    loop {
        let name = match &extension {
            Some(ext) => format!("{stem} ({counter}).{ext}"),
            None => format!("{stem} ({counter})"),
        };
        let attempt = candidate.with_file_name(name);
        if !attempt.exists() && !claimed.contains(&attempt) {
            return attempt;
        }
        counter += 1;
    }
}
