//! Cooperative batch control.
//!
//! Pause, resume, abort, and stop-file requests travel from the caller to
//! the worker over a queue and take effect at chunk boundaries — a chunk
//! already fully written is never rolled back. While paused the worker
//! parks on the queue waiting for the next request instead of spinning.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::batch::{BatchPhase, JobState, Shared};
use crate::event::EventBus;

/// A control request submitted by the caller context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    /// Suspend at the next chunk boundary.
    Pause,
    /// Leave the paused state.
    Resume,
    /// Abandon the in-flight file and discard all pending jobs.
    Abort,
    /// Stop one file: scoped abort if it is running, queue removal if it
    /// is still pending, no-op if it is already terminal.
    StopFile(PathBuf),
}

/// What the worker should do at a chunk boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Continue,
    /// Stop the current file only and advance to the next job.
    StopFile,
    /// Stop the current file and end the batch.
    Abort,
}

/// Worker-side consumer of control requests.
///
/// Owned by the batch worker; polled between chunks and between files.
/// Stop requests for files other than the current one accumulate until the
/// worker reaches them in the queue.
pub struct ControlToken {
    requests: flume::Receiver<ControlRequest>,
    shared: Arc<Shared>,
    events: EventBus,
    paused: bool,
    stopped: hashbrown::HashSet<PathBuf>,
}

impl ControlToken {
    pub fn new(requests: flume::Receiver<ControlRequest>, shared: Arc<Shared>, events: EventBus) -> Self {
        Self { requests, shared, events, paused: false, stopped: hashbrown::HashSet::new() }
    }

    /// Whether a stop request has been recorded for `path`.
    pub fn is_stopped(&self, path: &Path) -> bool {
        self.stopped.contains(path)
    }

    /// Consumes every control request received since the last boundary,
    /// then waits while paused. `current` is the file the worker is (or is
    /// about to start) processing.
    pub async fn checkpoint(&mut self, current: &Path) -> Directive {
        loop {
            match self.requests.try_recv() {
                Ok(request) => {
                    if let Some(directive) = self.apply(request, current) {
                        return directive;
                    }
                }
                Err(flume::TryRecvError::Empty) => break,
                // Controller gone: nobody can resume or observe us.
                Err(flume::TryRecvError::Disconnected) => return Directive::Abort,
            }
        }

        while self.paused {
            match self.requests.recv_async().await {
                Ok(request) => {
                    if let Some(directive) = self.apply(request, current) {
                        return directive;
                    }
                }
                Err(_) => return Directive::Abort,
            }
        }

        Directive::Continue
    }

    fn apply(&mut self, request: ControlRequest, current: &Path) -> Option<Directive> {
        match request {
            ControlRequest::Pause => {
                if !self.paused {
                    self.paused = true;
                    self.shared.set_phase(BatchPhase::Paused);
                    self.shared.transition_job(current, JobState::Running, JobState::Paused);
                    self.events.status("batch paused");
                    tracing::debug!("batch paused");
                }
                None
            }
            ControlRequest::Resume => {
                if self.paused {
                    self.paused = false;
                    self.shared.set_phase(BatchPhase::Running);
                    self.shared.transition_job(current, JobState::Paused, JobState::Running);
                    self.events.status("batch resumed");
                    tracing::debug!("batch resumed");
                }
                None
            }
            ControlRequest::Abort => Some(Directive::Abort),
            ControlRequest::StopFile(path) => {
                if path == current {
                    Some(Directive::StopFile)
                } else {
                    self.stopped.insert(path);
                    None
                }
            }
        }
    }
}
