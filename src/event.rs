//! Batch event channel.
//!
//! Carries progress, status, error, and busy notifications from the worker
//! to any number of observers. Built on a broadcast channel: sends never
//! wait, every subscriber sees events in emission order, and a consumer
//! that falls more than [`EVENT_CAPACITY`](crate::config::EVENT_CAPACITY)
//! events behind lags and skips instead of stalling the worker.
//!
//! Per-file ordering guarantee: `Progress` amounts are non-decreasing and
//! the `FileDone` terminal event is the last event referencing a path.

use std::path::{Path, PathBuf};

use strum::Display;
use tokio::sync::broadcast;

use crate::config::EVENT_CAPACITY;

/// Terminal outcome of one file job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FileOutcome {
    Completed,
    Failed,
    Stopped,
    Aborted,
}

/// Notification emitted by the batch worker.
#[derive(Debug, Clone)]
pub enum Event {
    /// Bytes of the input consumed so far for one file.
    Progress { path: PathBuf, bytes_processed: u64, total_bytes: u64 },

    /// Human-readable batch status line.
    Status { text: String },

    /// Human-readable failure description for one file.
    Error { path: PathBuf, text: String },

    /// Terminal event for one file; always the last event for its path.
    FileDone { path: PathBuf, outcome: FileOutcome },

    /// Batch busy flag changed; `false` only once every job is terminal.
    BusyChanged { busy: bool },
}

/// Fan-out sender handle for [`Event`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Opens a new subscription; only events emitted after this call are
    /// delivered to it.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Emits an event to all current subscribers, never blocking.
    pub fn emit(&self, event: Event) {
        // A send with no live subscriber is not an error for the worker.
        let _ = self.tx.send(event);
    }

    pub fn progress(&self, path: &Path, bytes_processed: u64, total_bytes: u64) {
        self.emit(Event::Progress { path: path.to_owned(), bytes_processed, total_bytes });
    }

    pub fn status(&self, text: impl Into<String>) {
        self.emit(Event::Status { text: text.into() });
    }

    pub fn error(&self, path: &Path, text: impl Into<String>) {
        self.emit(Event::Error { path: path.to_owned(), text: text.into() });
    }

    pub fn file_done(&self, path: &Path, outcome: FileOutcome) {
        self.emit(Event::FileDone { path: path.to_owned(), outcome });
    }

    pub fn busy(&self, busy: bool) {
        self.emit(Event::BusyChanged { busy });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}
