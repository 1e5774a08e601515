//! Structured progress reporting for knowledge base operations.
//!
//! Ingestion and deletion emit typed events through a [`ProgressReporter`].
//! A reporter either drops events, hands them to a callback, or pushes them
//! into a bounded channel; in the channel case a slow consumer holds up the
//! operation that emits.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Phase of the operation that emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// A folder container became visible in the registry
    Registered,
    /// All chunks of a single document were stored
    DocumentStored,
    /// Periodic folder ingestion progress
    FolderProgress,
    /// Folder ingestion finished
    FolderComplete,
    /// Periodic delete progress
    DeleteProgress,
    /// Delete finished
    DeleteComplete,
}

impl ProgressPhase {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::DocumentStored => "stored",
            Self::FolderProgress => "folder",
            Self::FolderComplete => "folder-done",
            Self::DeleteProgress => "delete",
            Self::DeleteComplete => "delete-done",
        }
    }
}

impl fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress event emitted during knowledge operations.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Phase of the operation
    pub phase: ProgressPhase,

    /// Source the event is about
    pub source_id: String,

    /// Current progress (files stored, groups deleted, etc.)
    pub current: u64,

    /// Total expected work (if known)
    pub total: Option<u64>,

    /// Percentage complete (0.0 - 100.0)
    pub percentage: Option<f64>,

    /// Human-readable message
    pub message: String,

    /// Elapsed time since the reporter was created
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    /// Create a new progress event.
    pub fn new(
        phase: ProgressPhase,
        source_id: impl Into<String>,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        let percentage = total.map(|t| {
            if t > 0 {
                (current as f64 / t as f64) * 100.0
            } else {
                0.0
            }
        });

        Self {
            phase,
            source_id: source_id.into(),
            current,
            total,
            percentage,
            message: message.into(),
            elapsed_secs: None,
        }
    }

    /// Set elapsed time.
    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    /// Format as a simple user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = if let Some(total) = self.total {
            format!("{}/{}", self.current, total)
        } else {
            format!("{}", self.current)
        };

        let pct = if let Some(p) = self.percentage {
            format!(" ({:.0}%)", p)
        } else {
            String::new()
        };

        format!("[{}] {}{} - {}", self.phase, progress, pct, self.message)
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

#[derive(Clone)]
enum Sink {
    Noop,
    Callback(ProgressCallback),
    Channel(mpsc::Sender<ProgressEvent>),
}

/// Progress reporter that delivers events to a sink.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Sink,
    start_time: Arc<Instant>,
}

impl ProgressReporter {
    /// Create a new reporter with a callback.
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            sink: Sink::Callback(callback),
            start_time: Arc::new(Instant::now()),
        }
    }

    /// Create a no-op reporter (no events emitted).
    pub fn noop() -> Self {
        Self {
            sink: Sink::Noop,
            start_time: Arc::new(Instant::now()),
        }
    }

    /// Create a reporter backed by a bounded channel.
    ///
    /// Emitting waits while the channel is full. Events sent after the
    /// receiver is dropped are discarded.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let reporter = Self {
            sink: Sink::Channel(tx),
            start_time: Arc::new(Instant::now()),
        };
        (reporter, rx)
    }

    /// Whether events are delivered anywhere.
    pub fn is_enabled(&self) -> bool {
        !matches!(self.sink, Sink::Noop)
    }

    /// Emit a progress event.
    pub async fn emit(&self, event: ProgressEvent) {
        if !self.is_enabled() {
            return;
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let event = event.with_elapsed(elapsed);

        tracing::debug!(
            phase = %event.phase,
            source_id = %event.source_id,
            current = event.current,
            total = ?event.total,
            message = %event.message,
            elapsed_secs = elapsed,
            "Progress event"
        );

        match &self.sink {
            Sink::Noop => {}
            Sink::Callback(callback) => callback(event),
            Sink::Channel(tx) => {
                if tx.send(event).await.is_err() {
                    tracing::debug!("Progress receiver dropped; event discarded");
                }
            }
        }
    }

    /// Emit the event for a folder container becoming visible.
    pub async fn registered(&self, source_id: &str, origin: &str) {
        self.emit(ProgressEvent::new(
            ProgressPhase::Registered,
            source_id,
            0,
            None,
            format!("registered {}", origin),
        ))
        .await;
    }

    /// Emit the event for a fully stored document.
    pub async fn document_stored(&self, source_id: &str, chunks: usize) {
        self.emit(ProgressEvent::new(
            ProgressPhase::DocumentStored,
            source_id,
            chunks as u64,
            Some(chunks as u64),
            format!("{} chunks stored", chunks),
        ))
        .await;
    }

    /// Emit periodic folder progress.
    pub async fn folder_progress(&self, source_id: &str, stored: usize, total: usize) {
        self.emit(ProgressEvent::new(
            ProgressPhase::FolderProgress,
            source_id,
            stored as u64,
            Some(total as u64),
            format!("{} files stored", stored),
        ))
        .await;
    }

    /// Emit the final folder event.
    pub async fn folder_complete(&self, source_id: &str, stored: usize, failed: usize) {
        let total = stored + failed;
        self.emit(ProgressEvent::new(
            ProgressPhase::FolderComplete,
            source_id,
            stored as u64,
            Some(total as u64),
            format!("{} files stored, {} failed", stored, failed),
        ))
        .await;
    }

    /// Emit periodic delete progress.
    pub async fn delete_progress(&self, source_id: &str, deleted: usize, total: usize) {
        self.emit(ProgressEvent::new(
            ProgressPhase::DeleteProgress,
            source_id,
            deleted as u64,
            Some(total as u64),
            format!("{} groups deleted", deleted),
        ))
        .await;
    }

    /// Emit the final delete event.
    pub async fn delete_complete(&self, source_id: &str, deleted: usize) {
        self.emit(ProgressEvent::new(
            ProgressPhase::DeleteComplete,
            source_id,
            deleted as u64,
            Some(deleted as u64),
            "deleted",
        ))
        .await;
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}
