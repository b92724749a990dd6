//! Progress reporting for the silence-removal pipeline.
//!
//! The pipeline emits [`ProgressEvent`]s without knowing who listens: a CLI
//! progress line, a log, or a UI. Sends never block processing.

use hushcut_models::{PipelineStage, ProgressEvent};
use tokio::sync::mpsc;

/// Default channel capacity.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Progress sender for async contexts.
///
/// Uses a bounded channel; events are dropped when the consumer lags.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressSender {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// Send a progress event (non-blocking).
    pub fn send(&self, event: ProgressEvent) {
        let _ = self.tx.try_send(event);
    }

    /// Run-level stage change.
    pub fn stage(&self, stage: PipelineStage, total_chunks: usize, message: impl Into<String>) {
        self.send(ProgressEvent::run(stage, total_chunks, message));
    }

    /// Stage change for a single chunk.
    pub fn chunk(
        &self,
        stage: PipelineStage,
        chunk_index: usize,
        total_chunks: usize,
        message: impl Into<String>,
    ) {
        self.send(ProgressEvent::chunk(stage, chunk_index, total_chunks, message));
    }

    pub fn complete(&self, total_chunks: usize, message: impl Into<String>) {
        self.stage(PipelineStage::Complete, total_chunks, message);
    }

    /// Terminal failure, tied to the chunk that caused it when known.
    pub fn failed(
        &self,
        chunk_index: Option<usize>,
        total_chunks: usize,
        error: impl Into<String>,
    ) {
        match chunk_index {
            Some(index) => self.chunk(PipelineStage::Failed, index, total_chunks, error),
            None => self.stage(PipelineStage::Failed, total_chunks, error),
        }
    }
}

/// Progress receiver for collecting events.
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Receive the next progress event.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Try to receive a progress event without blocking.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }
}

/// Create a progress channel pair.
pub fn channel(capacity: usize) -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressSender::new(tx), ProgressReceiver { rx })
}

/// A sender whose events go nowhere.
pub fn noop_sender() -> ProgressSender {
    let (tx, _rx) = mpsc::channel(1);
    ProgressSender::new(tx)
}
