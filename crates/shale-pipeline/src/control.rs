//! Shared pipeline control state.
//!
//! The only mutable state visible to both stages and the caller: the
//! cancellation flag, the first-failure-wins error slot, and throughput
//! counters. Everything else in the pipeline is owned by exactly one
//! thread.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::debug;

use crate::PipelineError;

/// Termination and error state shared between the stages and the engine.
pub(crate) struct PipelineControl {
    cancelled: AtomicBool,
    error: OnceLock<PipelineError>,
    pub(crate) stats: StatsCounters,
}

impl PipelineControl {
    pub(crate) fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            error: OnceLock::new(),
            stats: StatsCounters::default(),
        }
    }

    /// Request cooperative cancellation; observed at the next retry tick.
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Record a failure. The first failure wins; later ones are dropped.
    pub(crate) fn fail(&self, error: PipelineError) {
        if let Err(discarded) = self.error.set(error) {
            debug!("secondary pipeline failure discarded: {discarded}");
        }
    }

    pub(crate) fn error(&self) -> Option<PipelineError> {
        self.error.get().cloned()
    }

    /// Whether a stage should stop looping: cancellation requested or a
    /// failure recorded by either side.
    pub(crate) fn should_stop(&self) -> bool {
        self.is_cancelled() || self.error.get().is_some()
    }
}

/// Atomic throughput counters, updated by the stages.
#[derive(Default)]
pub(crate) struct StatsCounters {
    files: AtomicU64,
    chunks: AtomicU64,
    bytes_processed: AtomicU64,
    bytes_transformed: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn add_file(&self) {
        self.files.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_chunk(&self, bytes: u64) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.bytes_processed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn add_transformed(&self, bytes: u64) {
        self.bytes_transformed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            files: self.files.load(Ordering::Relaxed),
            chunks: self.chunks.load(Ordering::Relaxed),
            bytes_processed: self.bytes_processed.load(Ordering::Relaxed),
            bytes_transformed: self.bytes_transformed.load(Ordering::Relaxed),
        }
    }
}

/// Cloneable cancellation token for a running pipeline.
///
/// Obtained from [`crate::LogEncryptionEngine::cancel_handle`]; lets any
/// thread request cancellation without holding the engine itself.
#[derive(Clone)]
pub struct CancelHandle(pub(crate) std::sync::Arc<PipelineControl>);

impl CancelHandle {
    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Snapshot of pipeline throughput counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// File headers processed by the cipher stage.
    pub files: u64,
    /// Chunks processed by the cipher stage.
    pub chunks: u64,
    /// Payload bytes that passed through the cipher stage.
    pub bytes_processed: u64,
    /// Payload bytes actually transformed (encryptable files only).
    pub bytes_transformed: u64,
}
