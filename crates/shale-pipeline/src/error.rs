//! Pipeline error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the log-encryption pipeline.
///
/// A failure inside either stage is recorded in a first-failure-wins slot
/// and terminates the pipeline; `close()` re-raises it to the caller, and
/// `submit`/`alloc` fail fast once it is set. The enum is `Clone` so the
/// one recorded error can be handed to every caller that observes it.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Cipher or IV failure inside the cipher stage.
    #[error("crypto error: {0}")]
    Crypto(#[from] shale_crypto::CryptoError),

    /// A chunk was delivered for a header that is not the open file.
    #[error("chunk for {actual:?} does not match open file {expected:?}")]
    HeaderMismatch {
        /// Path of the file currently open in the stream.
        expected: PathBuf,
        /// Path carried by the offending chunk's header.
        actual: PathBuf,
    },

    /// A chunk arrived before any file header.
    #[error("file chunk received before any file header")]
    ChunkWithoutFile,

    /// Chunk length exceeds its buffer capacity.
    #[error("chunk length {len} exceeds buffer capacity {capacity}")]
    ChunkTooLarge {
        /// Claimed valid length.
        len: usize,
        /// Capacity of the backing buffer.
        capacity: usize,
    },

    /// No buffer available without blocking.
    #[error("buffer pool exhausted")]
    PoolExhausted,

    /// A queue endpoint disconnected while messages were still flowing.
    #[error("pipeline queue closed")]
    QueueClosed,

    /// The pipeline was cancelled.
    #[error("pipeline cancelled")]
    Cancelled,

    /// `start()` was called more than once.
    #[error("engine already started")]
    AlreadyStarted,

    /// The engine was used before `start()`.
    #[error("engine not started")]
    NotStarted,

    /// A stage thread terminated abnormally.
    #[error("pipeline stage panicked")]
    StagePanicked,

    /// A listener callback failed.
    #[error("listener error: {0}")]
    Listener(String),

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
