//! # SHALE Pipeline
//!
//! Streaming block-encryption pipeline for storage-engine log files.
//!
//! Messages flow strictly one direction:
//!
//! ```text
//! caller -> input queue -> cipher stage -> output queue -> delivery stage -> listener
//! ```
//!
//! The cipher stage transforms chunk payloads in place with a stream cipher
//! whose IV is derived from the byte position within the log (see
//! `shale-crypto`); the delivery stage hands transformed messages to an
//! external [`LogListener`] and recycles payload buffers into the
//! [`BufferPool`]. The two stages run on dedicated threads connected by
//! bounded queues, so cipher computation overlaps delivery I/O while
//! backpressure bounds memory use.
//!
//! Control flows backwards through shared state: a cancellation flag and a
//! first-failure-wins error slot, both observed by each stage on every
//! queue-retry tick. Messages are delivered to the listener in exactly the
//! order they were submitted.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod listener;
pub mod message;
pub mod pool;

mod cipher_stage;
mod control;
mod delivery_stage;
mod queue;

pub use config::EngineConfig;
pub use control::{CancelHandle, PipelineStats};
pub use engine::LogEncryptionEngine;
pub use error::PipelineError;
pub use listener::LogListener;
pub use message::{FileChunk, LogFileHeader, LogMessage};
pub use pool::{BufferPool, PoolBuffer};

use std::time::Duration;

/// Default payload buffer size (1 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Default capacity of each hand-off queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 40;

/// Default tick for queue put/poll retries; each tick re-checks the
/// cancellation flag and the recorded error.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Extra buffers beyond the combined queue capacities, covering buffers
/// being filled by the caller or held inside a stage between queues.
pub const POOL_HEADROOM: usize = 4;
