//! The engine: owns the stage threads, queues, pool, and control state.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded};
use shale_crypto::{ChaCha20Provider, CipherProvider};
use tracing::{error, info};

use std::sync::Arc;

use crate::PipelineError;
use crate::cipher_stage::CipherStage;
use crate::config::EngineConfig;
use crate::control::{CancelHandle, PipelineControl, PipelineStats};
use crate::delivery_stage::DeliveryStage;
use crate::listener::LogListener;
use crate::message::LogMessage;
use crate::pool::{BufferPool, PoolBuffer};
use crate::queue;

/// Streaming log-encryption engine.
///
/// Single-use: construct, [`start`](Self::start) exactly once, submit the
/// message stream, then either [`close`](Self::close) for a graceful drain
/// or [`cancel`](Self::cancel) followed by `close` to abort. Errors
/// recorded by either stage surface from `close` (and fail subsequent
/// `submit`/`alloc` calls early).
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use shale_crypto::CipherKey;
/// use shale_pipeline::{
///     EngineConfig, FileChunk, LogEncryptionEngine, LogFileHeader, LogListener, LogMessage,
///     PipelineError,
/// };
///
/// struct Discard;
/// impl LogListener for Discard {
///     fn on_file(&mut self, _: &LogFileHeader) -> Result<(), PipelineError> { Ok(()) }
///     fn on_data(&mut self, _: &[u8]) -> Result<(), PipelineError> { Ok(()) }
///     fn on_file_end(&mut self, _: &LogFileHeader) -> Result<(), PipelineError> { Ok(()) }
/// }
///
/// # fn main() -> Result<(), PipelineError> {
/// let config = EngineConfig::new(CipherKey::new([0u8; 32]), 8192);
/// let mut engine = LogEncryptionEngine::new(config, Box::new(Discard))?;
/// engine.start()?;
///
/// let header = Arc::new(LogFileHeader::new(0, "store/tx.log", true, true));
/// engine.submit(LogMessage::FileHeader(Arc::clone(&header)))?;
///
/// let mut buffer = engine.alloc()?;
/// buffer[..4].copy_from_slice(b"data");
/// engine.submit(LogMessage::FileChunk(FileChunk::new(header, buffer, 4)?))?;
/// engine.submit(LogMessage::EndChunk)?;
///
/// let stats = engine.close()?;
/// assert_eq!(stats.files, 1);
/// # Ok(())
/// # }
/// ```
pub struct LogEncryptionEngine {
    config: EngineConfig,
    pool: BufferPool,
    control: Arc<PipelineControl>,
    provider: Box<dyn CipherProvider>,
    listener: Option<Box<dyn LogListener>>,
    input_tx: Option<Sender<LogMessage>>,
    input_rx: Option<Receiver<LogMessage>>,
    cipher_thread: Option<JoinHandle<()>>,
    delivery_thread: Option<JoinHandle<()>>,
}

impl LogEncryptionEngine {
    /// Create an engine with the default ChaCha20 cipher.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidConfig` for a rejected configuration.
    pub fn new(
        config: EngineConfig,
        listener: Box<dyn LogListener>,
    ) -> Result<Self, PipelineError> {
        Self::with_provider(config, Box::new(ChaCha20Provider), listener)
    }

    /// Create an engine with a custom cipher provider.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidConfig` for a rejected configuration.
    pub fn with_provider(
        config: EngineConfig,
        provider: Box<dyn CipherProvider>,
        listener: Box<dyn LogListener>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let pool = BufferPool::new(config.buffer_size, config.pool_capacity());
        let (input_tx, input_rx) = bounded(config.queue_capacity);

        Ok(Self {
            config,
            pool,
            control: Arc::new(PipelineControl::new()),
            provider,
            listener: Some(listener),
            input_tx: Some(input_tx),
            input_rx: Some(input_rx),
            cipher_thread: None,
            delivery_thread: None,
        })
    }

    /// Spawn the two stage threads. Call exactly once.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::AlreadyStarted` on a second call.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        let input_rx = self.input_rx.take().ok_or(PipelineError::AlreadyStarted)?;
        let listener = self.listener.take().ok_or(PipelineError::AlreadyStarted)?;
        let (output_tx, output_rx) = bounded(self.config.queue_capacity);

        let cipher = CipherStage::new(
            self.provider.new_cipher(),
            self.config.key.clone(),
            self.config.block_alignment,
            self.config.poll_interval,
            Arc::clone(&self.control),
        );
        let cipher_thread = thread::Builder::new()
            .name("shale-cipher".into())
            .spawn(move || cipher.run(input_rx, output_tx))
            .expect("failed to spawn cipher stage thread");

        let delivery = DeliveryStage::new(
            listener,
            self.config.poll_interval,
            Arc::clone(&self.control),
        );
        let delivery_thread = thread::Builder::new()
            .name("shale-deliver".into())
            .spawn(move || delivery.run(output_rx))
            .expect("failed to spawn delivery stage thread");

        self.cipher_thread = Some(cipher_thread);
        self.delivery_thread = Some(delivery_thread);
        info!(
            queue_capacity = self.config.queue_capacity,
            block_alignment = self.config.block_alignment,
            "pipeline started"
        );
        Ok(())
    }

    /// Obtain a payload buffer, blocking while the pool is exhausted.
    ///
    /// # Errors
    ///
    /// Fails fast with the recorded pipeline error, or with
    /// `PipelineError::Cancelled` after [`cancel`](Self::cancel).
    pub fn alloc(&self) -> Result<PoolBuffer, PipelineError> {
        loop {
            if let Some(error) = self.control.error() {
                return Err(error);
            }
            if self.control.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            if let Some(buffer) = self.pool.alloc_timeout(self.config.poll_interval) {
                return Ok(buffer);
            }
        }
    }

    /// Enqueue a message, blocking while the input queue is full.
    ///
    /// # Errors
    ///
    /// Fails fast with the recorded pipeline error rather than retrying
    /// forever; also fails with `PipelineError::Cancelled` after
    /// [`cancel`](Self::cancel).
    pub fn submit(&self, message: LogMessage) -> Result<(), PipelineError> {
        let input_tx = self
            .input_tx
            .as_ref()
            .ok_or(PipelineError::QueueClosed)?;
        queue::put(input_tx, message, &self.control, self.config.poll_interval)
    }

    /// Request cooperative cancellation.
    ///
    /// Both stages exit at their next retry tick; messages still queued
    /// are dropped (their buffers recycle into the pool). This is an
    /// abort, not a flush.
    pub fn cancel(&self) {
        info!("pipeline cancellation requested");
        self.control.cancel();
    }

    /// Graceful shutdown: drain both stages, join their threads, and
    /// surface the first recorded error, if any.
    ///
    /// Closing the input queue lets the cipher stage finish its backlog
    /// and exit; its output queue closing in turn drains the delivery
    /// stage. After [`cancel`](Self::cancel) the stages exit promptly
    /// instead of draining.
    ///
    /// # Errors
    ///
    /// The first error recorded by either stage (or during submission),
    /// or `PipelineError::NotStarted` if `start` was never called.
    pub fn close(mut self) -> Result<PipelineStats, PipelineError> {
        drop(self.input_tx.take());

        let Some(cipher_thread) = self.cipher_thread.take() else {
            return Err(PipelineError::NotStarted);
        };
        if cipher_thread.join().is_err() {
            error!("cipher stage thread panicked");
            self.control.fail(PipelineError::StagePanicked);
        }

        if let Some(delivery_thread) = self.delivery_thread.take() {
            if delivery_thread.join().is_err() {
                error!("delivery stage thread panicked");
                self.control.fail(PipelineError::StagePanicked);
            }
        }

        if let Some(error) = self.control.error() {
            return Err(error);
        }

        let stats = self.control.stats.snapshot();
        info!(
            files = stats.files,
            chunks = stats.chunks,
            bytes = stats.bytes_processed,
            "pipeline closed"
        );
        Ok(stats)
    }

    /// Snapshot of the throughput counters.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        self.control.stats.snapshot()
    }

    /// A cloneable cancellation token for this pipeline.
    ///
    /// Useful when the thread feeding `submit` is not the one deciding to
    /// abort.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.control))
    }

    /// Handle to the buffer pool, for accounting and diagnostics.
    #[must_use]
    pub fn buffer_pool(&self) -> BufferPool {
        self.pool.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FileChunk, LogFileHeader};
    use shale_crypto::CipherKey;
    use std::sync::Mutex;
    use std::time::Duration;

    fn config() -> EngineConfig {
        EngineConfig::new(CipherKey::new([9u8; 32]), 64)
            .with_buffer_size(256)
            .with_queue_capacity(4)
            .with_poll_interval(Duration::from_millis(10))
    }

    #[derive(Default)]
    struct CountingListener {
        counts: Arc<Mutex<(usize, usize, usize)>>,
    }

    impl LogListener for CountingListener {
        fn on_file(&mut self, _: &LogFileHeader) -> Result<(), PipelineError> {
            self.counts.lock().unwrap().0 += 1;
            Ok(())
        }
        fn on_data(&mut self, _: &[u8]) -> Result<(), PipelineError> {
            self.counts.lock().unwrap().1 += 1;
            Ok(())
        }
        fn on_file_end(&mut self, _: &LogFileHeader) -> Result<(), PipelineError> {
            self.counts.lock().unwrap().2 += 1;
            Ok(())
        }
    }

    #[test]
    fn test_start_twice_is_an_error() {
        let mut engine =
            LogEncryptionEngine::new(config(), Box::new(CountingListener::default())).unwrap();
        engine.start().unwrap();
        assert!(matches!(
            engine.start(),
            Err(PipelineError::AlreadyStarted)
        ));
        engine.close().unwrap();
    }

    #[test]
    fn test_close_without_start_is_an_error() {
        let engine =
            LogEncryptionEngine::new(config(), Box::new(CountingListener::default())).unwrap();
        assert!(matches!(engine.close(), Err(PipelineError::NotStarted)));
    }

    #[test]
    fn test_submit_after_cancel_fails() {
        let mut engine =
            LogEncryptionEngine::new(config(), Box::new(CountingListener::default())).unwrap();
        engine.start().unwrap();
        engine.cancel();

        let result = engine.submit(LogMessage::EndChunk);
        assert!(matches!(result, Err(PipelineError::Cancelled)));
        engine.close().unwrap();
    }

    #[test]
    fn test_alloc_after_cancel_fails() {
        let mut engine =
            LogEncryptionEngine::new(config(), Box::new(CountingListener::default())).unwrap();
        engine.start().unwrap();
        engine.cancel();
        assert!(matches!(engine.alloc(), Err(PipelineError::Cancelled)));
        engine.close().unwrap();
    }

    #[test]
    fn test_happy_path_counts_and_stats() {
        let listener = CountingListener::default();
        let counts = Arc::clone(&listener.counts);

        let mut engine = LogEncryptionEngine::new(config(), Box::new(listener)).unwrap();
        engine.start().unwrap();

        let header = Arc::new(LogFileHeader::new(0, "tx.log", true, true));
        engine
            .submit(LogMessage::FileHeader(Arc::clone(&header)))
            .unwrap();
        let mut buffer = engine.alloc().unwrap();
        buffer[..3].copy_from_slice(b"abc");
        engine
            .submit(LogMessage::FileChunk(
                FileChunk::new(header, buffer, 3).unwrap(),
            ))
            .unwrap();
        engine.submit(LogMessage::EndChunk).unwrap();

        let stats = engine.close().unwrap();
        assert_eq!(stats.files, 1);
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.bytes_processed, 3);
        assert_eq!(*counts.lock().unwrap(), (1, 1, 1));
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let config = EngineConfig::new(CipherKey::new([0u8; 32]), 0);
        assert!(matches!(
            LogEncryptionEngine::new(config, Box::new(CountingListener::default())),
            Err(PipelineError::InvalidConfig(_))
        ));
    }
}
