//! Engine configuration.

use std::time::Duration;

use shale_crypto::CipherKey;

use crate::{
    DEFAULT_BUFFER_SIZE, DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY, POOL_HEADROOM,
    PipelineError,
};

/// Construction parameters for a [`crate::LogEncryptionEngine`].
///
/// `block_alignment` is the storage engine's log block size: the number of
/// payload bytes covered by one derived IV when a file uses block-chained
/// IVs, and the divisor mapping a file handle to its initial block index.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Encryption key shared by every file in the stream.
    pub key: CipherKey,
    /// Bytes per cipher-rekeying block, supplied by the storage engine.
    pub block_alignment: u64,
    /// Size of each pooled payload buffer.
    pub buffer_size: usize,
    /// Capacity of each hand-off queue.
    pub queue_capacity: usize,
    /// Tick for queue and pool retries; bounds how long a stage can go
    /// without observing cancellation.
    pub poll_interval: Duration,
}

impl EngineConfig {
    /// Create a configuration with default buffer and queue sizing.
    #[must_use]
    pub fn new(key: CipherKey, block_alignment: u64) -> Self {
        Self {
            key,
            block_alignment,
            buffer_size: DEFAULT_BUFFER_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the pooled buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the capacity of each hand-off queue.
    #[must_use]
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Set the retry tick.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Buffers the pool must hold to cover everything that can be in
    /// flight: both queues full, plus headroom for buffers being filled by
    /// the caller or held inside a stage.
    #[must_use]
    pub fn pool_capacity(&self) -> usize {
        2 * self.queue_capacity + POOL_HEADROOM
    }

    pub(crate) fn validate(&self) -> Result<(), PipelineError> {
        if self.block_alignment == 0 {
            return Err(PipelineError::InvalidConfig(
                "block_alignment must be nonzero".into(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "buffer_size must be nonzero".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::InvalidConfig(
                "queue_capacity must be nonzero".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(PipelineError::InvalidConfig(
                "poll_interval must be nonzero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CipherKey {
        CipherKey::new([1u8; 32])
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new(key(), 8192);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_capacity_covers_both_queues() {
        let config = EngineConfig::new(key(), 8192).with_queue_capacity(10);
        assert_eq!(config.pool_capacity(), 24);
    }

    #[test]
    fn test_zero_alignment_rejected() {
        let config = EngineConfig::new(key(), 0);
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let config = EngineConfig::new(key(), 8192).with_queue_capacity(0);
        assert!(config.validate().is_err());
    }
}
