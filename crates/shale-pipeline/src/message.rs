//! Messages flowing through the pipeline.
//!
//! A correctly produced stream is, per file:
//!
//! ```text
//! FileHeader -> FileChunk* -> EndChunk
//! ```
//!
//! A new header implicitly closes the previous file, so the end marker may
//! be omitted, but a chunk whose header is not the open file is stream
//! corruption and fails the pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use crate::pool::PoolBuffer;
use crate::PipelineError;

/// Identity of a logical log file being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileHeader {
    /// Byte address of the file within the log; the initial cipher block
    /// index is `handle / block_alignment`.
    pub handle: u64,
    /// Path identifying the file.
    pub path: PathBuf,
    /// Whether chunk payloads of this file are transformed at all.
    pub encryptable: bool,
    /// Whether the IV is re-derived at every log block boundary rather
    /// than held constant for the whole file.
    pub chunked_iv: bool,
}

impl LogFileHeader {
    /// Create a header.
    #[must_use]
    pub fn new(handle: u64, path: impl Into<PathBuf>, encryptable: bool, chunked_iv: bool) -> Self {
        Self {
            handle,
            path: path.into(),
            encryptable,
            chunked_iv,
        }
    }
}

/// A message in the pipeline stream.
#[derive(Debug)]
pub enum LogMessage {
    /// Opens a file; implicitly closes the previously open one.
    FileHeader(Arc<LogFileHeader>),
    /// A payload chunk of the open file.
    FileChunk(FileChunk),
    /// Marks the end of the open file's chunk stream.
    EndChunk,
}

/// A payload chunk: a pool-owned buffer and the number of valid bytes.
#[derive(Debug)]
pub struct FileChunk {
    header: Arc<LogFileHeader>,
    buffer: PoolBuffer,
    len: usize,
}

impl FileChunk {
    /// Create a chunk over the first `len` bytes of `buffer`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ChunkTooLarge` if `len` exceeds the buffer
    /// capacity.
    pub fn new(
        header: Arc<LogFileHeader>,
        buffer: PoolBuffer,
        len: usize,
    ) -> Result<Self, PipelineError> {
        if len > buffer.capacity() {
            return Err(PipelineError::ChunkTooLarge {
                len,
                capacity: buffer.capacity(),
            });
        }
        Ok(Self {
            header,
            buffer,
            len,
        })
    }

    /// The header of the file this chunk belongs to.
    #[must_use]
    pub fn header(&self) -> &Arc<LogFileHeader> {
        &self.header
    }

    /// Number of valid payload bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the chunk carries no payload bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The valid payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Mutable view of the valid payload bytes, for in-place transforms.
    pub(crate) fn payload_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut self.buffer[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::BufferPool;

    fn header() -> Arc<LogFileHeader> {
        Arc::new(LogFileHeader::new(0, "store/neostore.log", true, true))
    }

    #[test]
    fn test_chunk_len_within_capacity() {
        let pool = BufferPool::new(32, 1);
        let buffer = pool.try_alloc().unwrap();
        let chunk = FileChunk::new(header(), buffer, 32).unwrap();
        assert_eq!(chunk.len(), 32);
        assert_eq!(chunk.payload().len(), 32);
    }

    #[test]
    fn test_chunk_len_over_capacity_rejected() {
        let pool = BufferPool::new(32, 1);
        let buffer = pool.try_alloc().unwrap();
        let result = FileChunk::new(header(), buffer, 33);
        assert!(matches!(
            result,
            Err(PipelineError::ChunkTooLarge {
                len: 33,
                capacity: 32
            })
        ));
    }

    #[test]
    fn test_dropping_chunk_recycles_buffer() {
        let pool = BufferPool::new(32, 1);
        let buffer = pool.try_alloc().unwrap();
        let chunk = FileChunk::new(header(), buffer, 4).unwrap();
        assert_eq!(pool.available(), 0);

        drop(chunk);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_header_equality_is_structural() {
        let a = LogFileHeader::new(128, "store/index.log", true, false);
        let b = LogFileHeader::new(128, "store/index.log", true, false);
        let c = LogFileHeader::new(128, "store/other.log", true, false);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
