//! The delivery seam: where transformed bytes leave the pipeline.

use crate::PipelineError;
use crate::message::LogFileHeader;

/// Consumer of the pipeline's output, typically a file writer.
///
/// All callbacks are invoked on the delivery thread, synchronously and in
/// submission order: `on_file`, then zero or more `on_data` calls whose
/// concatenation is the file's transformed payload, then `on_file_end`,
/// exactly once per file. A callback error terminates the pipeline and is
/// re-raised from `close()`.
pub trait LogListener: Send {
    /// A new file begins.
    ///
    /// # Errors
    ///
    /// Any error terminates the pipeline.
    fn on_file(&mut self, header: &LogFileHeader) -> Result<(), PipelineError>;

    /// A transformed byte range of the open file.
    ///
    /// The slice is only valid for the duration of the call; the backing
    /// buffer is recycled as soon as the callback returns.
    ///
    /// # Errors
    ///
    /// Any error terminates the pipeline.
    fn on_data(&mut self, data: &[u8]) -> Result<(), PipelineError>;

    /// The open file ended, either via an end marker or implicitly by the
    /// next file's header.
    ///
    /// # Errors
    ///
    /// Any error terminates the pipeline.
    fn on_file_end(&mut self, header: &LogFileHeader) -> Result<(), PipelineError>;
}
