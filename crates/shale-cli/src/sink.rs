//! File-writing listener: persists transformed bytes to disk.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use shale_pipeline::{LogFileHeader, LogListener, PipelineError};
use tracing::debug;

/// Listener that writes every delivered byte range to a single output
/// file, in delivery order.
pub struct FileSinkListener {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl FileSinkListener {
    /// Create the output file, truncating any existing content.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }
}

impl LogListener for FileSinkListener {
    fn on_file(&mut self, header: &LogFileHeader) -> Result<(), PipelineError> {
        debug!(
            source = %header.path.display(),
            sink = %self.path.display(),
            "file started"
        );
        Ok(())
    }

    fn on_data(&mut self, data: &[u8]) -> Result<(), PipelineError> {
        self.writer
            .write_all(data)
            .map_err(|e| PipelineError::Listener(e.to_string()))
    }

    fn on_file_end(&mut self, header: &LogFileHeader) -> Result<(), PipelineError> {
        debug!(source = %header.path.display(), "file ended");
        self.writer
            .flush()
            .map_err(|e| PipelineError::Listener(e.to_string()))
    }
}
