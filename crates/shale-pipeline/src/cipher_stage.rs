//! Cipher stage: the producer half of the pipeline.
//!
//! Consumes raw messages from the input queue, transforms chunk payloads
//! in place, and forwards everything to the output queue. The cipher block
//! position (`block_index`, `block_offset`) is owned exclusively by this
//! thread.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use shale_crypto::{CipherKey, StreamCipher, derive_block_iv};
use tracing::debug;

use crate::PipelineError;
use crate::control::PipelineControl;
use crate::message::{FileChunk, LogFileHeader, LogMessage};
use crate::queue::{self, Polled};

pub(crate) struct CipherStage {
    cipher: Box<dyn StreamCipher + Send>,
    key: CipherKey,
    block_alignment: u64,
    tick: Duration,
    control: Arc<PipelineControl>,
    block_index: u64,
    block_offset: u64,
    file_open: bool,
}

impl CipherStage {
    pub(crate) fn new(
        cipher: Box<dyn StreamCipher + Send>,
        key: CipherKey,
        block_alignment: u64,
        tick: Duration,
        control: Arc<PipelineControl>,
    ) -> Self {
        Self {
            cipher,
            key,
            block_alignment,
            tick,
            control,
            block_index: 0,
            block_offset: 0,
            file_open: false,
        }
    }

    /// Thread body. Exits on cancellation, a recorded error, or a drained
    /// and disconnected input queue; dropping `output` on exit signals the
    /// delivery stage that no more messages are coming.
    pub(crate) fn run(mut self, input: Receiver<LogMessage>, output: Sender<LogMessage>) {
        debug!("cipher stage started");
        loop {
            match queue::poll(&input, &self.control, self.tick) {
                Polled::Stopped | Polled::Drained => break,
                Polled::Message(message) => {
                    let message = match self.process(message) {
                        Ok(message) => message,
                        Err(error) => {
                            self.control.fail(error);
                            break;
                        }
                    };
                    match queue::put(&output, message, &self.control, self.tick) {
                        Ok(()) => {}
                        Err(PipelineError::Cancelled) => break,
                        Err(error) => {
                            self.control.fail(error);
                            break;
                        }
                    }
                }
            }
        }
        debug!("cipher stage exiting");
    }

    fn process(&mut self, message: LogMessage) -> Result<LogMessage, PipelineError> {
        match message {
            LogMessage::FileHeader(header) => {
                self.open_file(&header)?;
                Ok(LogMessage::FileHeader(header))
            }
            LogMessage::FileChunk(mut chunk) => {
                self.transform(&mut chunk)?;
                Ok(LogMessage::FileChunk(chunk))
            }
            LogMessage::EndChunk => Ok(LogMessage::EndChunk),
        }
    }

    fn open_file(&mut self, header: &LogFileHeader) -> Result<(), PipelineError> {
        self.block_offset = 0;
        self.block_index = header.handle / self.block_alignment;
        let iv = derive_block_iv(&self.key, self.block_index);
        self.cipher.reinit(&self.key, &iv)?;
        self.file_open = true;
        self.control.stats.add_file();
        debug!(
            handle = header.handle,
            path = %header.path.display(),
            block = self.block_index,
            "file opened"
        );
        Ok(())
    }

    fn transform(&mut self, chunk: &mut FileChunk) -> Result<(), PipelineError> {
        self.control.stats.add_chunk(chunk.len() as u64);

        let encryptable = chunk.header().encryptable;
        let chunked_iv = chunk.header().chunked_iv;
        if !encryptable {
            return Ok(());
        }
        if !self.file_open {
            return Err(PipelineError::ChunkWithoutFile);
        }

        let payload = chunk.payload_mut();
        if chunked_iv {
            // Each log block has its own IV: transform up to the next block
            // boundary, then rekey and reset the offset.
            let mut pos = 0;
            while pos < payload.len() {
                let span = (self.block_alignment - self.block_offset)
                    .min((payload.len() - pos) as u64) as usize;
                self.cipher.apply(&mut payload[pos..pos + span]);
                pos += span;
                self.block_offset += span as u64;

                if self.block_offset == self.block_alignment {
                    self.block_index += 1;
                    self.block_offset = 0;
                    let iv = derive_block_iv(&self.key, self.block_index);
                    self.cipher.reinit(&self.key, &iv)?;
                }
            }
        } else {
            self.cipher.apply(payload);
            self.block_offset += payload.len() as u64;
        }

        self.control.stats.add_transformed(chunk.len() as u64);
        Ok(())
    }
}
