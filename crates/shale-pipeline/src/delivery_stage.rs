//! Delivery stage: the consumer half of the pipeline.
//!
//! Consumes transformed messages from the output queue, drives the
//! listener callbacks in submission order, and recycles payload buffers.
//! Owns the "current file" reference used to enforce the sequencing
//! invariant.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::debug;

use crate::PipelineError;
use crate::control::PipelineControl;
use crate::listener::LogListener;
use crate::message::{LogFileHeader, LogMessage};
use crate::queue::{self, Polled};

pub(crate) struct DeliveryStage {
    listener: Box<dyn LogListener>,
    current: Option<Arc<LogFileHeader>>,
    tick: Duration,
    control: Arc<PipelineControl>,
}

impl DeliveryStage {
    pub(crate) fn new(
        listener: Box<dyn LogListener>,
        tick: Duration,
        control: Arc<PipelineControl>,
    ) -> Self {
        Self {
            listener,
            current: None,
            tick,
            control,
        }
    }

    /// Thread body. Exits on cancellation, a recorded error, or a drained
    /// and disconnected output queue.
    pub(crate) fn run(mut self, output: Receiver<LogMessage>) {
        debug!("delivery stage started");
        loop {
            match queue::poll(&output, &self.control, self.tick) {
                Polled::Stopped | Polled::Drained => break,
                Polled::Message(message) => {
                    if let Err(error) = self.deliver(message) {
                        self.control.fail(error);
                        break;
                    }
                }
            }
        }
        debug!("delivery stage exiting");
    }

    fn deliver(&mut self, message: LogMessage) -> Result<(), PipelineError> {
        match message {
            LogMessage::FileHeader(header) => {
                // A header without a preceding end marker implicitly closes
                // the previous file.
                if let Some(previous) = self.current.take() {
                    self.listener.on_file_end(&previous)?;
                }
                self.listener.on_file(&header)?;
                self.current = Some(header);
            }
            LogMessage::FileChunk(chunk) => {
                let current = self
                    .current
                    .as_ref()
                    .ok_or(PipelineError::ChunkWithoutFile)?;
                if **chunk.header() != **current {
                    return Err(PipelineError::HeaderMismatch {
                        expected: current.path.clone(),
                        actual: chunk.header().path.clone(),
                    });
                }
                self.listener.on_data(chunk.payload())?;
                // The chunk drops here, returning its buffer to the pool.
            }
            LogMessage::EndChunk => {
                if let Some(header) = self.current.take() {
                    self.listener.on_file_end(&header)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::FileChunk;
    use crate::pool::BufferPool;

    #[derive(Debug, PartialEq, Eq)]
    enum Event {
        File(String),
        Data(Vec<u8>),
        FileEnd(String),
    }

    #[derive(Default)]
    struct Recorder {
        events: std::sync::Arc<std::sync::Mutex<Vec<Event>>>,
    }

    impl LogListener for Recorder {
        fn on_file(&mut self, header: &LogFileHeader) -> Result<(), PipelineError> {
            self.events
                .lock()
                .unwrap()
                .push(Event::File(header.path.display().to_string()));
            Ok(())
        }

        fn on_data(&mut self, data: &[u8]) -> Result<(), PipelineError> {
            self.events.lock().unwrap().push(Event::Data(data.to_vec()));
            Ok(())
        }

        fn on_file_end(&mut self, header: &LogFileHeader) -> Result<(), PipelineError> {
            self.events
                .lock()
                .unwrap()
                .push(Event::FileEnd(header.path.display().to_string()));
            Ok(())
        }
    }

    fn stage_with_recorder() -> (DeliveryStage, std::sync::Arc<std::sync::Mutex<Vec<Event>>>) {
        let recorder = Recorder::default();
        let events = std::sync::Arc::clone(&recorder.events);
        let stage = DeliveryStage::new(
            Box::new(recorder),
            Duration::from_millis(10),
            Arc::new(PipelineControl::new()),
        );
        (stage, events)
    }

    fn chunk(header: &Arc<LogFileHeader>, payload: &[u8]) -> FileChunk {
        let pool = BufferPool::new(64, 1);
        let mut buffer = pool.try_alloc().unwrap();
        buffer[..payload.len()].copy_from_slice(payload);
        FileChunk::new(Arc::clone(header), buffer, payload.len()).unwrap()
    }

    #[test]
    fn test_file_lifecycle_events_in_order() {
        let (mut stage, events) = stage_with_recorder();
        let header = Arc::new(LogFileHeader::new(0, "a.log", true, true));

        stage
            .deliver(LogMessage::FileHeader(Arc::clone(&header)))
            .unwrap();
        stage
            .deliver(LogMessage::FileChunk(chunk(&header, b"bytes")))
            .unwrap();
        stage.deliver(LogMessage::EndChunk).unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                Event::File("a.log".into()),
                Event::Data(b"bytes".to_vec()),
                Event::FileEnd("a.log".into()),
            ]
        );
    }

    #[test]
    fn test_new_header_implicitly_closes_open_file() {
        let (mut stage, events) = stage_with_recorder();
        let first = Arc::new(LogFileHeader::new(0, "first.log", true, true));
        let second = Arc::new(LogFileHeader::new(64, "second.log", true, true));

        stage.deliver(LogMessage::FileHeader(first)).unwrap();
        stage.deliver(LogMessage::FileHeader(second)).unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                Event::File("first.log".into()),
                Event::FileEnd("first.log".into()),
                Event::File("second.log".into()),
            ]
        );
    }

    #[test]
    fn test_chunk_for_wrong_file_is_fatal() {
        let (mut stage, _events) = stage_with_recorder();
        let open = Arc::new(LogFileHeader::new(0, "open.log", true, true));
        let other = Arc::new(LogFileHeader::new(0, "other.log", true, true));

        stage.deliver(LogMessage::FileHeader(open)).unwrap();
        let result = stage.deliver(LogMessage::FileChunk(chunk(&other, b"x")));

        assert!(matches!(
            result,
            Err(PipelineError::HeaderMismatch { .. })
        ));
    }

    #[test]
    fn test_chunk_without_open_file_is_fatal() {
        let (mut stage, _events) = stage_with_recorder();
        let header = Arc::new(LogFileHeader::new(0, "a.log", true, true));

        let result = stage.deliver(LogMessage::FileChunk(chunk(&header, b"x")));
        assert!(matches!(result, Err(PipelineError::ChunkWithoutFile)));
    }

    #[test]
    fn test_end_marker_without_open_file_is_ignored() {
        let (mut stage, events) = stage_with_recorder();
        stage.deliver(LogMessage::EndChunk).unwrap();
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_equal_reconstructed_header_is_accepted() {
        // The sequencing check is structural, not identity-based.
        let (mut stage, _events) = stage_with_recorder();
        let original = Arc::new(LogFileHeader::new(0, "a.log", true, true));
        let reconstructed = Arc::new(LogFileHeader::new(0, "a.log", true, true));

        stage.deliver(LogMessage::FileHeader(original)).unwrap();
        stage
            .deliver(LogMessage::FileChunk(chunk(&reconstructed, b"x")))
            .unwrap();
    }
}
