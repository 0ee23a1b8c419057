//! Bounded hand-off queues with flag-checking retries.
//!
//! Both put and poll use a short timeout and loop, so a stage blocked on a
//! full or empty queue still observes cancellation and recorded errors
//! within one tick. Graceful completion is signaled by dropping the sender
//! side: a disconnected, drained queue is a clean end of input, not a
//! failure.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use crate::PipelineError;
use crate::control::PipelineControl;

/// Outcome of polling a queue.
pub(crate) enum Polled<T> {
    /// A message was received.
    Message(T),
    /// The sender disconnected and every queued message has been drained.
    Drained,
    /// Cancellation or a recorded error ended the loop.
    Stopped,
}

/// Receive with timeout-retry, re-checking control state every tick.
pub(crate) fn poll<T>(rx: &Receiver<T>, control: &PipelineControl, tick: Duration) -> Polled<T> {
    loop {
        if control.should_stop() {
            return Polled::Stopped;
        }
        match rx.recv_timeout(tick) {
            Ok(message) => return Polled::Message(message),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Polled::Drained,
        }
    }
}

/// Send with timeout-retry, failing fast once the pipeline is stopping.
///
/// Returns the recorded error if one exists, `Cancelled` under
/// cancellation, and `QueueClosed` if the receiver is gone.
pub(crate) fn put<T>(
    tx: &Sender<T>,
    mut message: T,
    control: &PipelineControl,
    tick: Duration,
) -> Result<(), PipelineError> {
    loop {
        if let Some(error) = control.error() {
            return Err(error);
        }
        if control.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        match tx.send_timeout(message, tick) {
            Ok(()) => return Ok(()),
            Err(SendTimeoutError::Timeout(returned)) => message = returned,
            Err(SendTimeoutError::Disconnected(_)) => return Err(PipelineError::QueueClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    const TICK: Duration = Duration::from_millis(10);

    #[test]
    fn test_put_then_poll() {
        let control = PipelineControl::new();
        let (tx, rx) = bounded(1);

        put(&tx, 7u32, &control, TICK).unwrap();
        assert!(matches!(poll(&rx, &control, TICK), Polled::Message(7)));
    }

    #[test]
    fn test_poll_stops_on_cancel() {
        let control = PipelineControl::new();
        let (_tx, rx) = bounded::<u32>(1);

        control.cancel();
        assert!(matches!(poll(&rx, &control, TICK), Polled::Stopped));
    }

    #[test]
    fn test_poll_drains_before_disconnect() {
        let control = PipelineControl::new();
        let (tx, rx) = bounded(2);
        tx.send(1u32).unwrap();
        tx.send(2u32).unwrap();
        drop(tx);

        assert!(matches!(poll(&rx, &control, TICK), Polled::Message(1)));
        assert!(matches!(poll(&rx, &control, TICK), Polled::Message(2)));
        assert!(matches!(poll(&rx, &control, TICK), Polled::Drained));
    }

    #[test]
    fn test_put_fails_fast_on_recorded_error() {
        let control = PipelineControl::new();
        let (tx, rx) = bounded(1);
        tx.send(0u32).unwrap(); // fill the queue so send would block

        control.fail(PipelineError::ChunkWithoutFile);
        let result = put(&tx, 1u32, &control, TICK);
        assert!(matches!(result, Err(PipelineError::ChunkWithoutFile)));
        drop(rx);
    }

    #[test]
    fn test_put_fails_on_cancel_while_full() {
        let control = PipelineControl::new();
        let (tx, _rx) = bounded(1);
        tx.send(0u32).unwrap();

        control.cancel();
        assert!(matches!(
            put(&tx, 1u32, &control, TICK),
            Err(PipelineError::Cancelled)
        ));
    }

    #[test]
    fn test_put_reports_disconnected_receiver() {
        let control = PipelineControl::new();
        let (tx, rx) = bounded(1);
        drop(rx);

        assert!(matches!(
            put(&tx, 1u32, &control, TICK),
            Err(PipelineError::QueueClosed)
        ));
    }

    #[test]
    fn test_put_retries_until_capacity_frees() {
        let control = PipelineControl::new();
        let (tx, rx) = bounded(1);
        tx.send(0u32).unwrap();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(40));
            rx.recv().unwrap();
            rx
        });

        put(&tx, 1u32, &control, TICK).unwrap();
        let rx = handle.join().unwrap();
        assert_eq!(rx.recv().unwrap(), 1);
    }
}
