//! Handoff queue between generator and processor
//!
//! Unbounded FIFO over `std::sync::mpsc`. Receives report a tri-state result
//! instead of surfacing timeouts as errors.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use crate::record::Record;

/// Outcome of a receive attempt
#[derive(Debug, PartialEq)]
pub enum Recv {
    Received(Record),
    /// Nothing arrived within the wait (or nothing queued, for `try_recv`)
    TimedOut,
    /// All producers are gone and the queue is empty
    Closed,
}

/// Producer half. Dropping it closes the queue once drained.
#[derive(Debug)]
pub struct HandoffSender {
    tx: Sender<Record>,
}

/// Consumer half
#[derive(Debug)]
pub struct HandoffReceiver {
    rx: Receiver<Record>,
}

/// Create a connected producer/consumer pair
pub fn handoff() -> (HandoffSender, HandoffReceiver) {
    let (tx, rx) = mpsc::channel();
    (HandoffSender { tx }, HandoffReceiver { rx })
}

impl HandoffSender {
    /// Push a record. Fails (returning it) only when the receiver is gone.
    pub fn push(&self, record: Record) -> Result<(), Record> {
        self.tx.send(record).map_err(|e| e.0)
    }
}

impl HandoffReceiver {
    /// Block until a record arrives, the queue closes, or `timeout` elapses
    pub fn recv_timeout(&self, timeout: Duration) -> Recv {
        match self.rx.recv_timeout(timeout) {
            Ok(r) => Recv::Received(r),
            Err(RecvTimeoutError::Timeout) => Recv::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Recv::Closed,
        }
    }

    /// Non-blocking receive for the final drain
    pub fn try_recv(&self) -> Recv {
        match self.rx.try_recv() {
            Ok(r) => Recv::Received(r),
            Err(TryRecvError::Empty) => Recv::TimedOut,
            Err(TryRecvError::Disconnected) => Recv::Closed,
        }
    }
}
