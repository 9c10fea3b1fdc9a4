//! Processor worker: handoff queue → validation → shared store

use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};

use crate::phase::Phase;
use crate::queue::{HandoffReceiver, Recv};
use crate::record::Record;
use crate::signal::Signal;
use crate::store::SharedStore;
use crate::validate;

/// What to do when the queue stays empty past the poll timeout
/// while the generator has not finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StallPolicy {
    /// Report the stall and keep waiting
    #[default]
    Wait,
    /// Report the stall and stop waiting; records already queued are still
    /// consumed by the final drain, later ones are refused
    Abort,
}

impl std::fmt::Display for StallPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wait => write!(f, "wait"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

impl FromStr for StallPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wait" => Ok(Self::Wait),
            "abort" => Ok(Self::Abort),
            other => Err(format!("unknown stall policy '{other}' (expected wait|abort)")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessorConfig {
    /// Bounded wait for one record
    pub poll_timeout: Duration,
    /// Pause after each received record
    pub pace: Duration,
    pub stall_policy: StallPolicy,
}

/// Outcome of one processor run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessorStats {
    pub received: usize,
    /// Appended to the store
    pub kept: usize,
    /// Rejected by the age filter
    pub dropped: usize,
    /// Qualifying records lost to store failures
    pub store_errors: usize,
    /// Poll timeouts while the generator was still running
    pub stalls: usize,
    /// Stopped by [`StallPolicy::Abort`]
    pub aborted: bool,
}

/// Validates records and appends qualifying ones to the store.
pub struct Processor<'a> {
    rx: HandoffReceiver,
    store: &'a SharedStore,
    config: ProcessorConfig,
    clock: fn() -> NaiveDate,
}

impl<'a> Processor<'a> {
    pub fn new(rx: HandoffReceiver, store: &'a SharedStore, config: ProcessorConfig) -> Self {
        Self {
            rx,
            store,
            config,
            clock: validate::today,
        }
    }

    /// Replace the date source used for age computation
    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    /// Consume the queue until the generator is done, then set `done`.
    ///
    /// After `generation_done` is observed, whatever is still queued is
    /// drained without blocking before the worker stops. `done` is set on
    /// every exit path, after the last append.
    pub fn run(self, generation_done: &Signal, done: &Signal, pb: &ProgressBar) -> ProcessorStats {
        let _done = done.set_on_drop();
        let mut stats = ProcessorStats::default();
        let mut phase = Phase::Running;
        log::info!(
            "processing (poll timeout {:?}, stall policy {})",
            self.config.poll_timeout,
            self.config.stall_policy
        );

        loop {
            match self.rx.recv_timeout(self.config.poll_timeout) {
                Recv::Received(record) => {
                    self.handle(record, &mut stats, pb);
                    if !self.config.pace.is_zero() {
                        std::thread::sleep(self.config.pace);
                    }
                }
                Recv::TimedOut => {
                    if !generation_done.is_set() {
                        stats.stalls += 1;
                        log::warn!(
                            "queue empty for {:?}, generator may be stalled",
                            self.config.poll_timeout
                        );
                        if self.config.stall_policy == StallPolicy::Abort {
                            log::error!("aborting processing on stall");
                            stats.aborted = true;
                            break;
                        }
                    }
                }
                Recv::Closed => {
                    log::debug!("queue closed");
                    break;
                }
            }
            if generation_done.is_set() {
                break;
            }
        }

        phase.advance(Phase::DrainingFinal);
        let before = stats.received;
        while let Recv::Received(record) = self.rx.try_recv() {
            self.handle(record, &mut stats, pb);
        }
        if stats.received > before {
            log::debug!("final drain picked up {} records", stats.received - before);
        }

        phase.advance(Phase::Stopped);
        done.set();
        pb.finish_with_message(format!("done, kept {} dropped {}", stats.kept, stats.dropped));
        log::info!(
            "processor done ({} received, {} kept, {} dropped)",
            stats.received,
            stats.kept,
            stats.dropped
        );
        stats
    }

    fn handle(&self, mut record: Record, stats: &mut ProcessorStats, pb: &ProgressBar) {
        stats.received += 1;
        match validate::qualifying_age(&record, (self.clock)()) {
            Some(age) => {
                record.set_age(age);
                let label = record.label().to_string();
                match self.store.append(record) {
                    Ok(pending) => {
                        stats.kept += 1;
                        log::debug!("stored {label} (age {age}), {pending} pending");
                    }
                    Err(e) => {
                        stats.store_errors += 1;
                        log::error!("lost {label}: {e}");
                    }
                }
            }
            None => {
                stats.dropped += 1;
                log::debug!("filtered out {}", record.label());
            }
        }
        pb.set_message(format!("kept {} dropped {}", stats.kept, stats.dropped));
    }
}
