//! Generator worker: source → handoff queue

use std::time::Duration;

use indicatif::ProgressBar;

use crate::queue::HandoffSender;
use crate::signal::Signal;
use crate::source::{RecordSource, SourceError};

/// Outcome of one generator run
#[derive(Debug, Default)]
pub struct GeneratorStats {
    pub emitted: usize,
    /// Source failure that cut the run short
    pub error: Option<SourceError>,
}

/// Emits exactly `count` records, `interval` apart.
pub struct Generator<S> {
    source: S,
    count: usize,
    interval: Duration,
}

impl<S: RecordSource> Generator<S> {
    pub fn new(source: S, count: usize, interval: Duration) -> Self {
        Self {
            source,
            count,
            interval,
        }
    }

    /// Run to completion, then set `done`.
    ///
    /// `done` is set strictly after the last push, and also when the run is
    /// cut short by a source error, a vanished consumer, or a panic. The
    /// queue closes when `tx` is dropped on return.
    pub fn run(mut self, tx: HandoffSender, done: &Signal, pb: &ProgressBar) -> GeneratorStats {
        let _done = done.set_on_drop();
        let mut stats = GeneratorStats::default();
        log::info!("generating {} records", self.count);

        for i in 0..self.count {
            let record = match self.source.next_record() {
                Ok(r) => r,
                Err(e) => {
                    log::error!("source failed after {} records: {e}", stats.emitted);
                    stats.error = Some(e);
                    break;
                }
            };
            log::debug!("emitting {}", record.label());
            if tx.push(record).is_err() {
                log::warn!("processor gone, stopping after {} records", stats.emitted);
                break;
            }
            stats.emitted += 1;
            pb.set_message(format!("emitted {}/{}", stats.emitted, self.count));

            if i + 1 < self.count {
                std::thread::sleep(self.interval);
            }
        }

        done.set();
        pb.finish_with_message(format!("done, {} emitted", stats.emitted));
        log::info!("generator done ({} emitted)", stats.emitted);
        stats
    }
}
