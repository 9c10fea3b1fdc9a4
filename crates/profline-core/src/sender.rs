//! Sender worker: periodic drain of the shared store → sink

use std::time::Duration;

use indicatif::ProgressBar;

use crate::phase::Phase;
use crate::signal::{Signal, all_set};
use crate::sink::Sink;
use crate::store::SharedStore;

#[derive(Debug, Clone, Copy)]
pub struct SenderConfig {
    /// Pause between drains
    pub batch_interval: Duration,
}

/// Outcome of one sender run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SenderStats {
    pub drains: usize,
    pub batches_sent: usize,
    pub records_sent: usize,
    /// Batches the sink refused; their records are gone
    pub batches_failed: usize,
    pub records_lost: usize,
    pub store_errors: usize,
    /// Ended by the empty-drain limit of [`Sender::run_until_idle`]
    pub idle_exit: bool,
}

/// What ends a sender run
#[derive(Clone, Copy)]
enum Until<'s> {
    /// Both upstream stages are done; one final drain follows
    Upstream {
        generation_done: &'s Signal,
        processing_done: &'s Signal,
    },
    /// This many consecutive empty drains
    Idle(u32),
}

/// Drains the store every interval and hands each batch to the sink.
///
/// Delivery is at-most-once: a batch the sink rejects is counted and
/// discarded, never written back to the store.
pub struct Sender<'a, K> {
    store: &'a SharedStore,
    sink: K,
    config: SenderConfig,
}

impl<'a, K: Sink> Sender<'a, K> {
    pub fn new(store: &'a SharedStore, sink: K, config: SenderConfig) -> Self {
        Self {
            store,
            sink,
            config,
        }
    }

    /// Drain until both upstream stages are done.
    ///
    /// Once `generation_done` and `processing_done` are both set no further
    /// append can happen, so exactly one more drain is taken and the worker
    /// stops. The interval wait ends early when `processing_done` is set.
    /// Empty drains never end this run.
    pub fn run(
        self,
        generation_done: &Signal,
        processing_done: &Signal,
        pb: &ProgressBar,
    ) -> SenderStats {
        let until = Until::Upstream {
            generation_done,
            processing_done,
        };
        self.drive(until, pb)
    }

    /// Drain a store that no session is feeding.
    ///
    /// There is no stop signal: the first drain happens immediately and the
    /// run ends after `max_empty_drains` consecutive empty drains (at least one).
    pub fn run_until_idle(self, max_empty_drains: u32, pb: &ProgressBar) -> SenderStats {
        self.drive(Until::Idle(max_empty_drains.max(1)), pb)
    }

    fn drive(mut self, until: Until<'_>, pb: &ProgressBar) -> SenderStats {
        let mut stats = SenderStats::default();
        let mut phase = Phase::Running;
        let mut empty_run = 0u32;
        log::info!("sending every {:?}", self.config.batch_interval);

        loop {
            let stop = match until {
                Until::Upstream {
                    generation_done,
                    processing_done,
                } => self.wait(generation_done, processing_done),
                Until::Idle(_) => {
                    if stats.drains > 0 {
                        std::thread::sleep(self.config.batch_interval);
                    }
                    false
                }
            };
            if stop {
                phase.advance(Phase::DrainingFinal);
            }

            let drained = self.drain_once(&mut stats);
            pb.set_message(format!(
                "batches {} ({} records)",
                stats.batches_sent, stats.records_sent
            ));
            if stop {
                break;
            }

            if let Until::Idle(max) = until {
                match drained {
                    Some(0) => {
                        empty_run += 1;
                        if empty_run >= max {
                            log::info!("{empty_run} empty drains in a row, stopping");
                            stats.idle_exit = true;
                            break;
                        }
                    }
                    Some(_) => empty_run = 0,
                    None => {}
                }
            }
        }

        phase.advance(Phase::Stopped);
        pb.finish_with_message(format!(
            "done, {} batches ({} records)",
            stats.batches_sent, stats.records_sent
        ));
        log::info!(
            "sender done ({} batches, {} records sent, {} lost)",
            stats.batches_sent,
            stats.records_sent,
            stats.records_lost
        );
        stats
    }

    /// Sleep one interval; true if the stop condition holds afterwards.
    fn wait(&self, generation_done: &Signal, processing_done: &Signal) -> bool {
        let interval = self.config.batch_interval;
        if !processing_done.is_set() {
            processing_done.wait_timeout(interval);
        } else if !generation_done.is_set() {
            // Processor quit early (stall abort): no appends can follow,
            // but the generator may still be running.
            generation_done.wait_timeout(interval);
        }
        all_set(&[generation_done, processing_done])
    }

    /// One drain + dispatch. Returns the drained record count, `None` if the
    /// store could not be read.
    fn drain_once(&mut self, stats: &mut SenderStats) -> Option<usize> {
        stats.drains += 1;
        let batch = match self.store.drain_and_clear() {
            Ok(batch) => batch,
            Err(e) => {
                stats.store_errors += 1;
                log::error!("drain failed: {e}");
                return None;
            }
        };
        if batch.is_empty() {
            log::debug!("store empty");
            return Some(0);
        }

        let n = batch.len();
        match self.sink.dispatch(&batch) {
            Ok(()) => {
                stats.batches_sent += 1;
                stats.records_sent += n;
                log::info!("batch {} sent ({n} records)", stats.batches_sent);
            }
            Err(e) => {
                stats.batches_failed += 1;
                stats.records_lost += n;
                log::error!("batch of {n} records dropped: {e}");
            }
        }
        Some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::sink::MemorySink;
    use tempfile::TempDir;

    fn rec(n: i64) -> Record {
        Record::new().with("n", n)
    }

    fn config(interval_ms: u64) -> SenderConfig {
        SenderConfig {
            batch_interval: Duration::from_millis(interval_ms),
        }
    }

    fn both_set() -> (Signal, Signal) {
        let (a, b) = (Signal::new(), Signal::new());
        a.set();
        b.set();
        (a, b)
    }

    #[test]
    fn single_final_drain_when_already_stopped() {
        let dir = TempDir::new().unwrap();
        let store = SharedStore::create(&dir.path().join("data.json")).unwrap();
        for n in 0..4 {
            store.append(rec(n)).unwrap();
        }
        let sink = MemorySink::new();
        let (generation_done, processing_done) = both_set();

        let stats = Sender::new(&store, sink.clone(), config(10_000)).run(
            &generation_done,
            &processing_done,
            &ProgressBar::hidden(),
        );

        assert_eq!(stats.drains, 1);
        assert_eq!(stats.batches_sent, 1);
        assert_eq!(sink.batches(), vec![(0..4).map(rec).collect::<Vec<_>>()]);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn failed_batch_is_not_restored() {
        let dir = TempDir::new().unwrap();
        let store = SharedStore::create(&dir.path().join("data.json")).unwrap();
        store.append(rec(1)).unwrap();
        let sink = MemorySink::failing_on([0]);
        let (generation_done, processing_done) = both_set();

        let stats = Sender::new(&store, sink.clone(), config(10)).run(
            &generation_done,
            &processing_done,
            &ProgressBar::hidden(),
        );

        assert_eq!(stats.batches_failed, 1);
        assert_eq!(stats.records_lost, 1);
        assert!(sink.records().is_empty());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn empty_drains_never_end_a_signalled_run() {
        let dir = TempDir::new().unwrap();
        let store = SharedStore::create(&dir.path().join("data.json")).unwrap();
        let sink = MemorySink::new();
        let (generation_done, processing_done) = (Signal::new(), Signal::new());

        std::thread::scope(|s| {
            let worker = s.spawn(|| {
                Sender::new(&store, sink.clone(), config(2)).run(
                    &generation_done,
                    &processing_done,
                    &ProgressBar::hidden(),
                )
            });
            std::thread::sleep(Duration::from_millis(60));
            assert!(!worker.is_finished());
            store.append(rec(3)).unwrap();
            generation_done.set();
            processing_done.set();

            let stats = worker.join().unwrap();
            assert!(!stats.idle_exit);
            assert!(stats.drains > 3);
        });
        assert_eq!(sink.records(), vec![rec(3)]);
    }

    #[test]
    fn idle_run_stops_after_empty_drains() {
        let dir = TempDir::new().unwrap();
        let store = SharedStore::create(&dir.path().join("data.json")).unwrap();
        store.append(rec(1)).unwrap();
        let sink = MemorySink::new();

        let stats = Sender::new(&store, sink.clone(), config(5))
            .run_until_idle(3, &ProgressBar::hidden());

        assert!(stats.idle_exit);
        assert_eq!(stats.drains, 4);
        assert_eq!(sink.records(), vec![rec(1)]);
    }

    #[test]
    fn idle_count_resets_on_data() {
        let dir = TempDir::new().unwrap();
        let store = SharedStore::create(&dir.path().join("data.json")).unwrap();
        let sink = MemorySink::new();

        std::thread::scope(|s| {
            let worker = s.spawn(|| {
                Sender::new(&store, sink.clone(), config(10))
                    .run_until_idle(50, &ProgressBar::hidden())
            });
            std::thread::sleep(Duration::from_millis(40));
            store.append(rec(7)).unwrap();
            let stats = worker.join().unwrap();
            assert!(stats.idle_exit);
            assert_eq!(stats.records_sent, 1);
            // 50 empty drains had to follow the one that found data
            assert!(stats.drains >= 52);
        });
        assert_eq!(sink.records(), vec![rec(7)]);
    }

    #[test]
    fn never_stops_on_generation_signal_alone() {
        let dir = TempDir::new().unwrap();
        let store = SharedStore::create(&dir.path().join("data.json")).unwrap();
        let sink = MemorySink::new();
        let (generation_done, processing_done) = (Signal::new(), Signal::new());
        generation_done.set();

        std::thread::scope(|s| {
            let worker = s.spawn(|| {
                Sender::new(&store, sink.clone(), config(5)).run(
                    &generation_done,
                    &processing_done,
                    &ProgressBar::hidden(),
                )
            });
            std::thread::sleep(Duration::from_millis(40));
            assert!(!worker.is_finished());
            // Late append from a processor that has not finished yet
            store.append(rec(9)).unwrap();
            processing_done.set();
            worker.join().unwrap();
        });
        assert_eq!(sink.records(), vec![rec(9)]);
    }

    #[test]
    fn waits_for_generator_after_processor_quits() {
        let dir = TempDir::new().unwrap();
        let store = SharedStore::create(&dir.path().join("data.json")).unwrap();
        store.append(rec(4)).unwrap();
        let sink = MemorySink::new();
        let (generation_done, processing_done) = (Signal::new(), Signal::new());
        processing_done.set();

        std::thread::scope(|s| {
            let worker = s.spawn(|| {
                Sender::new(&store, sink.clone(), config(5)).run(
                    &generation_done,
                    &processing_done,
                    &ProgressBar::hidden(),
                )
            });
            std::thread::sleep(Duration::from_millis(40));
            assert!(!worker.is_finished());
            generation_done.set();

            let stats = worker.join().unwrap();
            assert!(!stats.idle_exit);
            assert_eq!(stats.records_sent, 1);
        });
        assert_eq!(sink.records(), vec![rec(4)]);
    }
}
