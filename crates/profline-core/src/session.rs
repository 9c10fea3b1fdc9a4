//! One bounded pipeline session: store setup, three workers, join

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::SessionError;
use crate::generator::{Generator, GeneratorStats};
use crate::processor::{Processor, ProcessorConfig, ProcessorStats, StallPolicy};
use crate::progress::ProgressContext;
use crate::queue::handoff;
use crate::sender::{Sender, SenderConfig, SenderStats};
use crate::signal::Signal;
use crate::sink::{ImaginaryServer, Sink};
use crate::source::{ProfileSource, RecordSource};
use crate::store::SharedStore;
use crate::validate;

/// Everything a session needs besides its source and sink.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub record_count: usize,
    /// Store file; reset to empty at session start
    pub storage_location: PathBuf,
    pub sink_address: String,
    pub generation_interval: Duration,
    pub processing_poll_timeout: Duration,
    pub processing_pace: Duration,
    pub batch_interval: Duration,
    /// Simulated per-record latency of the default sink
    pub sink_latency: Duration,
    /// Seed for the default record source
    pub seed: Option<u64>,
    pub stall_policy: StallPolicy,
}

impl SessionConfig {
    pub const DEFAULT_STORAGE: &'static str = "./data.json";
    pub const DEFAULT_SINK_ADDRESS: &'static str = "img.serv.com";
    pub const DEFAULT_GENERATION_INTERVAL: Duration = Duration::from_secs(5);
    pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_PACE: Duration = Duration::from_millis(300);
    pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(10);
    pub const DEFAULT_SINK_LATENCY: Duration = Duration::from_secs(1);

    /// Defaults for everything but the record count
    pub fn new(record_count: usize) -> Self {
        Self {
            record_count,
            storage_location: PathBuf::from(Self::DEFAULT_STORAGE),
            sink_address: Self::DEFAULT_SINK_ADDRESS.to_string(),
            generation_interval: Self::DEFAULT_GENERATION_INTERVAL,
            processing_poll_timeout: Self::DEFAULT_POLL_TIMEOUT,
            processing_pace: Self::DEFAULT_PACE,
            batch_interval: Self::DEFAULT_BATCH_INTERVAL,
            sink_latency: Self::DEFAULT_SINK_LATENCY,
            seed: None,
            stall_policy: StallPolicy::default(),
        }
    }

    fn processor(&self) -> ProcessorConfig {
        ProcessorConfig {
            poll_timeout: self.processing_poll_timeout,
            pace: self.processing_pace,
            stall_policy: self.stall_policy,
        }
    }

    fn sender(&self) -> SenderConfig {
        SenderConfig {
            batch_interval: self.batch_interval,
        }
    }
}

/// Per-worker results of a finished session
#[derive(Debug)]
pub struct SessionSummary {
    pub generator: GeneratorStats,
    pub processor: ProcessorStats,
    pub sender: SenderStats,
    /// Store emptiness after all workers stopped; false if it could not be read
    pub store_empty: bool,
    pub elapsed: Duration,
}

impl SessionSummary {
    /// True when nothing was lost or left behind
    pub fn is_clean(&self) -> bool {
        self.generator.error.is_none()
            && !self.processor.aborted
            && self.processor.store_errors == 0
            && self.sender.batches_failed == 0
            && self.sender.store_errors == 0
            && self.store_empty
    }
}

/// Run a session with the synthetic profile source and the imaginary server.
pub fn run(
    config: &SessionConfig,
    progress: &ProgressContext,
) -> Result<SessionSummary, SessionError> {
    let source = ProfileSource::new(config.seed, validate::today());
    let sink = ImaginaryServer::new(config.sink_address.clone(), config.sink_latency);
    run_with(config, source, sink, progress)
}

/// Run a session with an explicit source and sink.
///
/// The store is reset before any worker starts; failing to do so aborts the
/// session. Returns once all three workers have stopped.
pub fn run_with<S, K>(
    config: &SessionConfig,
    source: S,
    sink: K,
    progress: &ProgressContext,
) -> Result<SessionSummary, SessionError>
where
    S: RecordSource,
    K: Sink,
{
    let start = Instant::now();
    let store = SharedStore::create(&config.storage_location)?;
    log::info!(
        "session: {} records, store {}",
        config.record_count,
        store.path().display()
    );

    let (tx, rx) = handoff();
    let generation_done = Signal::new();
    let processing_done = Signal::new();
    let generator = Generator::new(source, config.record_count, config.generation_interval);
    let processor = Processor::new(rx, &store, config.processor());
    let sender = Sender::new(&store, sink, config.sender());

    let gen_line = progress.stage_line("generate");
    let proc_line = progress.stage_line("process");
    let send_line = progress.stage_line("send");

    let (gen_stats, proc_stats, send_stats) = thread::scope(|s| {
        let g = thread::Builder::new()
            .name("generator".into())
            .spawn_scoped(s, || generator.run(tx, &generation_done, &gen_line))
            .map_err(|source| SessionError::Spawn {
                worker: "generator",
                source,
            })?;
        let p = thread::Builder::new()
            .name("processor".into())
            .spawn_scoped(s, || processor.run(&generation_done, &processing_done, &proc_line))
            .map_err(|source| SessionError::Spawn {
                worker: "processor",
                source,
            })?;
        let k = thread::Builder::new()
            .name("sender".into())
            .spawn_scoped(s, || sender.run(&generation_done, &processing_done, &send_line))
            .map_err(|source| SessionError::Spawn {
                worker: "sender",
                source,
            })?;

        // Join all three before inspecting any result
        let (g, p, k) = (g.join(), p.join(), k.join());
        Ok::<_, SessionError>((
            g.map_err(|_| SessionError::WorkerPanicked("generator"))?,
            p.map_err(|_| SessionError::WorkerPanicked("processor"))?,
            k.map_err(|_| SessionError::WorkerPanicked("sender"))?,
        ))
    })?;

    let store_empty = store.is_empty().unwrap_or_else(|e| {
        log::error!("could not check store after session: {e}");
        false
    });
    let summary = SessionSummary {
        generator: gen_stats,
        processor: proc_stats,
        sender: send_stats,
        store_empty,
        elapsed: start.elapsed(),
    };
    log::info!(
        "session finished in {:.1}s: {} emitted, {} kept, {} sent in {} batches",
        summary.elapsed.as_secs_f64(),
        summary.generator.emitted,
        summary.processor.kept,
        summary.sender.records_sent,
        summary.sender.batches_sent
    );
    Ok(summary)
}
