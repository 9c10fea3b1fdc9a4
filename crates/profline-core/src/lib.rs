//! Profline Core - three-stage record pipeline
//!
//! A generator emits synthetic records onto a handoff queue, a processor
//! keeps the ones whose owner is 30 to 40 years old in a durable shared
//! store, and a sender periodically drains that store into a sink.

pub mod error;
pub mod generator;
pub mod logging;
pub mod phase;
pub mod processor;
pub mod progress;
pub mod queue;
pub mod record;
pub mod sender;
pub mod session;
pub mod signal;
pub mod sink;
pub mod source;
pub mod store;
pub mod validate;

// Re-exports for convenience
pub use error::SessionError;
pub use generator::{Generator, GeneratorStats};
pub use logging::{IndicatifLogger, init_logging};
pub use phase::Phase;
pub use processor::{Processor, ProcessorConfig, ProcessorStats, StallPolicy};
pub use progress::{ProgressContext, SharedProgress};
pub use queue::{HandoffReceiver, HandoffSender, Recv, handoff};
pub use record::{Batch, Record};
pub use sender::{Sender, SenderConfig, SenderStats};
pub use session::{SessionConfig, SessionSummary, run, run_with};
pub use signal::Signal;
pub use sink::{ImaginaryServer, MemorySink, Sink, SinkError};
pub use source::{IterSource, ProfileSource, RecordSource, SourceError};
pub use store::{SharedStore, StoreError};
