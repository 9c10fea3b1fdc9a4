//! Session-level errors

use crate::store::StoreError;

/// Failure that prevents a session from starting or completing.
///
/// Per-record and per-batch problems never surface here; the owning worker
/// counts them in its stats.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("failed to spawn {worker} worker: {source}")]
    Spawn {
        worker: &'static str,
        source: std::io::Error,
    },
    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),
}
