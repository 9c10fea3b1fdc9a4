//! Downstream sinks receiving drained batches

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::record::Record;

/// Batch dispatch failure. The batch is not retried.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("{address} unreachable: {reason}")]
    Unreachable { address: String, reason: String },
    #[error("{address} rejected batch: {reason}")]
    Rejected { address: String, reason: String },
}

/// Accepts one batch as a single logical unit.
pub trait Sink: Send {
    fn dispatch(&mut self, batch: &[Record]) -> Result<(), SinkError>;
}

/// Fields printed for every dispatched record
const SUMMARY_FIELDS: [&str; 4] = ["name", "sex", "job", "age"];

/// Simulated remote server: logs each record and waits `latency` per record
#[derive(Debug, Clone)]
pub struct ImaginaryServer {
    address: String,
    latency: Duration,
}

impl ImaginaryServer {
    pub fn new(address: impl Into<String>, latency: Duration) -> Self {
        Self {
            address: address.into(),
            latency,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Sink for ImaginaryServer {
    fn dispatch(&mut self, batch: &[Record]) -> Result<(), SinkError> {
        if self.address.trim().is_empty() {
            return Err(SinkError::Unreachable {
                address: self.address.clone(),
                reason: "no address configured".to_string(),
            });
        }
        for record in batch {
            log::debug!("sending {} to {}...", record.label(), self.address);
            std::thread::sleep(self.latency);
            let info = SUMMARY_FIELDS
                .iter()
                .map(|key| match record.get(key) {
                    Some(serde_json::Value::String(s)) => format!("{key}={s}"),
                    Some(v) => format!("{key}={v}"),
                    None => format!("{key}=-"),
                })
                .collect::<Vec<_>>()
                .join(" ");
            log::info!("sent {info}");
        }
        Ok(())
    }
}

/// In-memory sink that keeps every batch it accepted.
///
/// Clones share the same storage, so a test can hand one clone to the
/// session and inspect the other afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    batches: Vec<Vec<Record>>,
    attempts: usize,
    // 0-based dispatch attempts that should fail
    fail_on: Vec<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose `n`-th dispatch attempts (0-based) fail
    pub fn failing_on(attempts: impl IntoIterator<Item = usize>) -> Self {
        let sink = Self::default();
        sink.state().fail_on = attempts.into_iter().collect();
        sink
    }

    pub fn batches(&self) -> Vec<Vec<Record>> {
        self.state().batches.clone()
    }

    /// All accepted records, in dispatch order
    pub fn records(&self) -> Vec<Record> {
        self.state().batches.iter().flatten().cloned().collect()
    }

    pub fn attempts(&self) -> usize {
        self.state().attempts
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sink for MemorySink {
    fn dispatch(&mut self, batch: &[Record]) -> Result<(), SinkError> {
        let mut state = self.state();
        let attempt = state.attempts;
        state.attempts += 1;
        if state.fail_on.contains(&attempt) {
            return Err(SinkError::Rejected {
                address: "memory".to_string(),
                reason: format!("scripted failure on attempt {attempt}"),
            });
        }
        state.batches.push(batch.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_shares_state_across_clones() {
        let sink = MemorySink::new();
        let mut handle = sink.clone();
        handle.dispatch(&[Record::new().with("n", 1)]).unwrap();
        handle.dispatch(&[Record::new().with("n", 2)]).unwrap();
        assert_eq!(sink.batches().len(), 2);
        assert_eq!(sink.records().len(), 2);
    }

    #[test]
    fn memory_sink_scripted_failure() {
        let mut sink = MemorySink::failing_on([1]);
        assert!(sink.dispatch(&[Record::new()]).is_ok());
        let err = sink.dispatch(&[Record::new()]).unwrap_err();
        assert!(err.to_string().contains("attempt 1"));
        assert!(sink.dispatch(&[Record::new()]).is_ok());
        assert_eq!(sink.attempts(), 3);
        assert_eq!(sink.batches().len(), 2);
    }

    #[test]
    fn imaginary_server_accepts_batch() {
        let mut server = ImaginaryServer::new("img.serv.com", Duration::ZERO);
        let mut r = Record::new().with("name", "Ada").with("sex", "F");
        r.set_age(35);
        assert!(server.dispatch(&[r]).is_ok());
        assert_eq!(server.address(), "img.serv.com");
    }

    #[test]
    fn imaginary_server_without_address_is_unreachable() {
        let mut server = ImaginaryServer::new("", Duration::ZERO);
        let err = server.dispatch(&[Record::new()]).unwrap_err();
        assert!(matches!(err, SinkError::Unreachable { .. }));
    }
}
