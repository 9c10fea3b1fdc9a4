//! End-to-end session scenarios with a scripted source and an in-memory sink

use std::collections::HashSet;
use std::time::Duration;

use chrono::{Months, NaiveDate};
use tempfile::TempDir;

use profline_core::{
    IterSource, MemorySink, ProfileSource, ProgressContext, Record, RecordSource, SessionConfig,
    SessionError, Sink, SinkError, SourceError, StallPolicy, validate,
};

/// Record whose owner turned `years` old today
fn aged(n: usize, years: u32) -> Record {
    let birthdate = validate::today()
        .checked_sub_months(Months::new(years * 12))
        .unwrap();
    let mut r = Record::new()
        .with("name", format!("person {n}"))
        .with("n", n as u64);
    r.set_birthdate(birthdate);
    r
}

fn source(ages: &[u32]) -> IterSource<std::vec::IntoIter<Record>> {
    let records: Vec<_> = ages.iter().enumerate().map(|(n, &a)| aged(n, a)).collect();
    IterSource::new(records.into_iter())
}

fn fast_config(dir: &TempDir, record_count: usize) -> SessionConfig {
    SessionConfig {
        storage_location: dir.path().join("data.json"),
        generation_interval: Duration::from_millis(2),
        processing_poll_timeout: Duration::from_millis(200),
        processing_pace: Duration::ZERO,
        batch_interval: Duration::from_millis(5),
        sink_latency: Duration::ZERO,
        ..SessionConfig::new(record_count)
    }
}

fn ns(records: &[Record]) -> Vec<u64> {
    records
        .iter()
        .map(|r| r.get("n").and_then(|v| v.as_u64()).unwrap())
        .collect()
}

#[test]
fn all_qualifying_records_arrive_in_one_batch() {
    let dir = TempDir::new().unwrap();
    let config = SessionConfig {
        batch_interval: Duration::from_secs(60),
        ..fast_config(&dir, 5)
    };
    let sink = MemorySink::new();

    let summary = profline_core::run_with(
        &config,
        source(&[35; 5]),
        sink.clone(),
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert_eq!(summary.generator.emitted, 5);
    assert_eq!(summary.processor.kept, 5);
    assert_eq!(summary.sender.batches_sent, 1);
    assert_eq!(sink.batches().len(), 1);
    assert_eq!(sink.batches()[0].len(), 5);
    assert!(sink.records().iter().all(|r| r.age() == Some(35)));
    assert!(summary.is_clean());
}

#[test]
fn out_of_range_records_are_dropped() {
    let dir = TempDir::new().unwrap();
    let sink = MemorySink::new();

    let summary = profline_core::run_with(
        &fast_config(&dir, 5),
        source(&[25, 35, 45, 35, 35]),
        sink.clone(),
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert_eq!(summary.processor.received, 5);
    assert_eq!(summary.processor.kept, 3);
    assert_eq!(summary.processor.dropped, 2);
    assert_eq!(ns(&sink.records()), vec![1, 3, 4]);
    assert!(summary.store_empty);
}

#[test]
fn long_batch_interval_yields_single_final_drain() {
    let dir = TempDir::new().unwrap();
    let config = SessionConfig {
        generation_interval: Duration::from_millis(10),
        batch_interval: Duration::from_secs(120),
        ..fast_config(&dir, 8)
    };
    let sink = MemorySink::new();

    let summary = profline_core::run_with(
        &config,
        source(&[31, 32, 33, 34, 36, 37, 38, 39]),
        sink.clone(),
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert_eq!(summary.sender.drains, 1);
    assert_eq!(ns(&sink.batches()[0]), (0..8).collect::<Vec<_>>());
    assert!(summary.elapsed < Duration::from_secs(60));
}

#[test]
fn frequent_batches_keep_order_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let config = SessionConfig {
        generation_interval: Duration::from_millis(3),
        batch_interval: Duration::from_millis(4),
        ..fast_config(&dir, 40)
    };
    let sink = MemorySink::new();

    let summary = profline_core::run_with(
        &config,
        source(&[35; 40]),
        sink.clone(),
        &ProgressContext::hidden(),
    )
    .unwrap();

    let sent = ns(&sink.records());
    assert_eq!(sent, (0..40).collect::<Vec<_>>());
    assert_eq!(sent.iter().collect::<HashSet<_>>().len(), 40);
    assert_eq!(summary.sender.records_sent, 40);
    assert!(summary.is_clean());
}

#[test]
fn kept_count_matches_predicate_for_seeded_profiles() {
    let dir = TempDir::new().unwrap();
    let today = validate::today();
    let count = 60;

    let mut reference = ProfileSource::new(Some(42), today);
    let expected = (0..count)
        .filter(|_| {
            let r = reference.next_record().unwrap();
            validate::qualifying_age(&r, today).is_some()
        })
        .count();

    let config = SessionConfig {
        generation_interval: Duration::ZERO,
        ..fast_config(&dir, count)
    };
    let sink = MemorySink::new();
    let summary = profline_core::run_with(
        &config,
        ProfileSource::new(Some(42), today),
        sink.clone(),
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert_eq!(summary.processor.kept, expected);
    assert_eq!(sink.records().len(), expected);
    assert!(
        sink.records()
            .iter()
            .all(|r| (30..41).contains(&r.age().unwrap()))
    );
}

#[test]
fn unwritable_store_aborts_before_workers_start() {
    let dir = TempDir::new().unwrap();
    let config = SessionConfig {
        storage_location: dir.path().join("missing").join("data.json"),
        ..fast_config(&dir, 5)
    };
    let sink = MemorySink::new();

    let err = profline_core::run_with(
        &config,
        source(&[35; 5]),
        sink.clone(),
        &ProgressContext::hidden(),
    )
    .unwrap_err();

    assert!(matches!(err, SessionError::Store(_)));
    assert_eq!(sink.attempts(), 0);
}

#[test]
fn failed_batch_is_lost_not_retried() {
    let dir = TempDir::new().unwrap();
    let config = SessionConfig {
        batch_interval: Duration::from_secs(60),
        ..fast_config(&dir, 5)
    };
    let sink = MemorySink::failing_on([0]);

    let summary = profline_core::run_with(
        &config,
        source(&[35; 5]),
        sink.clone(),
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert_eq!(sink.attempts(), 1);
    assert_eq!(summary.sender.batches_failed, 1);
    assert_eq!(summary.sender.records_lost, 5);
    assert!(summary.store_empty);
    assert!(!summary.is_clean());
}

#[test]
fn source_failure_still_completes_session() {
    let dir = TempDir::new().unwrap();
    let sink = MemorySink::new();

    let summary = profline_core::run_with(
        &fast_config(&dir, 5),
        source(&[35, 35]),
        sink.clone(),
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert_eq!(summary.generator.emitted, 2);
    assert!(matches!(
        summary.generator.error,
        Some(SourceError::Exhausted)
    ));
    assert_eq!(sink.records().len(), 2);
    assert!(summary.store_empty);
}

#[test]
fn store_file_is_reset_and_left_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.json");
    std::fs::write(&path, r#"[{"name":"stale"}]"#).unwrap();
    let sink = MemorySink::new();

    profline_core::run_with(
        &fast_config(&dir, 3),
        source(&[35; 3]),
        sink.clone(),
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    assert!(sink.records().iter().all(|r| r.label() != "stale"));
}

#[test]
fn sparse_generation_with_frequent_empty_drains_delivers_everything() {
    let dir = TempDir::new().unwrap();
    let config = SessionConfig {
        generation_interval: Duration::from_millis(60),
        batch_interval: Duration::from_millis(5),
        ..fast_config(&dir, 4)
    };
    let sink = MemorySink::new();

    let summary = profline_core::run_with(
        &config,
        source(&[25, 25, 35, 35]),
        sink.clone(),
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert_eq!(summary.processor.kept, 2);
    assert_eq!(summary.sender.records_sent, 2);
    assert!(!summary.sender.idle_exit);
    assert_eq!(ns(&sink.records()), vec![2, 3]);
    assert!(summary.is_clean());
}

#[test]
fn abort_on_stall_still_stops_every_worker() {
    let dir = TempDir::new().unwrap();
    let config = SessionConfig {
        generation_interval: Duration::from_millis(400),
        processing_poll_timeout: Duration::from_millis(60),
        stall_policy: StallPolicy::Abort,
        ..fast_config(&dir, 3)
    };
    let sink = MemorySink::new();

    let summary = profline_core::run_with(
        &config,
        source(&[35; 3]),
        sink.clone(),
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert!(summary.processor.aborted);
    assert_eq!(summary.processor.stalls, 1);
    assert_eq!(summary.processor.kept, 1);
    // The generator finds the queue closed on its next push
    assert_eq!(summary.generator.emitted, 1);
    assert!(summary.generator.error.is_none());
    assert_eq!(ns(&sink.records()), vec![0]);
    assert!(summary.store_empty);
    assert!(!summary.is_clean());
}

struct PanickingSink;

impl Sink for PanickingSink {
    fn dispatch(&mut self, _batch: &[Record]) -> Result<(), SinkError> {
        panic!("sink blew up");
    }
}

struct PanickingSource;

impl RecordSource for PanickingSource {
    fn next_record(&mut self) -> Result<Record, SourceError> {
        panic!("source blew up");
    }
}

#[test]
fn sender_panic_is_reported_after_join() {
    let dir = TempDir::new().unwrap();

    let err = profline_core::run_with(
        &fast_config(&dir, 3),
        source(&[35; 3]),
        PanickingSink,
        &ProgressContext::hidden(),
    )
    .unwrap_err();

    assert!(matches!(err, SessionError::WorkerPanicked("sender")));
}

#[test]
fn generator_panic_lets_other_workers_finish() {
    let dir = TempDir::new().unwrap();
    let sink = MemorySink::new();

    let err = profline_core::run_with(
        &fast_config(&dir, 3),
        PanickingSource,
        sink.clone(),
        &ProgressContext::hidden(),
    )
    .unwrap_err();

    assert!(matches!(err, SessionError::WorkerPanicked("generator")));
    assert!(sink.records().is_empty());
}

/// Delivers every batch, then scribbles over the store file.
struct CorruptingSink(std::path::PathBuf);

impl Sink for CorruptingSink {
    fn dispatch(&mut self, _batch: &[Record]) -> Result<(), SinkError> {
        std::fs::write(&self.0, "not json").unwrap();
        Ok(())
    }
}

#[test]
fn unreadable_store_after_join_keeps_summary() {
    let dir = TempDir::new().unwrap();
    let config = SessionConfig {
        batch_interval: Duration::from_secs(60),
        ..fast_config(&dir, 3)
    };

    let summary = profline_core::run_with(
        &config,
        source(&[35; 3]),
        CorruptingSink(config.storage_location.clone()),
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert_eq!(summary.sender.records_sent, 3);
    assert!(!summary.store_empty);
    assert!(!summary.is_clean());
}

#[test]
fn leap_day_birthdate_is_calendar_aware() {
    // Guard against fixed-length-year arithmetic
    let born = NaiveDate::from_ymd_opt(1992, 2, 29).unwrap();
    let eve = NaiveDate::from_ymd_opt(2022, 2, 28).unwrap();
    let after = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap();
    assert_eq!(validate::age_on(born, eve), Some(29));
    assert_eq!(validate::age_on(born, after), Some(30));
}
