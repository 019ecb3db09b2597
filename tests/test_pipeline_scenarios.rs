//! End-to-end pipeline scenarios over the public API.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use webtraffic_by_country::{
    JobError, JobResult, ManualClock, MemoryRecordSource, MemoryResultSink, Pipeline, RawRecord,
    RecordSource, WindowId,
};

/// Source that pins the shared clock to a chosen arrival time before
/// handing out each record, so window assignment is fully scripted.
struct SteppedSource {
    clock: ManualClock,
    records: VecDeque<(i64, String)>,
}

impl SteppedSource {
    fn new(clock: ManualClock, records: Vec<(i64, &str)>) -> Self {
        Self {
            clock,
            records: records
                .into_iter()
                .map(|(at_ms, record)| (at_ms, record.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl RecordSource for SteppedSource {
    async fn next_record(&mut self) -> Option<JobResult<RawRecord>> {
        let (at_ms, record) = self.records.pop_front()?;
        self.clock.set(at_ms);
        Some(Ok(record))
    }
}

#[tokio::test]
async fn test_counts_spain_and_france_within_one_window() {
    let clock = ManualClock::starting_at(1_000);
    let mut pipeline = Pipeline::with_clock(Duration::from_secs(15), clock).unwrap();
    let mut source = MemoryRecordSource::new([
        r#"{"country":"Spain"}"#,
        r#"{"country":"Spain"}"#,
        r#"{"country":"France"}"#,
    ]);
    let mut sink = MemoryResultSink::new();

    pipeline.run(&mut source, &mut sink).await.unwrap();

    let labels: Vec<String> = sink.results().iter().map(|r| r.to_string()).collect();
    assert_eq!(labels, vec!["(France,1)", "(Spain,2)"]);
}

#[tokio::test]
async fn test_malformed_record_is_dropped_without_stopping_the_job() {
    let clock = ManualClock::starting_at(1_000);
    let mut pipeline = Pipeline::with_clock(Duration::from_secs(15), clock).unwrap();
    let mut source = MemoryRecordSource::new([
        r#"{"country":"Italy"}"#,
        "not-json",
        r#"{"country":"Italy"}"#,
    ]);
    let mut sink = MemoryResultSink::new();

    pipeline.run(&mut source, &mut sink).await.unwrap();

    let labels: Vec<String> = sink.results().iter().map(|r| r.to_string()).collect();
    assert_eq!(labels, vec!["(Italy,2)"]);
}

#[tokio::test]
async fn test_records_on_each_side_of_a_boundary_land_in_adjacent_windows() {
    let window = Duration::from_secs(15);
    let window_ms = window.as_millis() as i64;
    let clock = ManualClock::new();
    let mut pipeline = Pipeline::with_clock(window, clock.clone()).unwrap();
    let mut source = SteppedSource::new(
        clock,
        vec![
            (window_ms - 1, r#"{"country":"Spain"}"#),
            (window_ms, r#"{"country":"Spain"}"#),
        ],
    );
    let mut sink = MemoryResultSink::new();

    pipeline.run(&mut source, &mut sink).await.unwrap();

    let results = sink.into_results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].window, WindowId::containing(window_ms - 1, window_ms));
    assert_eq!(results[1].window, WindowId::containing(window_ms, window_ms));
    assert_ne!(results[0].window, results[1].window);
    assert!(results.iter().all(|r| r.country == "Spain" && r.count == 1));
}

#[tokio::test]
async fn test_late_record_does_not_reopen_a_closed_window() {
    let clock = ManualClock::new();
    let mut pipeline = Pipeline::with_clock(Duration::from_secs(15), clock.clone()).unwrap();
    let mut source = SteppedSource::new(
        clock,
        vec![
            (1_000, r#"{"country":"Spain"}"#),
            // This arrival closes window 0.
            (16_000, r#"{"country":"France"}"#),
            // Late for window 0; must be dropped, not counted anywhere.
            (14_000, r#"{"country":"Spain"}"#),
        ],
    );
    let mut sink = MemoryResultSink::new();

    pipeline.run(&mut source, &mut sink).await.unwrap();

    let labels: Vec<String> = sink.results().iter().map(|r| r.to_string()).collect();
    assert_eq!(labels, vec!["(Spain,1)", "(France,1)"]);
    assert_eq!(pipeline.counter().late_drops(), 1);
}

#[tokio::test]
async fn test_zero_window_length_never_starts() {
    let err = Pipeline::with_clock(Duration::ZERO, ManualClock::new()).unwrap_err();
    assert!(matches!(err, JobError::Config { .. }));
}
