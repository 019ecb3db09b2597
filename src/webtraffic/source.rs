//! Record source seam.
//!
//! The pipeline only needs an unbounded sequence of raw text payloads; how
//! they are fetched, retried, or acknowledged belongs to the source
//! implementation. The Kafka source lives in [`crate::webtraffic::kafka`];
//! the in-memory source here backs tests and bounded replays.

use crate::webtraffic::error::JobResult;
use crate::webtraffic::event::RawRecord;
use async_trait::async_trait;
use std::collections::VecDeque;

/// Supplies raw records to the pipeline, in arrival order.
///
/// `None` means the source is exhausted; an unbounded source never returns
/// it. A `Some(Err(..))` is a per-poll failure the pipeline logs and skips —
/// delivery retries are the source's own business.
#[async_trait]
pub trait RecordSource: Send {
    async fn next_record(&mut self) -> Option<JobResult<RawRecord>>;
}

/// Bounded in-memory source over a fixed list of payloads.
#[derive(Debug, Default)]
pub struct MemoryRecordSource {
    records: VecDeque<RawRecord>,
}

impl MemoryRecordSource {
    /// Create a source that yields the given payloads in order
    pub fn new<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RawRecord>,
    {
        Self {
            records: records.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of records not yet delivered
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl RecordSource for MemoryRecordSource {
    async fn next_record(&mut self) -> Option<JobResult<RawRecord>> {
        self.records.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source_delivers_in_order() {
        let mut source = MemoryRecordSource::new(["a", "b"]);
        assert_eq!(source.remaining(), 2);

        assert_eq!(source.next_record().await.unwrap().unwrap(), "a");
        assert_eq!(source.next_record().await.unwrap().unwrap(), "b");
        assert!(source.next_record().await.is_none());
    }
}
