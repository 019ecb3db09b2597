//! # webtraffic-by-country
//!
//! A minimal streaming job: consume JSON-encoded web-traffic events from
//! Kafka, extract the country each event came from, and every fixed time
//! interval emit a per-country event count.
//!
//! The windowing engine is self-contained: a tolerant JSON decoder, keyed
//! tumbling windows over processing time, fold/merge accumulator semantics,
//! and a pipeline context wiring source → decode → window → sink.
//!
//! ## Features
//!
//! - **Tolerant decoding**: malformed records are logged and dropped, never
//!   fatal to the stream
//! - **Tumbling windows**: fixed-size, non-overlapping processing-time
//!   windows; each (country, window) pair is emitted exactly once
//! - **Parallel shards**: events can fan out across worker tasks, with
//!   partial counts merged on closure
//! - **Pluggable edges**: Kafka and in-memory record sources, stdout and
//!   in-memory result sinks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use webtraffic_by_country::{
//!     KafkaRawSource, KafkaSourceConfig, Pipeline, StdoutSink,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = KafkaSourceConfig::new(
//!         "localhost:9092",
//!         "webtraffic",
//!         "webtraffic-by-country",
//!     );
//!     let mut source = KafkaRawSource::new(&config)?;
//!     let mut sink = StdoutSink::new();
//!
//!     let mut pipeline = Pipeline::new(Duration::from_secs(15))?;
//!     pipeline.run(&mut source, &mut sink).await?;
//!     Ok(())
//! }
//! ```

pub mod webtraffic;

pub use webtraffic::clock::{ManualClock, ProcessingTimeClock, SystemClock};
pub use webtraffic::config::{JobConfig, DEFAULT_GROUP_ID};
pub use webtraffic::decoder::{DecodeError, EventDecoder};
pub use webtraffic::error::{JobError, JobResult};
pub use webtraffic::event::{RawRecord, WebTrafficEvent};
pub use webtraffic::kafka::{KafkaRawSource, KafkaSourceConfig, OffsetReset};
pub use webtraffic::pipeline::Pipeline;
pub use webtraffic::shard::{PartitionPolicy, ShardedPipeline};
pub use webtraffic::sink::{MemoryResultSink, ResultSink, StdoutSink};
pub use webtraffic::source::{MemoryRecordSource, RecordSource};
pub use webtraffic::window::{
    assign_key, CountryWindowAccumulator, CountryWindowCounter, CountryWindowResult, WindowId,
};
