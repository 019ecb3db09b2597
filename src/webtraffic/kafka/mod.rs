//! Kafka binding for the record source seam.
//!
//! Deliberately thin: connection management, consumer-group coordination,
//! offset bookkeeping, and delivery retries all stay inside rdkafka. This
//! module only configures the client and adapts its message stream to
//! [`RecordSource`](crate::webtraffic::source::RecordSource).

mod config;
mod source;

pub use config::{KafkaSourceConfig, OffsetReset};
pub use source::KafkaRawSource;
