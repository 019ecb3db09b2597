//! Startup configuration for the job.
//!
//! Read once at process start; a bad value here is fatal before the
//! pipeline ever runs.

use crate::webtraffic::error::{JobError, JobResult};
use crate::webtraffic::kafka::KafkaSourceConfig;
use crate::webtraffic::shard::PartitionPolicy;
use log::info;
use std::time::Duration;

/// Default consumer group ID
pub const DEFAULT_GROUP_ID: &str = "webtraffic-by-country";

/// Validated-on-use job parameters.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Kafka topic carrying raw web-traffic records
    pub topic: String,
    /// Kafka broker addresses, `host:port,host:port`
    pub brokers: String,
    /// Consumer group ID
    pub group_id: String,
    /// Tumbling window length in seconds; must be positive
    pub window_seconds: i64,
    /// Number of parallel window shards
    pub shards: usize,
    /// How events are assigned to shards
    pub partitioning: PartitionPolicy,
}

impl JobConfig {
    /// The window length as a duration.
    ///
    /// Zero or negative lengths are a fatal configuration error.
    pub fn window_size(&self) -> JobResult<Duration> {
        if self.window_seconds <= 0 {
            return Err(JobError::config(format!(
                "window length must be a positive number of seconds, got {}",
                self.window_seconds
            )));
        }
        Ok(Duration::from_secs(self.window_seconds as u64))
    }

    /// Kafka source configuration derived from the job parameters
    pub fn kafka_source_config(&self) -> KafkaSourceConfig {
        KafkaSourceConfig::new(&self.brokers, &self.topic, &self.group_id)
    }

    /// Log every accepted parameter before the pipeline starts
    pub fn log_parameters(&self) {
        info!(" ******** PARAMETERS ******** ");
        info!("Kafka Brokers: {}", self.brokers);
        info!("Kafka Topic: {}", self.topic);
        info!("Kafka Group: {}", self.group_id);
        info!("Time window to process: {}s", self.window_seconds);
        info!("Window shards: {} ({})", self.shards, self.partitioning);
    }
}
