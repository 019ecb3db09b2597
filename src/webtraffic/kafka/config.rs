use rdkafka::config::ClientConfig;
use std::time::Duration;

/// Where a consumer without a committed offset starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetReset {
    /// Reset to earliest available offset
    Earliest,
    /// Reset to latest offset
    Latest,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

/// Configuration for the Kafka record source, with sensible defaults.
///
/// Defaults follow the job's historical behavior: always read the topic from
/// the start (`auto.offset.reset = earliest`), auto-commit offsets.
#[derive(Debug, Clone)]
pub struct KafkaSourceConfig {
    /// Comma-separated broker list, `host:port,host:port`
    pub brokers: String,
    /// Topic carrying the raw web-traffic records
    pub topic: String,
    /// Consumer group ID
    pub group_id: String,
    /// Auto offset reset behavior
    pub auto_offset_reset: OffsetReset,
    /// Enable auto commit
    pub enable_auto_commit: bool,
    /// Auto commit interval
    pub auto_commit_interval: Duration,
    /// Session timeout
    pub session_timeout: Duration,
}

impl KafkaSourceConfig {
    /// Create a new config for the given brokers, topic, and group
    pub fn new(
        brokers: impl Into<String>,
        topic: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            brokers: brokers.into(),
            topic: topic.into(),
            group_id: group_id.into(),
            auto_offset_reset: OffsetReset::Earliest,
            enable_auto_commit: true,
            auto_commit_interval: Duration::from_secs(5),
            session_timeout: Duration::from_secs(30),
        }
    }

    /// Set auto offset reset behavior
    pub fn auto_offset_reset(mut self, reset: OffsetReset) -> Self {
        self.auto_offset_reset = reset;
        self
    }

    /// Configure auto commit
    pub fn auto_commit(mut self, enable: bool, interval: Duration) -> Self {
        self.enable_auto_commit = enable;
        self.auto_commit_interval = interval;
        self
    }

    /// Set session timeout
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Render the rdkafka client configuration
    pub(crate) fn to_client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", self.auto_offset_reset.as_str())
            .set(
                "enable.auto.commit",
                self.enable_auto_commit.to_string(),
            )
            .set(
                "auto.commit.interval.ms",
                self.auto_commit_interval.as_millis().to_string(),
            )
            .set(
                "session.timeout.ms",
                self.session_timeout.as_millis().to_string(),
            );
        client_config
    }
}
