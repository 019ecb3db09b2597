use crate::webtraffic::error::{JobError, JobResult};
use crate::webtraffic::event::RawRecord;
use crate::webtraffic::kafka::config::KafkaSourceConfig;
use crate::webtraffic::source::RecordSource;
use async_trait::async_trait;
use futures::StreamExt;
use log::info;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message as KafkaMessage;

/// Record source over a Kafka topic.
///
/// Delivers each message payload as a raw UTF-8 string; payload problems
/// (missing payload, invalid UTF-8) surface as per-poll errors the pipeline
/// logs and skips. The stream never ends on its own.
pub struct KafkaRawSource {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaRawSource {
    /// Create a consumer from the config and subscribe to its topic.
    pub fn new(config: &KafkaSourceConfig) -> JobResult<Self> {
        let consumer: StreamConsumer = config
            .to_client_config()
            .create()
            .map_err(|e| JobError::kafka(e, "creating stream consumer"))?;
        consumer
            .subscribe(&[&config.topic])
            .map_err(|e| JobError::kafka(e, format!("subscribing to topic '{}'", config.topic)))?;

        info!(
            "subscribed to topic '{}' with group '{}'",
            config.topic, config.group_id
        );
        Ok(Self {
            consumer,
            topic: config.topic.clone(),
        })
    }

    /// The subscribed topic
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl RecordSource for KafkaRawSource {
    async fn next_record(&mut self) -> Option<JobResult<RawRecord>> {
        // MessageStream is endless; None from the pipeline's point of view
        // never happens here.
        let mut stream = self.consumer.stream();
        let message = stream.next().await?;
        let record = match message {
            Err(e) => Err(JobError::kafka(e, "polling record")),
            Ok(message) => match message.payload_view::<str>() {
                None => Err(JobError::application(format!(
                    "empty payload on topic '{}'",
                    self.topic
                ))),
                Some(Err(_)) => Err(JobError::application(format!(
                    "non-UTF-8 payload on topic '{}'",
                    self.topic
                ))),
                Some(Ok(payload)) => Ok(payload.to_string()),
            },
        };
        Some(record)
    }
}
