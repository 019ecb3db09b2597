/*!
# Error Types for the WebTraffic Job

Centralized error handling for the pipeline and its collaborators.
*/

use crate::webtraffic::decoder::DecodeError;
use rdkafka::error::KafkaError;
use thiserror::Error;

/// Top-level error type for the job.
///
/// Stage-local failures (such as [`DecodeError`]) stay recoverable and are
/// handled where they occur; only errors that reach this type can stop the
/// pipeline.
#[derive(Debug, Error)]
pub enum JobError {
    /// Kafka-related errors with enhanced context
    #[error("Kafka operation failed: {message}")]
    Kafka {
        #[source]
        source: KafkaError,
        message: String,
    },

    /// Configuration errors, fatal at startup
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Event decode errors
    #[error("Event decode failed")]
    Decode(#[from] DecodeError),

    /// Generic application errors
    #[error("Application error: {message}")]
    Application { message: String },
}

impl JobError {
    /// Helper to create Kafka errors with context
    pub fn kafka(source: KafkaError, message: impl Into<String>) -> Self {
        Self::Kafka {
            source,
            message: message.into(),
        }
    }

    /// Helper to create configuration errors
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Helper to create application errors
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
        }
    }
}

/// Type alias for Results using JobError
pub type JobResult<T> = Result<T, JobError>;
