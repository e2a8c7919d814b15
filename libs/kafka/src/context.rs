use rdkafka::client::ClientContext;
use rdkafka::config::RDKafkaLogLevel;
use rdkafka::consumer::ConsumerContext;
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::TopicPartitionList;

/// Client context that forwards librdkafka logs and errors to `tracing`.
#[derive(Clone)]
pub struct LogContext {
    role: &'static str,
}

impl LogContext {
    pub fn new(role: &'static str) -> Self {
        Self { role }
    }
}

impl ClientContext for LogContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        match level {
            RDKafkaLogLevel::Emerg
            | RDKafkaLogLevel::Alert
            | RDKafkaLogLevel::Critical
            | RDKafkaLogLevel::Error => {
                tracing::error!(role = self.role, fac, "{log_message}")
            }
            RDKafkaLogLevel::Warning => tracing::warn!(role = self.role, fac, "{log_message}"),
            RDKafkaLogLevel::Notice | RDKafkaLogLevel::Info => {
                tracing::info!(role = self.role, fac, "{log_message}")
            }
            RDKafkaLogLevel::Debug => tracing::debug!(role = self.role, fac, "{log_message}"),
        }
    }

    fn error(&self, error: KafkaError, reason: &str) {
        tracing::error!(role = self.role, error = %error, reason, "kafka client error");
    }
}

impl ConsumerContext for LogContext {
    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        match result {
            Ok(()) => tracing::debug!(role = self.role, partitions = offsets.count(), "offsets committed"),
            Err(e) => tracing::warn!(role = self.role, error = %e, "offset commit rejected"),
        }
    }
}
