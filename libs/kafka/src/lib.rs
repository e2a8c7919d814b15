//! Kafka-совместимый backend для партиционированного лога (Kafka, Redpanda).
//!
//! `KafkaProducer` обслуживает gateway, `KafkaConsumer` — одну реплику
//! materializer'а. Логи librdkafka уходят в `tracing` через `LogContext`.

mod config;
mod consumer;
mod context;
mod producer;

use rdkafka::metadata::Metadata;

pub use config::KafkaConfig;
pub use consumer::KafkaConsumer;
pub use context::LogContext;
pub use producer::KafkaProducer;

/// Брокер ответил; отсутствующий topic не фатален (может быть auto-create).
pub(crate) fn check_topic(metadata: &Metadata, topic: &str) {
    match metadata.topics().iter().find(|t| t.name() == topic) {
        Some(t) if t.error().is_none() => {
            tracing::info!(topic, partitions = t.partitions().len(), "topic metadata");
        }
        Some(t) => {
            tracing::warn!(topic, error = ?t.error(), "topic metadata reports an error");
        }
        None => {
            tracing::warn!(topic, "topic not found on brokers");
        }
    }
}
