use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rdkafka::producer::{FutureProducer, FutureRecord, Producer};

use firehose_api::{FirehoseError, LogProducer, LogRecord};

use crate::config::KafkaConfig;
use crate::context::LogContext;
use crate::check_topic;

/// Kafka `LogProducer` поверх `FutureProducer`.
///
/// `publish` только ставит запись в очередь librdkafka; delivery report
/// ожидается отдельной задачей и лишь логируется.
pub struct KafkaProducer {
    producer: Arc<FutureProducer<LogContext>>,
}

impl KafkaProducer {
    /// Создать producer и убедиться, что брокер отвечает. Ошибка — `Startup`.
    pub async fn connect(config: &KafkaConfig, topic: &str) -> Result<Self, FirehoseError> {
        let producer: FutureProducer<LogContext> = config
            .producer_config()
            .create_with_context(LogContext::new("producer"))
            .map_err(|e| FirehoseError::startup(format!("create kafka producer: {e}")))?;
        let producer = Arc::new(producer);

        let client = producer.clone();
        let topic_name = topic.to_string();
        let timeout = config.connect_timeout;
        let metadata = tokio::task::spawn_blocking(move || client.client().fetch_metadata(Some(&topic_name), timeout))
            .await
            .map_err(|e| FirehoseError::startup(format!("metadata task: {e}")))?
            .map_err(|e| FirehoseError::startup(format!("kafka brokers {}: {e}", config.brokers)))?;
        check_topic(&metadata, topic);

        tracing::info!(brokers = %config.brokers, topic, "kafka producer connected");
        Ok(Self { producer })
    }
}

impl LogProducer for KafkaProducer {
    fn publish(&self, topic: &str, record: LogRecord) -> Result<(), FirehoseError> {
        let kafka_record = FutureRecord::to(topic)
            .key(&record.key)
            .payload(&record.payload);

        match self.producer.send_result(kafka_record) {
            Ok(delivery) => {
                let topic = topic.to_string();
                tokio::spawn(async move {
                    match delivery.await {
                        Ok(Ok(_)) => {}
                        Ok(Err((e, _))) => {
                            tracing::error!(topic = %topic, error = %e, "delivery failed");
                        }
                        Err(_) => {
                            tracing::warn!(topic = %topic, "delivery report dropped");
                        }
                    }
                });
                Ok(())
            }
            Err((e, _)) => Err(FirehoseError::log(format!("enqueue to '{topic}': {e}"))),
        }
    }

    fn flush(&self, timeout: Duration)
        -> Pin<Box<dyn Future<Output = Result<(), FirehoseError>> + Send + '_>>
    {
        let producer = self.producer.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || producer.flush(timeout))
                .await
                .map_err(|e| FirehoseError::log(format!("flush task: {e}")))?
                .map_err(|e| FirehoseError::log(format!("flush: {e}")))
        })
    }
}
