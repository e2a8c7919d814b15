use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::{Offset, TopicPartitionList};

use firehose_api::{FetchBatch, FetchedRecord, FirehoseError, LogConsumer, PartitionCursor};

use crate::config::KafkaConfig;
use crate::context::LogContext;
use crate::check_topic;

type GroupConsumer = StreamConsumer<LogContext>;

/// Kafka `LogConsumer`: одна реплика consumer group.
///
/// Auto-commit выключен; commit и seek — блокирующие вызовы librdkafka,
/// поэтому выполняются через `spawn_blocking`.
pub struct KafkaConsumer {
    consumer: Arc<GroupConsumer>,
    group: String,
    op_timeout: Duration,
}

impl KafkaConsumer {
    /// Подключиться, проверить брокер и подписаться на topic. Ошибка — `Startup`.
    pub async fn connect(config: &KafkaConfig, group: &str, topic: &str) -> Result<Self, FirehoseError> {
        let consumer: GroupConsumer = config
            .consumer_config(group)
            .create_with_context(LogContext::new("consumer"))
            .map_err(|e| FirehoseError::startup(format!("create kafka consumer: {e}")))?;
        let consumer = Arc::new(consumer);

        let client = consumer.clone();
        let topic_name = topic.to_string();
        let timeout = config.connect_timeout;
        let metadata = tokio::task::spawn_blocking(move || client.fetch_metadata(Some(&topic_name), timeout))
            .await
            .map_err(|e| FirehoseError::startup(format!("metadata task: {e}")))?
            .map_err(|e| FirehoseError::startup(format!("kafka brokers {}: {e}", config.brokers)))?;
        check_topic(&metadata, topic);

        consumer
            .subscribe(&[topic])
            .map_err(|e| FirehoseError::startup(format!("subscribe '{topic}': {e}")))?;

        tracing::info!(brokers = %config.brokers, group, topic, "kafka consumer subscribed");
        Ok(Self {
            consumer,
            group: group.to_string(),
            op_timeout: config.connect_timeout,
        })
    }
}

fn to_fetched(msg: &BorrowedMessage<'_>) -> FetchedRecord {
    FetchedRecord {
        topic: msg.topic().to_string(),
        partition: msg.partition(),
        offset: msg.offset(),
        key: msg.key().map(<[u8]>::to_vec),
        payload: msg.payload().map(<[u8]>::to_vec),
    }
}

impl LogConsumer for KafkaConsumer {
    fn fetch(
        &mut self,
        max_records: usize,
        max_wait: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<FetchBatch, FirehoseError>> + Send + '_>> {
        Box::pin(async move {
            // Wait for the first record, then drain whatever is already buffered.
            let first = match tokio::time::timeout(max_wait, self.consumer.recv()).await {
                Err(_) => return Ok(FetchBatch::default()),
                Ok(res) => res
                    .map(|m| to_fetched(&m))
                    .map_err(|e| FirehoseError::log(format!("fetch: {e}")))?,
            };

            let mut records = vec![first];
            while records.len() < max_records {
                match tokio::time::timeout(Duration::ZERO, self.consumer.recv()).await {
                    Ok(Ok(msg)) => records.push(to_fetched(&msg)),
                    Ok(Err(e)) => {
                        tracing::warn!(group = %self.group, error = %e, "fetch interrupted, returning partial batch");
                        break;
                    }
                    Err(_) => break,
                }
            }
            Ok(FetchBatch::new(records))
        })
    }

    fn commit<'a>(
        &'a mut self,
        cursors: &'a [PartitionCursor],
    ) -> Pin<Box<dyn Future<Output = Result<(), FirehoseError>> + Send + 'a>> {
        Box::pin(async move {
            if cursors.is_empty() {
                return Ok(());
            }
            let mut tpl = TopicPartitionList::new();
            for c in cursors {
                tpl.add_partition_offset(&c.topic, c.partition, Offset::Offset(c.next_offset()))
                    .map_err(|e| FirehoseError::log(format!("commit offsets: {e}")))?;
            }

            let consumer = self.consumer.clone();
            tokio::task::spawn_blocking(move || consumer.commit(&tpl, CommitMode::Sync))
                .await
                .map_err(|e| FirehoseError::log(format!("commit task: {e}")))?
                .map_err(|e| FirehoseError::log(format!("commit: {e}")))
        })
    }

    fn rewind<'a>(
        &'a mut self,
        cursors: &'a [PartitionCursor],
    ) -> Pin<Box<dyn Future<Output = Result<(), FirehoseError>> + Send + 'a>> {
        Box::pin(async move {
            let consumer = self.consumer.clone();
            let cursors = cursors.to_vec();
            let timeout = self.op_timeout;
            tokio::task::spawn_blocking(move || -> Result<(), FirehoseError> {
                for c in &cursors {
                    consumer
                        .seek(&c.topic, c.partition, Offset::Offset(c.first_offset), timeout)
                        .map_err(|e| FirehoseError::log(format!("seek {}[{}]: {e}", c.topic, c.partition)))?;
                }
                Ok(())
            })
            .await
            .map_err(|e| FirehoseError::log(format!("seek task: {e}")))?
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.consumer.unsubscribe();
            tracing::info!(group = %self.group, "kafka consumer left group");
        })
    }
}
