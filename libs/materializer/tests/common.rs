#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use firehose_api::{LogProducer, LogRecord, Reading};
use firehose_memory::{MemoryConsumer, MemoryLog, MemoryStore};
use materializer::{Materializer, MaterializerOptions};

pub const TOPIC: &str = "sensor-readings";
pub const GROUP: &str = "processor-group";

pub fn fast_options() -> MaterializerOptions {
    MaterializerOptions {
        max_records: 1000,
        fetch_wait: Duration::from_millis(20),
        idle_backoff: Duration::from_millis(5),
    }
}

pub fn fixture(partitions: usize) -> (MemoryLog, Arc<MemoryStore>) {
    (MemoryLog::new(TOPIC, partitions), Arc::new(MemoryStore::new()))
}

pub fn materializer(consumer: MemoryConsumer, store: &Arc<MemoryStore>) -> Materializer {
    materializer_with(consumer, store, fast_options())
}

pub fn materializer_with(
    consumer: MemoryConsumer,
    store: &Arc<MemoryStore>,
    options: MaterializerOptions,
) -> Materializer {
    Materializer::new("test-replica", Box::new(consumer), store.clone(), options)
}

pub fn publish(log: &MemoryLog, reading: &Reading) {
    let record = LogRecord::new(reading.key(), reading.encode().unwrap());
    log.producer().publish(TOPIC, record).unwrap();
}

/// Sum of committed offsets across all partitions of the group.
pub fn committed_total(log: &MemoryLog) -> i64 {
    (0..log.partition_count() as i32)
        .map(|p| log.committed(GROUP, p).unwrap_or(0))
        .sum()
}

pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
