use std::collections::HashMap;
use std::future::Future;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use firehose_api::{
    FetchBatch, FetchedRecord, FirehoseError, LogConsumer, LogProducer, LogRecord,
    PartitionCursor,
};

#[derive(Clone, Debug)]
struct StoredRecord {
    key: Option<Vec<u8>>,
    payload: Option<Vec<u8>>,
}

#[derive(Default)]
struct Faults {
    publish: usize,
    fetch: usize,
    commit: usize,
    rewind: usize,
}

struct LogState {
    partitions: Vec<Vec<StoredRecord>>,
    committed: HashMap<(String, i32), i64>,
    commit_calls: usize,
    closed_consumers: usize,
    faults: Faults,
}

// ═══════════════════════════════════════════════════════════════
//  MemoryLog
// ═══════════════════════════════════════════════════════════════

/// In-process партиционированный лог с одним topic'ом.
///
/// Записи распределяются по партициям хешем ключа, commit cursor'ы
/// хранятся per (group, partition). Клонирование дешёвое — все клоны
/// видят одно состояние.
#[derive(Clone)]
pub struct MemoryLog {
    topic: String,
    state: Arc<Mutex<LogState>>,
    notify: Arc<Notify>,
}

impl MemoryLog {
    pub fn new(topic: impl Into<String>, partitions: usize) -> Self {
        let partitions = partitions.max(1);
        Self {
            topic: topic.into(),
            state: Arc::new(Mutex::new(LogState {
                partitions: vec![Vec::new(); partitions],
                committed: HashMap::new(),
                commit_calls: 0,
                closed_consumers: 0,
                faults: Faults::default(),
            })),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition_count(&self) -> usize {
        self.state().partitions.len()
    }

    /// Partition для ключа. Одинаковый ключ всегда в одной партиции.
    pub fn partition_for(&self, key: &[u8]) -> i32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.partition_count() as u64) as i32
    }

    pub fn producer(&self) -> MemoryProducer {
        MemoryProducer { log: self.clone() }
    }

    /// Consumer, которому назначены все партиции.
    pub fn consumer(&self, group: impl Into<String>) -> MemoryConsumer {
        let all = (0..self.partition_count() as i32).collect();
        self.consumer_for(group, all)
    }

    /// Consumer с явным назначением партиций (имитация group assignment).
    pub fn consumer_for(&self, group: impl Into<String>, partitions: Vec<i32>) -> MemoryConsumer {
        let group = group.into();
        let positions = {
            let st = self.state();
            partitions
                .iter()
                .map(|p| (*p, st.committed.get(&(group.clone(), *p)).copied().unwrap_or(0)))
                .collect()
        };
        MemoryConsumer {
            log: self.clone(),
            group,
            assigned: partitions,
            positions,
            closed: false,
        }
    }

    /// Дописать произвольные байты (в т.ч. битые или tombstone) в обход producer'а.
    pub fn append_raw(&self, key: Option<&[u8]>, payload: Option<&[u8]>) -> (i32, i64) {
        let partition = self.partition_for(key.unwrap_or_default());
        let pos = self.append(
            partition,
            StoredRecord {
                key: key.map(<[u8]>::to_vec),
                payload: payload.map(<[u8]>::to_vec),
            },
        );
        (partition, pos)
    }

    pub fn committed(&self, group: &str, partition: i32) -> Option<i64> {
        self.state().committed.get(&(group.to_string(), partition)).copied()
    }

    pub fn commit_calls(&self) -> usize {
        self.state().commit_calls
    }

    /// Сколько consumer'ов уже вызвали `close`.
    pub fn closed_consumers(&self) -> usize {
        self.state().closed_consumers
    }

    /// Число записей в партиции.
    pub fn end_offset(&self, partition: i32) -> i64 {
        self.state()
            .partitions
            .get(partition as usize)
            .map_or(0, |p| p.len() as i64)
    }

    pub fn fail_next_publishes(&self, n: usize) {
        self.state().faults.publish = n;
    }

    pub fn fail_next_fetches(&self, n: usize) {
        self.state().faults.fetch = n;
    }

    pub fn fail_next_commits(&self, n: usize) {
        self.state().faults.commit = n;
    }

    pub fn fail_next_rewinds(&self, n: usize) {
        self.state().faults.rewind = n;
    }

    fn append(&self, partition: i32, record: StoredRecord) -> i64 {
        let offset = {
            let mut st = self.state();
            let part = &mut st.partitions[partition as usize];
            part.push(record);
            part.len() as i64 - 1
        };
        self.notify.notify_waiters();
        offset
    }

    fn state(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn take_fault(counter: &mut usize) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryProducer
// ═══════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct MemoryProducer {
    log: MemoryLog,
}

impl LogProducer for MemoryProducer {
    fn publish(&self, topic: &str, record: LogRecord) -> Result<(), FirehoseError> {
        if topic != self.log.topic {
            return Err(FirehoseError::log(format!("unknown topic '{topic}'")));
        }
        if take_fault(&mut self.log.state().faults.publish) {
            return Err(FirehoseError::log("publish queue full"));
        }
        let partition = self.log.partition_for(&record.key);
        self.log.append(
            partition,
            StoredRecord {
                key: Some(record.key),
                payload: Some(record.payload),
            },
        );
        Ok(())
    }

    fn flush(&self, _timeout: Duration)
        -> Pin<Box<dyn Future<Output = Result<(), FirehoseError>> + Send + '_>>
    {
        Box::pin(async { Ok(()) })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryConsumer
// ═══════════════════════════════════════════════════════════════

/// Реплика consumer group над `MemoryLog`.
///
/// Позиция чтения стартует с committed offset группы (или 0) и
/// двигается при fetch; commit и rewind — явные.
pub struct MemoryConsumer {
    log: MemoryLog,
    group: String,
    assigned: Vec<i32>,
    positions: HashMap<i32, i64>,
    closed: bool,
}

impl MemoryConsumer {
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn assigned(&self) -> &[i32] {
        &self.assigned
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn position(&self, partition: i32) -> Option<i64> {
        self.positions.get(&partition).copied()
    }

    fn try_collect(&mut self, max_records: usize) -> Result<FetchBatch, FirehoseError> {
        let mut st = self.log.state();
        if take_fault(&mut st.faults.fetch) {
            return Err(FirehoseError::log("fetch failed: broker unavailable"));
        }

        let mut records = Vec::new();
        for &partition in &self.assigned {
            let Some(stored) = st.partitions.get(partition as usize) else {
                continue;
            };
            let pos = self.positions.entry(partition).or_insert(0);
            while (*pos as usize) < stored.len() && records.len() < max_records {
                let rec = &stored[*pos as usize];
                records.push(FetchedRecord {
                    topic: self.log.topic.clone(),
                    partition,
                    offset: *pos,
                    key: rec.key.clone(),
                    payload: rec.payload.clone(),
                });
                *pos += 1;
            }
        }
        Ok(FetchBatch::new(records))
    }
}

impl LogConsumer for MemoryConsumer {
    fn fetch(
        &mut self,
        max_records: usize,
        max_wait: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<FetchBatch, FirehoseError>> + Send + '_>> {
        Box::pin(async move {
            if self.closed {
                return Err(FirehoseError::log("consumer closed"));
            }
            let deadline = Instant::now() + max_wait;
            let notify = self.log.notify.clone();
            loop {
                // Register before checking so an append in between is not missed.
                let notified = notify.notified();
                let batch = self.try_collect(max_records)?;
                if !batch.is_empty() {
                    return Ok(batch);
                }
                if tokio::time::timeout_at(deadline, notified).await.is_err() {
                    return Ok(FetchBatch::default());
                }
            }
        })
    }

    fn commit<'a>(
        &'a mut self,
        cursors: &'a [PartitionCursor],
    ) -> Pin<Box<dyn Future<Output = Result<(), FirehoseError>> + Send + 'a>> {
        Box::pin(async move {
            let mut st = self.log.state();
            if take_fault(&mut st.faults.commit) {
                return Err(FirehoseError::log("commit failed: coordinator unavailable"));
            }
            st.commit_calls += 1;
            for c in cursors {
                st.committed.insert((self.group.clone(), c.partition), c.next_offset());
            }
            Ok(())
        })
    }

    fn rewind<'a>(
        &'a mut self,
        cursors: &'a [PartitionCursor],
    ) -> Pin<Box<dyn Future<Output = Result<(), FirehoseError>> + Send + 'a>> {
        Box::pin(async move {
            if take_fault(&mut self.log.state().faults.rewind) {
                return Err(FirehoseError::log("seek failed"));
            }
            for c in cursors {
                self.positions.insert(c.partition, c.first_offset);
            }
            Ok(())
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if !self.closed {
                self.closed = true;
                self.log.state().closed_consumers += 1;
            }
            tracing::debug!(group = %self.group, "memory consumer closed");
        })
    }
}
