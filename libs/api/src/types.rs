use chrono::{DateTime, Utc};

// ════════════════════════════════════════════════════════════════
//  LogRecord
// ════════════════════════════════════════════════════════════════

/// Конверт для публикации в лог: partition key + opaque payload.
///
/// Создаётся gateway один раз и передаётся логу по значению —
/// после handoff у gateway не остаётся ссылок.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
}

impl LogRecord {
    pub fn new(key: Vec<u8>, payload: Vec<u8>) -> Self {
        Self { key, payload }
    }
}

// ════════════════════════════════════════════════════════════════
//  FetchedRecord / FetchBatch
// ════════════════════════════════════════════════════════════════

/// Запись, выданная логом consumer'у, с метаданными партиции.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    /// `None` для tombstone — такая запись не декодируется.
    pub payload: Option<Vec<u8>>,
}

/// Диапазон offset'ов одной партиции внутри батча.
///
/// `commit` сдвигает курсор группы на `last_offset + 1`,
/// `rewind` возвращает позицию реплики на `first_offset`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionCursor {
    pub topic: String,
    pub partition: i32,
    pub first_offset: i64,
    pub last_offset: i64,
}

impl PartitionCursor {
    pub fn next_offset(&self) -> i64 {
        self.last_offset + 1
    }
}

/// Результат одного fetch: записи в порядке выдачи.
#[derive(Clone, Debug, Default)]
pub struct FetchBatch {
    pub records: Vec<FetchedRecord>,
}

impl FetchBatch {
    pub fn new(records: Vec<FetchedRecord>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Per-partition offset ranges, in order of first appearance.
    pub fn cursors(&self) -> Vec<PartitionCursor> {
        let mut cursors: Vec<PartitionCursor> = Vec::new();
        for rec in &self.records {
            match cursors
                .iter_mut()
                .find(|c| c.partition == rec.partition && c.topic == rec.topic)
            {
                Some(c) => {
                    c.first_offset = c.first_offset.min(rec.offset);
                    c.last_offset = c.last_offset.max(rec.offset);
                }
                None => cursors.push(PartitionCursor {
                    topic: rec.topic.clone(),
                    partition: rec.partition,
                    first_offset: rec.offset,
                    last_offset: rec.offset,
                }),
            }
        }
        cursors
    }
}

// ════════════════════════════════════════════════════════════════
//  InsertRow
// ════════════════════════════════════════════════════════════════

/// Строка таблицы `readings(time, sensor_id, value)`.
#[derive(Clone, Debug, PartialEq)]
pub struct InsertRow {
    pub time: DateTime<Utc>,
    pub sensor_id: String,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(partition: i32, offset: i64) -> FetchedRecord {
        FetchedRecord {
            topic: "t".into(),
            partition,
            offset,
            key: None,
            payload: None,
        }
    }

    #[test]
    fn cursors_cover_each_partition_once() {
        let batch = FetchBatch::new(vec![rec(1, 10), rec(0, 3), rec(1, 11), rec(0, 4), rec(1, 12)]);
        let cursors = batch.cursors();
        assert_eq!(cursors.len(), 2);
        assert_eq!((cursors[0].partition, cursors[0].first_offset, cursors[0].last_offset), (1, 10, 12));
        assert_eq!((cursors[1].partition, cursors[1].first_offset, cursors[1].last_offset), (0, 3, 4));
        assert_eq!(cursors[0].next_offset(), 13);
    }

    #[test]
    fn empty_batch_has_no_cursors() {
        assert!(FetchBatch::default().cursors().is_empty());
    }
}
