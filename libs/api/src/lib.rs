mod error;
mod reading;
mod types;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use error::{ErrorKind, FirehoseError};
pub use reading::{MIN_STORABLE_TIMESTAMP, Reading};
pub use types::{FetchBatch, FetchedRecord, InsertRow, LogRecord, PartitionCursor};

// ════════════════════════════════════════════════════════════════
//  Log seam
// ════════════════════════════════════════════════════════════════

/// Producer-сторона партиционированного лога.
///
/// Один экземпляр разделяется всеми HTTP handler'ами, поэтому `Send + Sync`.
/// Реализации: Kafka (`firehose-kafka`), in-memory (`firehose-memory`).
pub trait LogProducer: Send + Sync {
    /// Передать запись клиенту лога (handoff). Возвращается до подтверждения
    /// durability; ошибки доставки видны только в логах реализации.
    ///
    /// `Err` — клиент отказался принять запись (очередь полна, клиент закрыт).
    fn publish(&self, topic: &str, record: LogRecord) -> Result<(), FirehoseError>;

    /// Дождаться доставки всех переданных записей (graceful shutdown).
    fn flush(&self, timeout: Duration)
        -> Pin<Box<dyn Future<Output = Result<(), FirehoseError>> + Send + '_>>;
}

/// Consumer-сторона лога: одна реплика consumer group.
///
/// Принадлежит ровно одному materializer loop'у, вызовы строго
/// последовательны — отсюда `&mut self`.
pub trait LogConsumer: Send {
    /// Получить до `max_records` записей из назначенных партиций.
    /// Ждёт первую запись не дольше `max_wait`; пустой батч — не ошибка.
    fn fetch(
        &mut self,
        max_records: usize,
        max_wait: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<FetchBatch, FirehoseError>> + Send + '_>>;

    /// Сдвинуть commit cursor группы за `last_offset` каждой партиции.
    fn commit<'a>(
        &'a mut self,
        cursors: &'a [PartitionCursor],
    ) -> Pin<Box<dyn Future<Output = Result<(), FirehoseError>> + Send + 'a>>;

    /// Вернуть позицию чтения на `first_offset` каждой партиции,
    /// чтобы следующий fetch выдал те же записи повторно.
    fn rewind<'a>(
        &'a mut self,
        cursors: &'a [PartitionCursor],
    ) -> Pin<Box<dyn Future<Output = Result<(), FirehoseError>> + Send + 'a>>;

    /// Покинуть группу и освободить соединение.
    fn close(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

// ════════════════════════════════════════════════════════════════
//  Store seam
// ════════════════════════════════════════════════════════════════

/// Time-series хранилище: атомарная multi-row вставка.
pub trait ReadingStore: Send + Sync {
    /// Вставить все строки одной транзакцией. Либо все видны, либо ни одной.
    fn insert_batch<'a>(
        &'a self,
        rows: &'a [InsertRow],
    ) -> Pin<Box<dyn Future<Output = Result<u64, FirehoseError>> + Send + 'a>>;

    /// Закрыть соединения.
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
