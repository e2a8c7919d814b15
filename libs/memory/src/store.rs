use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use firehose_api::{FirehoseError, InsertRow, ReadingStore};

/// In-memory `ReadingStore`: append-only Vec с атомарной вставкой батча.
///
/// Поддерживает инъекцию сбоев (`fail_next_inserts`) и задержку вставки
/// для проверки поведения materializer'а.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<InsertRow>>,
    fail_inserts: AtomicUsize,
    attempts: AtomicUsize,
    insert_delay: Mutex<Option<Duration>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot всех закоммиченных строк в порядке вставки.
    pub fn rows(&self) -> Vec<InsertRow> {
        self.lock_rows().clone()
    }

    pub fn len(&self) -> usize {
        self.lock_rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Количество вызовов `insert_batch`, включая неуспешные.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn fail_next_inserts(&self, n: usize) {
        self.fail_inserts.store(n, Ordering::SeqCst);
    }

    pub fn set_insert_delay(&self, delay: Duration) {
        *self.insert_delay.lock().unwrap_or_else(|p| p.into_inner()) = Some(delay);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock_rows(&self) -> MutexGuard<'_, Vec<InsertRow>> {
        self.rows.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl ReadingStore for MemoryStore {
    fn insert_batch<'a>(
        &'a self,
        rows: &'a [InsertRow],
    ) -> Pin<Box<dyn Future<Output = Result<u64, FirehoseError>> + Send + 'a>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);

            let delay = *self.insert_delay.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if self.is_closed() {
                return Err(FirehoseError::persistence("store closed"));
            }
            let failed = self
                .fail_inserts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(FirehoseError::persistence("insert failed: connection reset"));
            }
            // Как Postgres `text`: 0x00 не хранится, батч отклоняется целиком.
            if rows.iter().any(|r| r.sensor_id.contains('\0')) {
                return Err(FirehoseError::persistence("invalid byte sequence for encoding \"UTF8\": 0x00"));
            }

            self.lock_rows().extend_from_slice(rows);
            Ok(rows.len() as u64)
        })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {
            self.closed.store(true, Ordering::SeqCst);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firehose_api::Reading;

    fn row(sensor: &str, value: f64) -> InsertRow {
        Reading::new(sensor, value, 1_700_000_000).to_row().unwrap()
    }

    #[tokio::test]
    async fn failed_insert_leaves_nothing_visible() {
        let store = MemoryStore::new();
        let batch = vec![row("a", 1.0), row("b", 2.0), row("c", 3.0)];

        store.fail_next_inserts(1);
        assert!(store.insert_batch(&batch).await.is_err());
        assert!(store.is_empty());

        assert_eq!(store.insert_batch(&batch).await.unwrap(), 3);
        assert_eq!(store.rows(), batch);
        assert_eq!(store.attempts(), 2);
    }

    #[tokio::test]
    async fn closed_store_rejects_inserts() {
        let store = MemoryStore::new();
        store.close().await;
        assert!(store.is_closed());
        assert!(store.insert_batch(&[row("a", 1.0)]).await.is_err());
    }

    #[tokio::test]
    async fn nul_text_rejects_the_whole_batch() {
        let store = MemoryStore::new();
        let bad = InsertRow { sensor_id: "bad\0id".into(), ..row("x", 1.0) };
        assert!(store.insert_batch(&[row("a", 1.0), bad]).await.is_err());
        assert!(store.is_empty());
    }
}
