mod batch;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use firehose_api::{LogConsumer, PartitionCursor, ReadingStore};

pub use batch::{InsertBatch, build_insert_batch};

// ═══════════════════════════════════════════════════════════════
//  Options
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct MaterializerOptions {
    /// Верхняя граница записей за один fetch.
    pub max_records: usize,
    /// Сколько ждать первую запись в fetch.
    pub fetch_wait: Duration,
    /// Фиксированная пауза после пустого или неуспешного цикла.
    pub idle_backoff: Duration,
}

impl Default for MaterializerOptions {
    fn default() -> Self {
        Self {
            max_records: 1000,
            fetch_wait: Duration::from_secs(1),
            idle_backoff: Duration::from_millis(100),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  CycleOutcome
// ═══════════════════════════════════════════════════════════════

/// Чем закончился один цикл Fetching → Decoding → Inserting → Committing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fetch ничего не вернул за `fetch_wait`.
    Idle,
    /// Ошибка лога при fetch; батч не строился, курсоры не двигались.
    FetchFailed,
    /// Не удалось вернуть позицию после неуспешной вставки; fetch не выполнялся.
    RewindFailed,
    /// Строки вставлены (или вставлять было нечего) и курсоры сдвинуты.
    Committed { records: usize, rows: usize, dropped: usize },
    /// Вставка не прошла; курсоры не сдвинуты, записи будут выданы повторно.
    InsertFailed { records: usize, rows: usize },
    /// Данные уже в store, но commit не прошёл. Следующий commit его покроет.
    CommitFailed { records: usize, rows: usize },
    /// Отмена пришла во время ожидания fetch.
    Cancelled,
}

impl CycleOutcome {
    /// Делать ли паузу `idle_backoff` перед следующим циклом.
    fn should_pause(&self) -> bool {
        matches!(
            self,
            CycleOutcome::Idle
                | CycleOutcome::FetchFailed
                | CycleOutcome::RewindFailed
                | CycleOutcome::InsertFailed { .. }
        )
    }
}

// ═══════════════════════════════════════════════════════════════
//  Materializer
// ═══════════════════════════════════════════════════════════════

/// Одна реплика consumer group: fetch → decode → insert → commit,
/// строго последовательно.
///
/// Курсор сдвигается только если вставлять было нечего или вставка
/// прошла. При ошибке вставки позиция возвращается на начало батча.
pub struct Materializer {
    name: String,
    consumer: Box<dyn LogConsumer>,
    store: Arc<dyn ReadingStore>,
    options: MaterializerOptions,
    pending_rewind: Option<Vec<PartitionCursor>>,
}

impl Materializer {
    pub fn new(
        name: impl Into<String>,
        consumer: Box<dyn LogConsumer>,
        store: Arc<dyn ReadingStore>,
        options: MaterializerOptions,
    ) -> Self {
        Self {
            name: name.into(),
            consumer,
            store,
            options,
            pending_rewind: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Крутить циклы до отмены `token`, затем закрыть consumer.
    ///
    /// Начатые insert + commit доводятся до конца; новые fetch после
    /// отмены не выполняются.
    pub async fn run(mut self, token: CancellationToken) {
        tracing::info!(replica = %self.name, "materializer started");

        while !token.is_cancelled() {
            let outcome = self.run_cycle(&token).await;
            if outcome == CycleOutcome::Cancelled {
                break;
            }
            if outcome.should_pause() {
                tokio::select! {
                    _ = tokio::time::sleep(self.options.idle_backoff) => {}
                    _ = token.cancelled() => break,
                }
            }
        }

        self.consumer.close().await;
        tracing::info!(replica = %self.name, "materializer stopped");
    }

    /// Один цикл протокола.
    pub async fn run_cycle(&mut self, token: &CancellationToken) -> CycleOutcome {
        // Nothing is fetched past unpersisted records until the rewind lands.
        if let Some(cursors) = self.pending_rewind.take() {
            if let Err(e) = self.consumer.rewind(&cursors).await {
                tracing::error!(replica = %self.name, error = %e, "rewind retry failed");
                self.pending_rewind = Some(cursors);
                return CycleOutcome::RewindFailed;
            }
            tracing::info!(replica = %self.name, "rewound to last uncommitted batch");
        }

        // ── Fetching ──
        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => return CycleOutcome::Cancelled,
            res = self.consumer.fetch(self.options.max_records, self.options.fetch_wait) => res,
        };
        let batch = match fetched {
            Ok(batch) if batch.is_empty() => return CycleOutcome::Idle,
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(replica = %self.name, error = %e, "fetch error");
                return CycleOutcome::FetchFailed;
            }
        };

        // ── Decoding ──
        let insert = build_insert_batch(&self.name, &batch);
        let cursors = batch.cursors();
        let records = batch.len();
        let rows = insert.rows.len();

        // ── Inserting ──
        if rows > 0 {
            if let Err(e) = self.store.insert_batch(&insert.rows).await {
                tracing::error!(replica = %self.name, rows, error = %e, "failed to insert batch");
                if let Err(e) = self.consumer.rewind(&cursors).await {
                    tracing::error!(replica = %self.name, error = %e, "rewind failed, will retry before next fetch");
                    self.pending_rewind = Some(cursors);
                }
                return CycleOutcome::InsertFailed { records, rows };
            }
        }

        // ── Committing ──
        match self.consumer.commit(&cursors).await {
            Ok(()) => {
                tracing::info!(replica = %self.name, rows, dropped = insert.dropped, "processed batch");
                CycleOutcome::Committed { records, rows, dropped: insert.dropped }
            }
            Err(e) => {
                tracing::warn!(replica = %self.name, rows, error = %e, "commit failed");
                CycleOutcome::CommitFailed { records, rows }
            }
        }
    }
}

/// Запустить реплику отдельной задачей.
pub fn spawn_materializer(materializer: Materializer, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(materializer.run(token))
}
