use firehose_api::{FetchBatch, FetchedRecord, FirehoseError, InsertRow, Reading};

/// Строки одного fetch-цикла, готовые к транзакционной вставке.
#[derive(Debug, Default)]
pub struct InsertBatch {
    /// В порядке выдачи логом.
    pub rows: Vec<InsertRow>,
    /// Сколько записей не декодировалось и было отброшено.
    pub dropped: usize,
}

/// Decode & project: каждая запись → Reading → InsertRow.
///
/// Битая запись логируется и отбрасывается; остальные записи батча
/// не затрагиваются.
pub fn build_insert_batch(replica: &str, batch: &FetchBatch) -> InsertBatch {
    let mut out = InsertBatch {
        rows: Vec::with_capacity(batch.len()),
        dropped: 0,
    };
    for record in &batch.records {
        match project(record) {
            Ok(row) => out.rows.push(row),
            Err(e) => {
                out.dropped += 1;
                tracing::warn!(
                    replica = %replica,
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "skipping bad record"
                );
            }
        }
    }
    out
}

fn project(record: &FetchedRecord) -> Result<InsertRow, FirehoseError> {
    let payload = record
        .payload
        .as_deref()
        .ok_or_else(|| FirehoseError::decode("record has no payload"))?;
    Reading::decode(payload)?.to_row()
}
