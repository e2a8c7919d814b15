use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use firehose_api::ReadingStore;
use firehose_kafka::KafkaConsumer;
use firehose_postgres::PgReadingStore;
use materializer::{Materializer, spawn_materializer};

use crate::config::{MaterializeArgs, MaterializeEffective};
use crate::error::ServerError;

pub async fn run(args: MaterializeArgs) -> Result<(), ServerError> {
    let eff = MaterializeEffective::new(&args)?;
    tracing::info!(
        topic = %eff.topic,
        group = %eff.group,
        replicas = eff.replicas,
        max_records = eff.options.max_records,
        "firehose materializer starting"
    );

    // --- Store pool, shared by every replica ---
    let store: Arc<dyn ReadingStore> = Arc::new(PgReadingStore::connect(&eff.store).await?);

    // --- Replicas: one group member each ---
    let token = CancellationToken::new();
    let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(eff.replicas);
    for i in 0..eff.replicas {
        let consumer = match KafkaConsumer::connect(&eff.kafka, &eff.group, &eff.topic).await {
            Ok(c) => c,
            Err(e) => {
                token.cancel();
                for h in handles {
                    let _ = h.await;
                }
                store.close().await;
                return Err(e.into());
            }
        };
        let replica = Materializer::new(
            format!("replica-{i}"),
            Box::new(consumer),
            store.clone(),
            eff.options.clone(),
        );
        handles.push(spawn_materializer(replica, token.clone()));
    }
    tracing::info!("materializer ready");

    // --- Ожидание Ctrl+C ---
    let signalled = super::cancel_on(tokio::signal::ctrl_c(), &token).await;

    // Drain: in-flight insert + commit дорабатывают в пределах grace
    let deadline = tokio::time::Instant::now() + eff.shutdown_grace;
    for mut h in handles {
        if tokio::time::timeout_at(deadline, &mut h).await.is_err() {
            tracing::warn!("replica did not stop within grace period, aborting");
            h.abort();
            let _ = h.await;
        }
    }

    store.close().await;
    signalled?;
    tracing::info!("shutdown complete");
    Ok(())
}
