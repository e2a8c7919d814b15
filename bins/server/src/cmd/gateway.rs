use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use firehose_kafka::KafkaProducer;
use gateway::Gateway;

use crate::config::{GatewayArgs, GatewayEffective};
use crate::error::ServerError;

pub async fn run(args: GatewayArgs) -> Result<(), ServerError> {
    let eff = GatewayEffective::new(&args)?;
    tracing::info!(topic = %eff.topic, brokers = %eff.kafka.brokers, "firehose gateway starting");

    // --- Log producer (startup check against brokers) ---
    let producer = KafkaProducer::connect(&eff.kafka, &eff.topic).await?;
    let gateway = Arc::new(Gateway::new(Arc::new(producer), eff.topic.clone()));

    serve_until(gateway, eff.listen, eff.flush_timeout, tokio::signal::ctrl_c()).await?;
    tracing::info!("shutdown complete");
    Ok(())
}

/// HTTP сервер до `signal`, затем flush очереди producer'а.
///
/// Flush выполняется на любом пути выхода; ошибка сервера важнее ошибки сигнала.
async fn serve_until<S>(
    gateway: Arc<Gateway>,
    listen: SocketAddr,
    flush_timeout: Duration,
    signal: S,
) -> Result<(), ServerError>
where
    S: Future<Output = std::io::Result<()>>,
{
    let token = CancellationToken::new();
    let serve = gateway::run(listen, gateway.clone(), token.clone());
    tokio::pin!(serve);

    // Сервер может упасть раньше сигнала (занятый порт).
    let (served, signalled) = tokio::select! {
        res = &mut serve => (res, Ok(())),
        sig = super::cancel_on(signal, &token) => (serve.await, sig),
    };

    // --- Drain producer queue ---
    match gateway.flush(flush_timeout).await {
        Ok(()) => tracing::info!("producer flushed"),
        Err(e) => tracing::error!(error = ?e, "producer flush incomplete"),
    }

    served?;
    signalled
}
