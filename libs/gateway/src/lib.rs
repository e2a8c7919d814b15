mod error;
mod http;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;

use firehose_api::{FirehoseError, LogProducer, LogRecord, Reading};

pub use error::GatewayError;

// ═══════════════════════════════════════════════════════════════
//  Submission
// ═══════════════════════════════════════════════════════════════

/// Итог `Gateway::submit`.
///
/// `Accepted` означает «принято и передано клиенту лога», а не
/// «durably записано» — подтверждение брокера вызывающему не видно.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Тело не декодируется в Reading. HTTP 400.
    BadPayload(String),
    /// Клиент лога отказался принять запись. HTTP 503.
    Unavailable(String),
}

// ═══════════════════════════════════════════════════════════════
//  Gateway
// ═══════════════════════════════════════════════════════════════

/// Ingress gateway: validate → canonical encode → publish keyed by sensor_id.
///
/// Producer передаётся явно и разделяется всеми handler'ами.
pub struct Gateway {
    producer: Arc<dyn LogProducer>,
    topic: String,
}

impl Gateway {
    pub fn new(producer: Arc<dyn LogProducer>, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Принять одно измерение из сырого тела запроса.
    pub fn submit(&self, body: &[u8]) -> Submission {
        match Reading::decode(body) {
            Ok(reading) => self.relay(&reading),
            Err(e) => {
                tracing::debug!(error = %e, "rejecting bad payload");
                Submission::Rejected(RejectReason::BadPayload(e.message().to_string()))
            }
        }
    }

    /// Передать уже провалидированное измерение в лог. Ровно одна попытка.
    ///
    /// Измерение, которое store не сможет сохранить, отклоняется здесь же:
    /// ниже по потоку оно было бы молча отброшено.
    pub fn relay(&self, reading: &Reading) -> Submission {
        if let Err(e) = reading.check_storable() {
            tracing::debug!(error = %e, "rejecting unstorable reading");
            return Submission::Rejected(RejectReason::BadPayload(e.message().to_string()));
        }
        let payload = match reading.encode() {
            Ok(p) => p,
            Err(e) => return Submission::Rejected(RejectReason::BadPayload(e.message().to_string())),
        };
        let record = LogRecord::new(reading.key(), payload);

        match self.producer.publish(&self.topic, record) {
            Ok(()) => Submission::Accepted,
            Err(e) => {
                tracing::warn!(topic = %self.topic, sensor_id = %reading.sensor_id(), error = %e, "handoff refused");
                Submission::Rejected(RejectReason::Unavailable(e.message().to_string()))
            }
        }
    }

    /// Дождаться доставки всего, что уже передано в лог.
    pub async fn flush(&self, timeout: Duration) -> Result<(), FirehoseError> {
        self.producer.flush(timeout).await
    }
}

// ═══════════════════════════════════════════════════════════════
//  HTTP server
// ═══════════════════════════════════════════════════════════════

pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/readings", post(http::handle_readings))
        .route("/health", get(http::handle_health))
        .with_state(gateway)
}

/// HTTP сервер gateway. Завершается после отмены `shutdown`
/// (in-flight запросы дорабатывают).
pub async fn run(
    addr: SocketAddr,
    gateway: Arc<Gateway>,
    shutdown: CancellationToken,
) -> Result<(), GatewayError> {
    let app = router(gateway);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| GatewayError::Bind { addr, source })?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(GatewayError::Serve)?;

    Ok(())
}
