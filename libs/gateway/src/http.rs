use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::{Gateway, RejectReason, Submission};

// ═══════════════════════════════════════════════════════════════
//  POST /readings
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_readings(
    State(gateway): State<Arc<Gateway>>,
    body: Bytes,
) -> Response {
    gateway.submit(&body).into_response()
}

impl IntoResponse for Submission {
    fn into_response(self) -> Response {
        match self {
            Submission::Accepted => StatusCode::ACCEPTED.into_response(),
            Submission::Rejected(RejectReason::BadPayload(_)) => {
                (StatusCode::BAD_REQUEST, "Invalid request payload").into_response()
            }
            Submission::Rejected(RejectReason::Unavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Log unavailable").into_response()
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  GET /health
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_health() -> impl IntoResponse {
    "ok"
}
