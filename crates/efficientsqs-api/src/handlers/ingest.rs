//! POST <route_pattern>: accepts one raw message from a producer.

use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::ApiState;

#[derive(Serialize, Deserialize)]
pub struct IngestResponse {
    /// Size of the payload pushed onto the buffer, after compression.
    pub stored_bytes: usize,
}

pub async fn handle_ingest(
    State(state): State<ApiState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), (StatusCode, String)> {
    // over the body limit, or the upload broke off
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            state.stats.record_ingest(false);
            tracing::debug!(error = %rejection, "message body rejected");
            return Err((rejection.status(), rejection.body_text()));
        }
    };

    let stored = match state.policy.admit(&body) {
        Ok(stored) => stored,
        Err(e) => {
            state.stats.record_ingest(false);
            let status = if e.is_size_error() {
                StatusCode::PAYLOAD_TOO_LARGE
            } else if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                tracing::error!(error = %e, "failed to encode message");
                StatusCode::INTERNAL_SERVER_ERROR
            };
            tracing::debug!(error = %e, len = body.len(), "message rejected");
            return Err((status, e.to_string()));
        }
    };

    let stored_bytes = stored.len();
    if let Err(e) = state.buffer.push_newest(&state.buffer_queue, stored).await {
        state.stats.record_ingest(false);
        tracing::error!(error = %e, queue = %state.buffer_queue, "failed to store message");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to store message".to_string(),
        ));
    }

    state.stats.record_ingest(true);
    Ok((StatusCode::ACCEPTED, Json(IngestResponse { stored_bytes })))
}
