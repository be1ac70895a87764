//! GET /status: loop state, counters and configured limits.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use efficientsqs_services::StatsSnapshot;

use super::ApiState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsInfo {
    pub min_message_size: usize,
    pub max_message_size: usize,
    pub max_batch_bytes: usize,
    pub max_batch_items: usize,
    pub polling_ms: u64,
    pub compression: String,
}

#[derive(Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    /// Messages waiting in the buffer. `None` when the buffer could not be asked.
    pub buffered: Option<usize>,
    pub limits: LimitsInfo,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let buffered = match state.buffer.len(&state.buffer_queue).await {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read buffer length");
            None
        }
    };

    Json(StatusResponse {
        stats: state.stats.snapshot(),
        buffered,
        limits: state.limits.clone(),
    })
}
