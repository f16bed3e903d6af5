//! Health check API endpoint.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "ok",
    "version": "0.1.0",
    "subscribers": 2,
    "tracked_devices": 1
}))]
pub struct HealthResponse {
    /// Service status.
    #[schema(example = "ok")]
    pub status: String,

    /// Service version from Cargo.toml.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Live WebSocket subscribers.
    #[schema(example = 2, minimum = 0)]
    pub subscribers: usize,

    /// Sensors currently out of range and awaiting the debounce window.
    #[schema(example = 1, minimum = 0)]
    pub tracked_devices: usize,
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Check service health",
    description = "Returns service status, the number of live feed subscribers and \
        the number of sensors currently out of range.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let pipeline = state.pipeline();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        subscribers: pipeline.hub().subscriber_count(),
        tracked_devices: pipeline.tracker().tracked_count(),
    })
}
