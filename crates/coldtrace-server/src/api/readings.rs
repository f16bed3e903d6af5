//! Reading ingestion and query endpoints.
//!
//! Gateways post raw manufacturer-data records here. Each accepted record is
//! decoded, checked against the temperature alarm, persisted and pushed to
//! every live feed subscriber before the response is sent.

use axum::extract::State;
use axum::Json;
use coldtrace_core::DecodedReading;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::ApiResult;
use crate::state::SharedState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Raw record posted by a gateway.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "sensor_data": "TRK;865412345678;AC233FA1B2C3;0D1010A50BB86400FF1A2B3C00"
}))]
pub struct IngestRequest {
    /// Semicolon-separated manufacturer-data record.
    #[schema(example = "TRK;865412345678;AC233FA1B2C3;0D1010A50BB86400FF1A2B3C00")]
    pub sensor_data: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Ingest one raw sensor record.
#[utoipa::path(
    post,
    path = "/api/readings",
    tag = "readings",
    operation_id = "ingestReading",
    summary = "Ingest a raw sensor record",
    description = "Decodes a BLE manufacturer-data record, evaluates the temperature \
        alarm, persists the reading and publishes it to live subscribers. Only a \
        malformed record fails the request; storage and alert delivery problems \
        are logged server-side.",
    request_body = IngestRequest,
    responses(
        (status = 200, description = "Record decoded and published", body = DecodedReading),
        (status = 400, description = "Record does not match the wire format", body = super::error::ErrorResponse)
    )
)]
pub async fn ingest_reading(
    State(state): State<SharedState>,
    Json(request): Json<IngestRequest>,
) -> ApiResult<Json<DecodedReading>> {
    let outcome = state.pipeline().ingest(&request.sensor_data).await?;
    Ok(Json(DecodedReading::clone(&outcome.reading)))
}

/// Most recent persisted readings.
#[utoipa::path(
    get,
    path = "/api/readings",
    tag = "readings",
    operation_id = "recentReadings",
    summary = "List recent readings",
    description = "Returns the five most recently persisted readings, newest first.",
    responses(
        (status = 200, description = "Recent readings, newest first", body = Vec<DecodedReading>),
        (status = 500, description = "Store could not be read", body = super::error::ErrorResponse)
    )
)]
pub async fn recent_readings(
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<DecodedReading>>> {
    Ok(Json(state.pipeline().recent_readings().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_request_deserialization() {
        let request: IngestRequest =
            serde_json::from_str(r#"{"sensor_data":"TRK;1;2;3"}"#).unwrap();
        assert_eq!(request.sensor_data, "TRK;1;2;3");
    }

    #[test]
    fn test_ingest_request_requires_sensor_data() {
        assert!(serde_json::from_str::<IngestRequest>(r#"{"data":"x"}"#).is_err());
    }
}
