//! OpenAPI specification generation for the coldtrace API.
//!
//! The generated document is served at `/api/openapi.json` and written to
//! the workspace root by the `gen-openapi` binary for dashboard client
//! generation.

use axum::Json;
use coldtrace_core::{DecodedPayload, DecodedReading};
use utoipa::OpenApi;

use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::readings::IngestRequest;

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for coldtrace.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "coldtrace API",
        version = "0.1.0",
        description = r#"
# coldtrace API

coldtrace ingests readings from BLE environmental sensors relayed by gateways,
raises a temperature alert when a sensor stays out of range, and streams
decoded readings to dashboards.

## Record format

`<trackingHead>;<imei>;<sensorMac>;<companyProtocol><payload>`

- `trackingHead`: 3-8 letters
- `imei`, `sensorMac`: 12 alphanumerics each
- then 4 company characters, 2 protocol digits and 26 hex digits of payload
  (flags, temperature, humidity, movement, angle, battery)

## Alerts

A sensor outside the configured temperature range for longer than the
debounce window triggers a single alert, after which tracking restarts.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local coldtrace server")
    ),
    tags(
        (
            name = "system",
            description = "Health checks"
        ),
        (
            name = "readings",
            description = "Record ingestion, recent readings and the live feed"
        )
    ),
    paths(
        super::health::health_check,
        super::readings::ingest_reading,
        super::readings::recent_readings,
        super::ws::live_feed,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            IngestRequest,
            DecodedPayload,
            DecodedReading,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "coldtrace API");
        assert!(spec.paths.paths.contains_key("/api/readings"));
        assert!(spec.paths.paths.contains_key("/health"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_json().unwrap();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("\"coldtrace API\""));
        assert!(json.contains("IngestRequest"));
    }
}
