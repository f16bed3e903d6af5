//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations:
//! - `readings` - Record ingestion and recent readings
//! - `ws` - Live reading feed
//! - `health` - Service health checks
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod error;
pub mod health;
pub mod openapi;
pub mod readings;
pub mod ws;

// Re-export commonly used types
pub use error::{ApiError, ApiResult, ErrorResponse};

// Re-export OpenAPI utilities for the gen-openapi binary
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /api
/// ├── /readings          - POST ingest, GET recent
/// ├── /ws                - Live reading feed (WebSocket)
/// └── /openapi.json      - OpenAPI specification
///
/// /endpoint              - Legacy alias of POST /api/readings
/// /sensor-data           - Legacy alias of GET /api/readings
/// /ws, /ws/              - Legacy aliases of /api/ws
/// ```
pub fn create_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config().server.cors_origins);

    Router::new()
        .route("/health", get(health::health_check))
        .nest(
            "/api",
            Router::new()
                .route(
                    "/readings",
                    get(readings::recent_readings).post(readings::ingest_reading),
                )
                .route("/ws", get(ws::live_feed))
                .route("/openapi.json", get(openapi::get_openapi_spec)),
        )
        // Paths still used by deployed gateways and dashboards
        .route("/endpoint", post(readings::ingest_reading))
        .route("/sensor-data", get(readings::recent_readings))
        .route("/ws", get(ws::live_feed))
        .route("/ws/", get(ws::live_feed))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
