// src/handlers/health.rs
use axum::{http::StatusCode, response::IntoResponse, Extension, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;

use crate::context::RequestId;

/// GET /healthz
pub async fn health_check(Extension(request_id): Extension<RequestId>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "request_id": request_id.to_string() }))
}

/// GET /metrics
pub async fn metrics_endpoint(handle: PrometheusHandle) -> impl IntoResponse {
    (StatusCode::OK, handle.render())
}
