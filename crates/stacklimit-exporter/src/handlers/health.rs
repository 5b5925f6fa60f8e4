use axum::{http::StatusCode, response::IntoResponse};

pub async fn health_live() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn index() -> impl IntoResponse {
    "OpenStack limits exporter\nMetrics are served at /metrics\n"
}
