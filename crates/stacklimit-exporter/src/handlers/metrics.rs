use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use tracing::{info, warn};

use crate::{error::ScrapeError, router::ExporterState};

pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// Runs a full scrape. The body is either every metric line or a one-line
/// diagnostic with a 5xx status, never a partial set.
pub async fn scrape_metrics(
    State(state): State<Arc<ExporterState>>,
) -> Result<Response, ScrapeError> {
    let started_at = Instant::now();

    let payload = match state.scraper.scrape().await {
        Ok(payload) => payload,
        Err(err) => {
            warn!(
                error = %err,
                kind = err.kind(),
                retryable = err.is_retryable(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "scrape failed"
            );
            return Err(ScrapeError(err));
        }
    };

    info!(
        lines = payload.lines().count(),
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        "scrape completed"
    );

    let mut response = Response::new(Body::from(payload));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(CONTENT_TYPE_TEXT),
    );

    Ok(response)
}
