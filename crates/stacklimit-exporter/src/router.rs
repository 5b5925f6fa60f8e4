use std::sync::Arc;

use axum::{Router, routing::get};
use stacklimit_openstack::{ConfigSource, Connector};
use tower_http::trace::TraceLayer;

use crate::{handlers, pipeline::Scraper};

pub struct ExporterState {
    pub scraper: Scraper,
}

impl ExporterState {
    pub fn new(config: Arc<dyn ConfigSource>, connector: Arc<dyn Connector>) -> Self {
        Self {
            scraper: Scraper::new(config, connector),
        }
    }
}

pub fn exporter_router(state: Arc<ExporterState>) -> Router {
    Router::new()
        .route("/", get(handlers::health::index))
        .route("/health/live", get(handlers::health::health_live))
        .route("/metrics", get(handlers::metrics::scrape_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
