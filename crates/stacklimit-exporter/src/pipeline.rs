use std::sync::Arc;

use stacklimit_common::{ExporterError, Result};
use stacklimit_openstack::{ConfigSource, ConnectionConfig, Connector};
use tracing::debug;

use crate::encoder::{
    COMPUTE_NAMESPACE, VOLUME_NAMESPACE, VOLUME_UNWRAP_KEY, encode, render_body,
};

/// One scrape: load config, connect, fetch both reports, encode.
///
/// Nothing is kept between calls; the config and session live on this
/// call's stack and are dropped when it returns or is cancelled.
#[derive(Clone)]
pub struct Scraper {
    config: Arc<dyn ConfigSource>,
    connector: Arc<dyn Connector>,
}

impl Scraper {
    pub fn new(config: Arc<dyn ConfigSource>, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    pub async fn scrape(&self) -> Result<String> {
        let config = self.config.load().await?;
        let result = self.collect(&config).await;
        if let Err(ExporterError::Authentication(_)) = &result {
            self.connector.invalidate(&config);
        }
        result
    }

    async fn collect(&self, config: &ConnectionConfig) -> Result<String> {
        let source = self.connector.connect(config).await?;

        // try_join drops the other fetch as soon as one fails.
        let (compute, volume) = tokio::try_join!(source.compute_limits(), source.volume_limits())?;
        debug!(
            compute_fields = compute.len(),
            volume_fields = volume.len(),
            "limit reports fetched"
        );

        let mut lines = encode(&compute, COMPUTE_NAMESPACE, None)?;
        lines.extend(encode(&volume, VOLUME_NAMESPACE, Some(VOLUME_UNWRAP_KEY))?);
        Ok(render_body(&lines))
    }
}
