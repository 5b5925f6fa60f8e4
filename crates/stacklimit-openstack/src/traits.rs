use async_trait::async_trait;
use stacklimit_common::Result;

use crate::{config::ConnectionConfig, types::LimitReport};

/// Produces the connection parameters for one scrape.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load(&self) -> Result<ConnectionConfig>;
}

/// An authenticated handle able to read both limit reports.
#[async_trait]
pub trait LimitSource: Send + Sync {
    async fn compute_limits(&self) -> Result<LimitReport>;
    async fn volume_limits(&self) -> Result<LimitReport>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn LimitSource>>;

    /// Forget any state kept for `config` after its credentials were rejected.
    fn invalidate(&self, _config: &ConnectionConfig) {}
}
