use std::time::Duration;

use async_trait::async_trait;
use stacklimit_common::Result;
use tracing::debug;

use crate::{
    cache::SessionCache,
    config::ConnectionConfig,
    session::{Session, authenticate, build_client},
    traits::{Connector, LimitSource},
};

/// Authenticates against Keystone on every scrape unless a session cache is
/// configured. Each call still gets its own HTTP client.
#[derive(Default)]
pub struct KeystoneConnector {
    cache: Option<SessionCache>,
}

impl KeystoneConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_cache(ttl: Duration) -> Self {
        Self {
            cache: (!ttl.is_zero()).then(|| SessionCache::new(ttl)),
        }
    }

    pub fn session_cache(&self) -> Option<&SessionCache> {
        self.cache.as_ref()
    }

    pub async fn create_session(&self, config: &ConnectionConfig) -> Result<Session> {
        let Some(cache) = &self.cache else {
            return Session::connect(config).await;
        };

        let client = build_client(config)?;
        let fingerprint = config.fingerprint();
        if let Some(grant) = cache.get(&fingerprint) {
            debug!(region = %config.region, "reusing cached identity token");
            return Ok(Session::from_grant(client, grant));
        }

        let grant = authenticate(&client, config).await?;
        cache.insert(fingerprint, grant.clone());
        Ok(Session::from_grant(client, grant))
    }
}

#[async_trait]
impl Connector for KeystoneConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn LimitSource>> {
        Ok(Box::new(self.create_session(config).await?))
    }

    fn invalidate(&self, config: &ConnectionConfig) {
        if let Some(cache) = &self.cache {
            debug!(region = %config.region, "dropping cached identity token");
            cache.invalidate(&config.fingerprint());
        }
    }
}
