use async_trait::async_trait;
use reqwest::{StatusCode, header::ACCEPT};
use serde_json::Value;
use stacklimit_common::{ExporterError, Result};
use tracing::debug;

use crate::{
    session::Session,
    traits::LimitSource,
    types::{LimitReport, LimitValue},
};

pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
pub const ABSOLUTE_KEY: &str = "absolute";

impl Session {
    /// Nova's `absolute` block flattened to the top level, followed by the
    /// remaining `limits` keys.
    pub async fn fetch_compute_limits(&self) -> Result<LimitReport> {
        let limits = self.get_limits("compute", &self.grant.compute_endpoint).await?;
        flatten_compute_limits(limits)
    }

    /// Cinder's `limits` object as returned, with `absolute` still nested.
    pub async fn fetch_volume_limits(&self) -> Result<LimitReport> {
        self.get_limits("volume", &self.grant.volume_endpoint).await
    }

    async fn get_limits(&self, service: &str, endpoint: &str) -> Result<LimitReport> {
        let url = format!("{endpoint}/limits");
        debug!(service, %url, "fetching limits");

        let response = self
            .client
            .get(&url)
            .header(AUTH_TOKEN_HEADER, &self.grant.token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| transport_error(service, &err))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ExporterError::Authentication(format!(
                "{service} limits request rejected the token"
            )));
        }
        if !status.is_success() {
            return Err(ExporterError::upstream(format!(
                "{service} limits request returned status {status}"
            )));
        }

        let body: Value = response.json().await.map_err(|err| {
            if err.is_timeout() {
                transport_error(service, &err)
            } else {
                ExporterError::upstream(format!("{service} limits response is not valid json: {err}"))
            }
        })?;

        match body {
            Value::Object(mut map) => match map.remove("limits") {
                Some(Value::Object(limits)) => Ok(LimitReport::from_json_object(limits)),
                _ => Err(ExporterError::upstream(format!(
                    "{service} limits response has no `limits` object"
                ))),
            },
            _ => Err(ExporterError::upstream(format!(
                "{service} limits response is not a json object"
            ))),
        }
    }
}

fn transport_error(service: &str, err: &reqwest::Error) -> ExporterError {
    if err.is_timeout() {
        ExporterError::upstream_timeout(format!("{service} limits request timed out"))
    } else {
        ExporterError::upstream(format!("{service} limits request failed: {err}"))
    }
}

pub fn flatten_compute_limits(mut limits: LimitReport) -> Result<LimitReport> {
    let absolute = match limits.remove(ABSOLUTE_KEY) {
        Some(LimitValue::Nested(absolute)) => absolute,
        _ => {
            return Err(ExporterError::upstream(
                "compute limits response has no `absolute` object",
            ));
        }
    };

    Ok(absolute.into_iter().chain(limits).collect())
}

#[async_trait]
impl LimitSource for Session {
    async fn compute_limits(&self) -> Result<LimitReport> {
        self.fetch_compute_limits().await
    }

    async fn volume_limits(&self) -> Result<LimitReport> {
        self.fetch_volume_limits().await
    }
}
