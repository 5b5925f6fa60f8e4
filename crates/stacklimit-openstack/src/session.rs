use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use stacklimit_common::{ExporterError, Result};
use tracing::{debug, info};

use crate::config::{ConnectionConfig, Identity};

pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
pub const COMPUTE_SERVICE_TYPES: &[&str] = &["compute"];
pub const VOLUME_SERVICE_TYPES: &[&str] = &["volumev3", "block-storage", "volumev2"];

/// Everything a session needs besides its HTTP client.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub compute_endpoint: String,
    pub volume_endpoint: String,
}

/// An authenticated handle bound to one scrape. It owns its client, so
/// dropping it closes every connection it opened.
pub struct Session {
    pub(crate) client: reqwest::Client,
    pub(crate) grant: AuthGrant,
}

impl Session {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let client = build_client(config)?;
        let grant = authenticate(&client, config).await?;
        Ok(Self::from_grant(client, grant))
    }

    pub fn from_grant(client: reqwest::Client, grant: AuthGrant) -> Self {
        Self { client, grant }
    }

    pub fn grant(&self) -> &AuthGrant {
        &self.grant
    }
}

/// A fresh client per call; the TLS policy never leaks into other sessions.
pub fn build_client(config: &ConnectionConfig) -> Result<reqwest::Client> {
    config.validate()?;
    reqwest::Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.timeout)
        .danger_accept_invalid_certs(!config.verify_tls)
        .build()
        .map_err(|err| ExporterError::Configuration(format!("failed to build http client: {err}")))
}

pub async fn authenticate(client: &reqwest::Client, config: &ConnectionConfig) -> Result<AuthGrant> {
    let url = config.token_url()?;
    debug!(%url, region = %config.region, "requesting identity token");

    let response = client
        .post(url.clone())
        .json(&token_request_body(config))
        .send()
        .await
        .map_err(|err| {
            if err.is_timeout() {
                ExporterError::upstream_timeout(format!("identity service {url} timed out"))
            } else {
                ExporterError::Authentication(format!("identity service {url} unreachable: {err}"))
            }
        })?;

    let status = response.status();
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(ExporterError::Authentication(format!(
            "identity service rejected credentials ({status})"
        )));
    }
    if !status.is_success() {
        return Err(ExporterError::Authentication(format!(
            "identity service returned status {status}"
        )));
    }

    let token = response
        .headers()
        .get(SUBJECT_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| {
            ExporterError::Authentication(format!(
                "identity response is missing the {SUBJECT_TOKEN_HEADER} header"
            ))
        })?;

    let body: TokenResponse = response.json().await.map_err(|err| {
        if err.is_timeout() {
            ExporterError::upstream_timeout(format!("identity service {url} timed out"))
        } else {
            ExporterError::Authentication(format!("invalid identity response: {err}"))
        }
    })?;

    let catalog = &body.token.catalog;
    let grant = AuthGrant {
        token,
        expires_at: body
            .token
            .expires_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc)),
        compute_endpoint: resolve_endpoint(catalog, COMPUTE_SERVICE_TYPES, config)?,
        volume_endpoint: resolve_endpoint(catalog, VOLUME_SERVICE_TYPES, config)?,
    };

    info!(
        region = %config.region,
        compute = %grant.compute_endpoint,
        volume = %grant.volume_endpoint,
        "identity token issued"
    );
    Ok(grant)
}

pub fn token_request_body(config: &ConnectionConfig) -> Value {
    let identity = match &config.identity {
        Identity::Password { username, password } => json!({
            "methods": ["password"],
            "password": {
                "user": {
                    "name": username,
                    "domain": { "id": config.domain_id },
                    "password": password,
                }
            }
        }),
        Identity::Token(token) => json!({
            "methods": ["token"],
            "token": { "id": token }
        }),
    };

    json!({
        "auth": {
            "identity": identity,
            "scope": {
                "project": {
                    "id": config.project_id,
                    "domain": { "id": config.domain_id },
                }
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    expires_at: Option<String>,
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEndpoint {
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    pub url: String,
}

impl CatalogEndpoint {
    fn serves(&self, interface: &str, region: &str) -> bool {
        self.interface.eq_ignore_ascii_case(interface)
            && (self.region_id.as_deref() == Some(region) || self.region.as_deref() == Some(region))
    }
}

/// Service types are tried in order; the first with a matching endpoint wins.
pub fn resolve_endpoint(
    catalog: &[CatalogEntry],
    service_types: &[&str],
    config: &ConnectionConfig,
) -> Result<String> {
    service_types
        .iter()
        .find_map(|service_type| {
            catalog
                .iter()
                .filter(|entry| entry.service_type == *service_type)
                .flat_map(|entry| entry.endpoints.iter())
                .find(|endpoint| endpoint.serves(&config.interface, &config.region))
        })
        .map(|endpoint| endpoint.url.trim_end_matches('/').to_string())
        .ok_or_else(|| {
            ExporterError::Configuration(format!(
                "no {} {} endpoint in region {}",
                config.interface,
                service_types.join("/"),
                config.region
            ))
        })
}
