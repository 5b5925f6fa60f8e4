use std::{fmt, path::PathBuf, time::Duration};

use async_trait::async_trait;
use configparser::ini::Ini;
use sha2::{Digest, Sha256};
use stacklimit_common::{ExporterError, Result};
use url::Url;

use crate::traits::ConfigSource;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_INTERFACE: &str = "public";
pub const GLOBAL_SECTION: &str = "global";

#[derive(Clone, PartialEq, Eq)]
pub enum Identity {
    Password { username: String, password: String },
    Token(String),
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub auth_url: String,
    pub identity: Identity,
    pub project_id: String,
    pub domain_id: String,
    pub region: String,
    pub interface: String,
    pub verify_tls: bool,
    pub timeout: Duration,
}

impl ConnectionConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks every required field without touching the network and returns
    /// the parsed identity endpoint.
    pub fn validate(&self) -> Result<Url> {
        let auth_url = self.auth_url.trim();
        if auth_url.is_empty() {
            return Err(ExporterError::Configuration("auth-url is empty".to_string()));
        }

        let url = Url::parse(auth_url).map_err(|err| {
            ExporterError::Configuration(format!("invalid auth-url {auth_url:?}: {err}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ExporterError::Configuration(format!(
                "auth-url {auth_url:?} must be an http(s) URL with a host"
            )));
        }

        match &self.identity {
            Identity::Password { username, password } => {
                require("username", username)?;
                require("password", password)?;
            }
            Identity::Token(token) => require("token", token)?,
        }
        require("tenant-id", &self.project_id)?;
        require("domain-id", &self.domain_id)?;
        require("region", &self.region)?;
        require("interface", &self.interface)?;

        Ok(url)
    }

    pub fn token_url(&self) -> Result<Url> {
        let base = self.validate()?;
        let trimmed = base.as_str().trim_end_matches('/');
        let target = if trimmed.ends_with("/v3") {
            format!("{trimmed}/auth/tokens")
        } else {
            format!("{trimmed}/v3/auth/tokens")
        };

        Url::parse(&target).map_err(|err| {
            ExporterError::Configuration(format!("invalid identity token URL {target:?}: {err}"))
        })
    }

    /// Stable digest over every field, secrets included.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        let (kind, first, second) = match &self.identity {
            Identity::Password { username, password } => ("password", username.as_str(), password.as_str()),
            Identity::Token(token) => ("token", token.as_str(), ""),
        };
        for field in [
            self.auth_url.as_str(),
            kind,
            first,
            second,
            self.project_id.as_str(),
            self.domain_id.as_str(),
            self.region.as_str(),
            self.interface.as_str(),
            if self.verify_tls { "verify" } else { "insecure" },
        ] {
            hasher.update(field.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(self.timeout.as_millis().to_le_bytes());
        hex::encode(hasher.finalize())
    }

    /// Builds a config from the `[Global]` section of a `cloud.conf` file.
    pub fn from_cloud_conf(text: &str) -> Result<Self> {
        let mut ini = Ini::new();
        let sections = ini.read(text.to_string()).map_err(|err| {
            ExporterError::Configuration(format!("invalid cloud.conf: {err}"))
        })?;
        if !sections.contains_key(GLOBAL_SECTION) {
            return Err(ExporterError::Configuration(
                "cloud.conf has no [Global] section".to_string(),
            ));
        }

        let value = |key: &str| ini.get(GLOBAL_SECTION, key).map(|raw| unquote(&raw).to_string());
        let get = |key: &str| -> Result<String> {
            value(key).ok_or_else(|| {
                ExporterError::Configuration(format!("missing key `{key}` in [Global]"))
            })
        };

        let identity = match value("token").filter(|token| !token.is_empty()) {
            Some(token) => Identity::Token(token),
            None => Identity::Password {
                username: get("username")?,
                password: get("password")?,
            },
        };

        let tls_insecure = ini
            .getboolcoerce(GLOBAL_SECTION, "tls-insecure")
            .map_err(|err| {
                ExporterError::Configuration(format!("tls-insecure must be a boolean: {err}"))
            })?
            .ok_or_else(|| {
                ExporterError::Configuration("missing key `tls-insecure` in [Global]".to_string())
            })?;

        Ok(Self {
            auth_url: get("auth-url")?,
            identity,
            project_id: get("tenant-id")?,
            domain_id: get("domain-id")?,
            region: get("region")?,
            interface: value("interface").unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
            verify_tls: !tls_insecure,
            timeout: DEFAULT_TIMEOUT,
        })
    }
}

fn require(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ExporterError::Configuration(format!("{key} is empty")));
    }
    Ok(())
}

/// `cloud.conf` files written for the Python tooling quote credentials.
fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}

/// Re-reads the file on every scrape so edits take effect without a restart.
#[derive(Debug, Clone)]
pub struct CloudConfFile {
    path: PathBuf,
    timeout: Duration,
}

impl CloudConfFile {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl ConfigSource for CloudConfFile {
    async fn load(&self) -> Result<ConnectionConfig> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            ExporterError::Configuration(format!(
                "failed to read {}: {err}",
                self.path.display()
            ))
        })?;

        Ok(ConnectionConfig::from_cloud_conf(&text)?.with_timeout(self.timeout))
    }
}

#[derive(Debug, Clone)]
pub struct StaticConfig(pub ConnectionConfig);

#[async_trait]
impl ConfigSource for StaticConfig {
    async fn load(&self) -> Result<ConnectionConfig> {
        Ok(self.0.clone())
    }
}
