use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("upstream error: {message}")]
    Upstream { message: String, timed_out: bool },
    #[error("malformed limit report: {0}")]
    MalformedReport(String),
}

impl ExporterError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn upstream_timeout(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            timed_out: true,
        }
    }

    /// Only control-plane failures are worth retrying on the next scrape;
    /// the other kinds need an operator or a code change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Authentication(_) => "authentication",
            Self::Upstream { .. } => "upstream",
            Self::MalformedReport(_) => "malformed_report",
        }
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;
