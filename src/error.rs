use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to fetch list from {source_name}: {reason}")]
    ListFetch { source_name: String, reason: String },

    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("Invalid setting '{key}': {reason}")]
    InvalidSettings { key: &'static str, reason: String },

    #[error("Unknown list source: {0}")]
    UnknownSource(String),

    #[error("No proxies found")]
    NoEndpoints,
}

pub type Result<T> = std::result::Result<T, ScraperError>;

/// Failure of a single download through a relay. Never escapes the probe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// TLS / certificate negotiation failed; the endpoint cannot work with this transport.
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("timed out")]
    Timeout,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    pub fn is_hard(&self) -> bool {
        matches!(self, TransportError::Handshake(_))
    }
}
