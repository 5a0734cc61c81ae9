use crate::error::{Result, ScraperError};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 中继协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Socks4,
    Socks5,
}

impl Protocol {
    /// Key used by the list sources for this protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Socks4 => "socks4",
            Protocol::Socks5 => "socks5",
        }
    }

    /// URL scheme handed to the HTTP client. SOCKS variants resolve DNS on the relay.
    pub fn proxy_scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Socks4 => "socks4a",
            Protocol::Socks5 => "socks5h",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 候选中继端点 (host:port)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Host is trimmed and lower-cased so that the same relay listed twice compares equal.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let host = host.trim().to_ascii_lowercase();
        if host.is_empty() || host.contains(char::is_whitespace) || port == 0 {
            return Err(ScraperError::InvalidEndpoint(format!("{}:{}", host, port)));
        }
        Ok(Self { host, port })
    }

    pub fn proxy_url(&self, protocol: Protocol) -> String {
        format!("{}://{}", protocol.proxy_scheme(), self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| ScraperError::InvalidEndpoint(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| ScraperError::InvalidEndpoint(s.to_string()))?;
        Endpoint::new(host, port)
    }
}

/// 单次探测的结果分类
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// Measured throughput in MB/s, always > 0.
    Speed(f64),
    /// Timeout, refused connection, non-2xx. Worth retrying with more time.
    SoftFailure,
    /// Security/handshake failure. Never retried.
    HardFailure,
}

impl Outcome {
    /// Comparable score: speed, 0 for soft failures, -1 for hard failures.
    pub fn score(&self) -> f64 {
        match self {
            Outcome::Speed(v) => *v,
            Outcome::SoftFailure => 0.0,
            Outcome::HardFailure => -1.0,
        }
    }
}

/// 探测结果
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub endpoint: Endpoint,
    pub outcome: Outcome,
    pub timeout: Duration,
}

/// Which pre-sized remote test file to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Payload {
    /// Used for the bulk rounds.
    #[default]
    Small,
    /// Used by the ranking pass.
    Large,
}

impl Payload {
    pub fn index(&self) -> u8 {
        match self {
            Payload::Small => 0,
            Payload::Large => 1,
        }
    }
}

/// 最终排名条目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    #[serde(serialize_with = "serialize_display")]
    pub endpoint: Endpoint,
    pub speed_mbps: f64,
}

fn serialize_display<S: serde::Serializer>(
    endpoint: &Endpoint,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalization() -> Result<()> {
        let a = Endpoint::new(" Proxy.Example.com ", 1080)?;
        let b: Endpoint = "proxy.example.com:1080".parse()?;
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "proxy.example.com:1080");
        assert_eq!(a.proxy_url(Protocol::Socks5), "socks5h://proxy.example.com:1080");
        assert_eq!(a.proxy_url(Protocol::Http), "http://proxy.example.com:1080");
        Ok(())
    }

    #[test]
    fn test_endpoint_rejects_garbage() {
        assert!(Endpoint::new("", 80).is_err());
        assert!(Endpoint::new("1.2.3.4", 0).is_err());
        assert!("1.2.3.4".parse::<Endpoint>().is_err());
        assert!("1.2.3.4:70000".parse::<Endpoint>().is_err());
        assert!("1.2.3.4:http".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_outcome_scores() {
        assert_eq!(Outcome::Speed(2.5).score(), 2.5);
        assert_eq!(Outcome::SoftFailure.score(), 0.0);
        assert!(Outcome::HardFailure.score() < Outcome::SoftFailure.score());
    }

    #[test]
    fn test_ranked_result_json() -> Result<()> {
        let r = RankedResult {
            endpoint: Endpoint::new("10.0.0.1", 1080)?,
            speed_mbps: 1.5,
        };
        let json = serde_json::to_string(&r)?;
        assert_eq!(json, r#"{"endpoint":"10.0.0.1:1080","speed_mbps":1.5}"#);
        Ok(())
    }
}
