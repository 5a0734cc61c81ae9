pub mod fresh;
pub mod proxifly;

use crate::config::Settings;
use crate::error::{Result, ScraperError};
use crate::traits::ListSource;
use crate::types::{Endpoint, Protocol};
use crate::utils;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const SUPPORTED_SOURCES: &[&str] = &["proxifly", "fresh"];

pub fn get_source(name: &str, settings: &Settings) -> Result<Box<dyn ListSource>> {
    match name.to_lowercase().as_str() {
        "proxifly" => Ok(Box::new(proxifly::Proxifly::new(&settings.sources.proxifly_url))),
        "fresh" => Ok(Box::new(fresh::FreshProxyList::new(&settings.sources.fresh_url))),
        _ => Err(ScraperError::UnknownSource(format!(
            "'{}'. Available: {}",
            name,
            SUPPORTED_SOURCES.join(", ")
        ))),
    }
}

/// 所有已注册的来源
pub fn all_sources(settings: &Settings) -> Result<Vec<Box<dyn ListSource>>> {
    SUPPORTED_SOURCES
        .iter()
        .map(|name| get_source(name, settings))
        .collect()
}

/// 依次抓取所有来源并合并去重
///
/// 任意一个来源失败都会让整次运行失败。
pub async fn collect_endpoints(
    sources: &[Box<dyn ListSource>],
    client: &Client,
    country: &str,
    protocol: Protocol,
) -> Result<Vec<Endpoint>> {
    let mut all = Vec::new();
    for source in sources {
        let endpoints = source.fetch(client, country, protocol).await?;
        info!("{} listed {} {} proxies", source.name(), endpoints.len(), protocol);
        all.extend(endpoints);
    }

    let total = all.len();
    let unique = utils::dedup_endpoints(all);
    if unique.len() < total {
        debug!("dropped {} duplicate endpoints", total - unique.len());
    }
    Ok(unique)
}

/// Port as listed by the sources: either a JSON number or a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PortField {
    Number(u64),
    Text(String),
}

impl PortField {
    pub fn value(&self) -> Option<u16> {
        match self {
            PortField::Number(n) => u16::try_from(*n).ok(),
            PortField::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// GET `url` and decode the body as a JSON array.
pub(crate) async fn fetch_array(client: &Client, source_name: &str, url: &str) -> Result<Vec<Value>> {
    let fail = |reason: String| ScraperError::ListFetch {
        source_name: source_name.to_string(),
        reason,
    };

    let resp = client.get(url).send().await.map_err(|e| fail(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(fail(format!("HTTP {}", status)));
    }

    let body = resp.text().await.map_err(|e| fail(e.to_string()))?;
    serde_json::from_str(&body).map_err(|e| fail(format!("not a JSON list: {}", e)))
}

/// 逐条转换为强类型记录，跳过不合法的条目
pub(crate) fn decode_records<T: DeserializeOwned>(source_name: &str, values: Vec<Value>) -> Vec<T> {
    let total = values.len();
    let records: Vec<T> = values
        .into_iter()
        .filter_map(|v| match serde_json::from_value(v) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("{}: skipping malformed record: {}", source_name, e);
                None
            }
        })
        .collect();

    if records.len() < total {
        warn!(
            "{}: skipped {} of {} malformed records",
            source_name,
            total - records.len(),
            total
        );
    }
    records
}

/// Builds an endpoint from a record's fields, `None` when they don't form one.
pub(crate) fn endpoint_of(ip: &str, port: &PortField) -> Option<Endpoint> {
    Endpoint::new(ip, port.value()?).ok()
}


#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedSource {
        name: &'static str,
        listed: Option<Vec<&'static str>>,
    }

    #[async_trait]
    impl ListSource for FixedSource {
        fn name(&self) -> &'static str {
            self.name
        }

        fn url(&self, _country: &str) -> String {
            format!("memory://{}", self.name)
        }

        async fn fetch(&self, _client: &Client, _country: &str, _protocol: Protocol) -> Result<Vec<Endpoint>> {
            match &self.listed {
                Some(list) => list.iter().map(|s| s.parse()).collect(),
                None => Err(ScraperError::ListFetch {
                    source_name: self.name.to_string(),
                    reason: "HTTP 503 Service Unavailable".to_string(),
                }),
            }
        }
    }

    fn fixed(name: &'static str, listed: Option<Vec<&'static str>>) -> Box<dyn ListSource> {
        Box::new(FixedSource { name, listed })
    }

    #[tokio::test]
    async fn test_collect_dedups_across_sources() -> Result<()> {
        let sources = vec![
            fixed("a", Some(vec!["1.1.1.1:1080", "2.2.2.2:1080"])),
            fixed("b", Some(vec!["2.2.2.2:1080", "3.3.3.3:1080", "1.1.1.1:1080"])),
        ];

        let endpoints = collect_endpoints(&sources, &Client::new(), "US", Protocol::Socks5).await?;
        let listed: Vec<String> = endpoints.iter().map(|e| e.to_string()).collect();
        assert_eq!(listed, vec!["1.1.1.1:1080", "2.2.2.2:1080", "3.3.3.3:1080"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_collect_fails_when_any_source_fails() {
        let sources = vec![fixed("a", Some(vec!["1.1.1.1:1080"])), fixed("b", None)];

        let err = collect_endpoints(&sources, &Client::new(), "US", Protocol::Socks5)
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::ListFetch { ref source_name, .. } if source_name == "b"));
    }

    #[tokio::test]
    async fn test_fetch_array_rejects_error_status() {
        let base = test_server::serve_once("404 Not Found", "[]").await;
        let err = fetch_array(&test_server::client(), "test", &base).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_array_rejects_non_list() {
        let base = test_server::serve_once("200 OK", r#"{"error":"nope"}"#).await;
        let err = fetch_array(&test_server::client(), "test", &base).await.unwrap_err();
        assert!(matches!(err, ScraperError::ListFetch { .. }));
    }

    #[test]
    fn test_port_field() {
        assert_eq!(PortField::Number(8080).value(), Some(8080));
        assert_eq!(PortField::Text(" 1080 ".into()).value(), Some(1080));
        assert_eq!(PortField::Number(70000).value(), None);
        assert_eq!(PortField::Text("abc".into()).value(), None);
        assert_eq!(PortField::Number(0).value().and_then(|p| Endpoint::new("1.1.1.1", p).ok()), None);
    }

    #[test]
    fn test_unknown_source() {
        let settings = Settings::defaults().unwrap();
        assert!(get_source("proxifly", &settings).is_ok());
        assert!(matches!(get_source("nope", &settings), Err(ScraperError::UnknownSource(_))));
        assert_eq!(all_sources(&settings).unwrap().len(), 2);
    }
}
