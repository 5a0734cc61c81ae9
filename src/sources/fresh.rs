use super::{decode_records, endpoint_of, fetch_array, PortField};
use crate::error::Result;
use crate::traits::ListSource;
use crate::types::{Endpoint, Protocol};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// fresh-proxy-list: 一个全量列表，每条记录带国家代码和各协议的 "1"/"0" 标记
pub struct FreshProxyList {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Record {
    ip: String,
    port: PortField,
    #[serde(default)]
    country_code: Option<String>,
    // http / socks4 / socks5 flags plus whatever else the list carries
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

impl Record {
    fn supports(&self, protocol: Protocol) -> bool {
        match self.extra.get(protocol.as_str()) {
            Some(Value::String(s)) => s.trim() == "1",
            Some(Value::Number(n)) => n.as_u64() == Some(1),
            Some(Value::Bool(b)) => *b,
            _ => false,
        }
    }

    fn in_country(&self, country: &str) -> bool {
        self.country_code
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(country))
    }
}

impl FreshProxyList {
    pub fn new(url: &str) -> Self {
        Self { url: url.to_string() }
    }

    fn parse(&self, values: Vec<Value>, country: &str, protocol: Protocol) -> Vec<Endpoint> {
        decode_records::<Record>(self.name(), values)
            .into_iter()
            .filter(|r| r.in_country(country) && r.supports(protocol))
            .filter_map(|r| endpoint_of(&r.ip, &r.port))
            .collect()
    }
}

#[async_trait]
impl ListSource for FreshProxyList {
    fn name(&self) -> &'static str {
        "fresh"
    }

    fn url(&self, _country: &str) -> String {
        self.url.clone()
    }

    async fn fetch(&self, client: &Client, country: &str, protocol: Protocol) -> Result<Vec<Endpoint>> {
        let values = fetch_array(client, self.name(), &self.url(country)).await?;
        Ok(self.parse(values, country, protocol))
    }
}
