use super::{decode_records, endpoint_of, fetch_array, PortField};
use crate::error::Result;
use crate::traits::ListSource;
use crate::types::{Endpoint, Protocol};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

/// proxifly 按国家分文件发布，因此国家过滤已经由 URL 完成
pub struct Proxifly {
    url_template: String,
}

#[derive(Debug, Deserialize)]
struct Record {
    ip: String,
    port: PortField,
    protocol: String,
}

impl Proxifly {
    pub fn new(url_template: &str) -> Self {
        Self {
            url_template: url_template.to_string(),
        }
    }

    fn parse(&self, values: Vec<Value>, protocol: Protocol) -> Vec<Endpoint> {
        decode_records::<Record>(self.name(), values)
            .into_iter()
            .filter(|r| r.protocol.eq_ignore_ascii_case(protocol.as_str()))
            .filter_map(|r| endpoint_of(&r.ip, &r.port))
            .collect()
    }
}

#[async_trait]
impl ListSource for Proxifly {
    fn name(&self) -> &'static str {
        "proxifly"
    }

    fn url(&self, country: &str) -> String {
        self.url_template.replace("{country}", country)
    }

    async fn fetch(&self, client: &Client, country: &str, protocol: Protocol) -> Result<Vec<Endpoint>> {
        let values = fetch_array(client, self.name(), &self.url(country)).await?;
        Ok(self.parse(values, protocol))
    }
}
