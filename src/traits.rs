use crate::error::{Result, TransportError};
use crate::types::{Endpoint, Protocol};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// ListSource: 所有代理列表来源必须实现的接口
#[async_trait]
pub trait ListSource: Sync + Send {
    /// 来源名称 (如 "proxifly", "fresh")
    fn name(&self) -> &'static str;

    /// 实际请求的 URL (已代入国家代码等参数)
    fn url(&self, country: &str) -> String;

    /// 下载并解析列表，只保留匹配国家与协议的端点
    /// 任何网络错误或非 2xx 状态都必须返回 Err，不能返回空列表
    async fn fetch(&self, client: &Client, country: &str, protocol: Protocol)
        -> Result<Vec<Endpoint>>;
}

/// Bytes received by one download and how long it took.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transfer {
    pub bytes: u64,
    pub elapsed: Duration,
}

/// RelayTransport: "通过中继 E 在超时 T 内 GET 资源 R"
///
/// The tunnelling protocol is opaque to callers; implementations must bound the
/// whole transfer (connect, handshake, body) by `timeout`.
#[async_trait]
pub trait RelayTransport: Sync + Send {
    async fn download(
        &self,
        endpoint: &Endpoint,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<Transfer, TransportError>;
}
