use crate::error::TransportError;
use crate::traits::{RelayTransport, Transfer};
use crate::types::{Endpoint, Protocol};
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use std::error::Error as StdError;
use std::time::{Duration, Instant};

// 这些关键字出现在错误链中时，说明失败发生在 TLS 层，换超时也救不回来
// 只匹配 TLS 库自己的错误文本，裸的 "ssl"/"tls" 太容易撞上主机名
const HANDSHAKE_MARKERS: &[&str] = &["certificate", "handshake", "ssl routines", "wrong version number"];

/// 基于 reqwest 的中继下载实现
pub struct ReqwestTransport {
    protocol: Protocol,
}

impl ReqwestTransport {
    pub fn new(protocol: Protocol) -> Self {
        Self { protocol }
    }

    fn client_for(&self, endpoint: &Endpoint, timeout: Duration) -> Result<Client, TransportError> {
        let proxy = Proxy::all(endpoint.proxy_url(self.protocol))
            .map_err(|e| TransportError::Request(e.to_string()))?;

        // One-off client per probe: no pooled connection may leak between relays.
        Client::builder()
            .proxy(proxy)
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))
    }
}

#[async_trait]
impl RelayTransport for ReqwestTransport {
    async fn download(
        &self,
        endpoint: &Endpoint,
        url: &str,
        timeout: Duration,
    ) -> Result<Transfer, TransportError> {
        let client = self.client_for(endpoint, timeout)?;
        let start = Instant::now();

        let mut resp = client.get(url).send().await.map_err(classify)?;
        if !resp.status().is_success() {
            return Err(TransportError::Status(resp.status().as_u16()));
        }

        let mut bytes = 0u64;
        while let Some(chunk) = resp.chunk().await.map_err(classify)? {
            bytes += chunk.len() as u64;
        }

        Ok(Transfer {
            bytes,
            elapsed: start.elapsed(),
        })
    }
}

/// 将 reqwest 错误归类为软失败或硬失败
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }
    // 去掉 URL，错误文本里只剩传输层信息
    let err = err.without_url();
    if is_handshake_failure(&err) {
        return TransportError::Handshake(err.to_string());
    }
    if let Some(status) = err.status() {
        return TransportError::Status(status.as_u16());
    }
    TransportError::Request(err.to_string())
}

/// Looks for a TLS-level failure among the causes of `err`.
///
/// The outer error itself is skipped: for reqwest it only says what was
/// being requested, never why it failed.
pub fn is_handshake_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string().to_ascii_lowercase();
        if HANDSHAKE_MARKERS.iter().any(|m| text.contains(m)) {
            return true;
        }
        current = e.source();
    }
    false
}
