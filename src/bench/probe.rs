use crate::traits::{RelayTransport, Transfer};
use crate::types::{Endpoint, Outcome, Payload, ProbeResult};
use std::time::Duration;
use tracing::debug;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Download URLs of the pre-sized test files.
///
/// The template carries `{size}` (payload index) and `{variant}` (which
/// mirrored copy of the file to hit) placeholders.
#[derive(Debug, Clone)]
pub struct PayloadUrls {
    template: String,
    variant: u32,
}

impl PayloadUrls {
    pub fn new(template: &str, variant: u32) -> Self {
        Self {
            template: template.to_string(),
            variant,
        }
    }

    pub fn url(&self, payload: Payload) -> String {
        self.template
            .replace("{size}", &payload.index().to_string())
            .replace("{variant}", &self.variant.to_string())
    }
}

/// 单个端点测速
///
/// 所有错误都在这里被转换为结果值，调用方永远拿不到 Err。
pub async fn probe(
    transport: &dyn RelayTransport,
    endpoint: Endpoint,
    url: &str,
    timeout: Duration,
) -> ProbeResult {
    // 外层超时兜底：即便传输实现忘了限制 body 读取时间，也不会无限阻塞
    let outcome = match tokio::time::timeout(timeout, transport.download(&endpoint, url, timeout)).await
    {
        Ok(Ok(transfer)) => speed_of(transfer),
        Ok(Err(e)) if e.is_hard() => {
            debug!("{} hard failure: {}", endpoint, e);
            Outcome::HardFailure
        }
        Ok(Err(e)) => {
            debug!("{} soft failure: {}", endpoint, e);
            Outcome::SoftFailure
        }
        Err(_) => Outcome::SoftFailure,
    };

    ProbeResult {
        endpoint,
        outcome,
        timeout,
    }
}

/// MB/s of a finished transfer. An empty body counts as a soft failure.
fn speed_of(transfer: Transfer) -> Outcome {
    if transfer.bytes == 0 {
        return Outcome::SoftFailure;
    }
    let secs = transfer.elapsed.as_secs_f64().max(1e-6);
    let speed = transfer.bytes as f64 / secs / BYTES_PER_MB;
    if speed > 0.0 && speed.is_finite() {
        Outcome::Speed(speed)
    } else {
        Outcome::SoftFailure
    }
}
