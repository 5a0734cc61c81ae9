use super::probe::probe;
use super::Bench;
use crate::types::{Endpoint, Outcome, Payload, ProbeResult};
use crate::utils;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

impl Bench {
    /// 并发测试一轮
    ///
    /// 逻辑:
    /// 1. 每个端点映射为一个独立的 tokio 任务 (Task)
    /// 2. 最多同时运行 `workers` 个任务
    /// 3. 每个任务通过自己的 JoinHandle 交回结果，所有结果到齐后才返回 (屏障)
    ///
    /// Every input endpoint gets exactly one result; order is completion order.
    pub async fn run_round(&self, endpoints: &[Endpoint], timeout: Duration) -> Vec<ProbeResult> {
        let pb = utils::round_progress(endpoints.len(), self.show_progress);
        let url: Arc<str> = Arc::from(self.payloads.url(Payload::Small));

        let tasks = endpoints.iter().cloned().map(|endpoint| {
            let transport = Arc::clone(&self.transport);
            let url = Arc::clone(&url);
            let fallback = endpoint.clone();
            async move {
                let handle = tokio::spawn(async move {
                    probe(transport.as_ref(), endpoint, &url, timeout).await
                });
                match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        // 任务 panic 也不能让端点丢失结果
                        error!("probe task for {} aborted: {}", fallback, e);
                        ProbeResult {
                            endpoint: fallback,
                            outcome: Outcome::SoftFailure,
                            timeout,
                        }
                    }
                }
            }
        });

        let results: Vec<ProbeResult> = stream::iter(tasks)
            .buffer_unordered(self.workers)
            .inspect(|_| pb.inc(1))
            .collect()
            .await;

        pb.finish_and_clear();
        results
    }
}
