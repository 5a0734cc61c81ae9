use super::probe::probe;
use super::Bench;
use crate::types::{Endpoint, Outcome, Payload, RankedResult};
use crate::utils;
use std::time::Duration;
use tracing::debug;

impl Bench {
    /// 用大文件对前 `count` 个候选逐个复测，按速度从高到低排序
    ///
    /// Candidates whose re-measurement is not positive are dropped.
    pub async fn rank(
        &self,
        candidates: &[(Endpoint, f64)],
        count: usize,
        timeout: Duration,
    ) -> Vec<RankedResult> {
        let url = self.payloads.url(Payload::Large);
        let mut measured = Vec::with_capacity(count.min(candidates.len()));

        for (endpoint, first_speed) in candidates.iter().take(count) {
            let result = probe(self.transport.as_ref(), endpoint.clone(), &url, timeout).await;
            match result.outcome {
                Outcome::Speed(speed) => measured.push((result.endpoint, speed)),
                other => debug!(
                    "{} dropped on re-measurement ({:.2}MB/s before, {:?} / score {} now)",
                    endpoint,
                    first_speed,
                    other,
                    other.score()
                ),
            }
        }

        utils::sort_by_speed_desc(&mut measured);
        measured
            .into_iter()
            .map(|(endpoint, speed_mbps)| RankedResult { endpoint, speed_mbps })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::escalation::EscalationPolicy;
    use crate::bench::probe::PayloadUrls;
    use crate::bench::testing::{transfer_at, ScriptedTransport};
    use crate::error::TransportError;
    use std::sync::Arc;

    fn ep(s: &str) -> Endpoint {
        s.parse().unwrap()
    }

    fn bench(transport: Arc<ScriptedTransport>) -> Bench {
        Bench::new(
            transport,
            PayloadUrls::new("https://files.test/download_{size}{variant}", 3),
            EscalationPolicy::default(),
            2,
        )
        .with_progress(false)
    }

    #[tokio::test]
    async fn test_regressed_candidate_is_dropped() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .fixed("10.0.0.1:1080", Ok(transfer_at(3.0)))
                .fixed("10.0.0.2:1080", Err(TransportError::Timeout))
                .fixed("10.0.0.3:1080", Ok(transfer_at(1.0))),
        );
        let candidates = vec![
            (ep("10.0.0.1:1080"), 3.0),
            (ep("10.0.0.2:1080"), 2.0),
            (ep("10.0.0.3:1080"), 1.0),
        ];

        let ranked = bench(transport.clone())
            .rank(&candidates, 8, Duration::from_millis(300))
            .await;

        let order: Vec<_> = ranked.iter().map(|r| r.endpoint.clone()).collect();
        assert_eq!(order, vec![ep("10.0.0.1:1080"), ep("10.0.0.3:1080")]);
        assert!(transport
            .calls()
            .iter()
            .all(|(_, t, url)| url == "https://files.test/download_13" && *t == Duration::from_millis(300)));
    }

    #[tokio::test]
    async fn test_ranking_reorders_and_caps() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .by_payload("10.0.0.1:1080", Ok(transfer_at(9.0)), Ok(transfer_at(1.0)))
                .by_payload("10.0.0.2:1080", Ok(transfer_at(5.0)), Ok(transfer_at(4.0)))
                .by_payload("10.0.0.3:1080", Ok(transfer_at(2.0)), Ok(transfer_at(8.0))),
        );
        let candidates = vec![
            (ep("10.0.0.1:1080"), 9.0),
            (ep("10.0.0.2:1080"), 5.0),
            (ep("10.0.0.3:1080"), 2.0),
        ];

        let ranked = bench(transport.clone())
            .rank(&candidates, 2, Duration::from_millis(300))
            .await;

        // third candidate is past the cap and never re-probed
        assert_eq!(transport.calls_for("10.0.0.3:1080"), 0);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].endpoint, ep("10.0.0.2:1080"));
        assert_eq!(ranked[1].endpoint, ep("10.0.0.1:1080"));
        assert!(ranked.windows(2).all(|w| w[0].speed_mbps >= w[1].speed_mbps));
    }

    #[tokio::test]
    async fn test_rank_empty() {
        let transport = Arc::new(ScriptedTransport::new());
        let ranked = bench(transport).rank(&[], 8, Duration::from_millis(300)).await;
        assert!(ranked.is_empty());
    }
}
