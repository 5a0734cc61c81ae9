//! Adaptive throughput benchmarking of relay endpoints.
//!
//! The flow is strictly forward: candidates enter [`Bench::escalate`], which
//! runs parallel rounds at a growing timeout until something answers, then
//! [`Bench::rank`] re-measures the best of them with a larger payload.

pub mod escalation;
pub mod probe;
pub mod ranking;
pub mod round;

#[cfg(test)]
pub mod testing;

use crate::traits::RelayTransport;
use escalation::EscalationPolicy;
use probe::PayloadUrls;
use std::sync::Arc;

/// 测速引擎：持有传输能力与全部策略参数
pub struct Bench {
    transport: Arc<dyn RelayTransport>,
    payloads: PayloadUrls,
    policy: EscalationPolicy,
    workers: usize,
    show_progress: bool,
}

impl Bench {
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        payloads: PayloadUrls,
        policy: EscalationPolicy,
        workers: usize,
    ) -> Self {
        Self {
            transport,
            payloads,
            policy,
            workers: workers.max(1),
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}
