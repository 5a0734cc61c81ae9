use super::Bench;
use crate::error::{Result, ScraperError};
use crate::types::{Endpoint, Outcome, Payload, ProbeResult};
use crate::utils;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Timeout schedule: round `level` runs at `base * (level + start_level)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub base_timeout: Duration,
    pub start_level: u32,
    /// `None` means escalate until something answers.
    pub max_rounds: Option<u32>,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            base_timeout: Duration::from_millis(100),
            start_level: 2,
            max_rounds: Some(30),
        }
    }
}

impl EscalationPolicy {
    pub fn timeout_for(&self, level: u32) -> Duration {
        self.base_timeout * (level + self.start_level)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExhaustReason {
    /// Every remaining endpoint hit a hard failure.
    NoViableEndpoints,
    /// The configured round cap was reached with soft failures only.
    RoundLimit(u32),
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustReason::NoViableEndpoints => write!(f, "no viable endpoints"),
            ExhaustReason::RoundLimit(n) => write!(f, "round limit reached after {} rounds", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Probing(u32),
    /// Carries this round's successes, fastest first.
    Success(Vec<(Endpoint, f64)>),
    Exhausted(ExhaustReason),
}

/// 每一轮的统计
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    pub level: u32,
    pub timeout: Duration,
    pub probed: usize,
    pub succeeded: usize,
    pub hard_failures: usize,
    /// SurvivorSet size once the round was folded in.
    pub survivors: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EscalationOutcome {
    Success {
        /// Fastest first.
        successes: Vec<(Endpoint, f64)>,
        /// Timeout of the round that succeeded.
        timeout: Duration,
        rounds: Vec<RoundReport>,
    },
    Exhausted {
        reason: ExhaustReason,
        rounds: Vec<RoundReport>,
    },
}

/// Folds one round into the survivor set.
///
/// Hard failures leave the set for good, successes are taken out and returned
/// fastest first, soft failures stay for the next round.
pub fn fold_round(survivors: &mut Vec<Endpoint>, results: Vec<ProbeResult>) -> Vec<(Endpoint, f64)> {
    let mut successes = Vec::new();
    let mut next = Vec::with_capacity(survivors.len());

    for result in results {
        match result.outcome {
            Outcome::Speed(speed) => successes.push((result.endpoint, speed)),
            Outcome::SoftFailure => next.push(result.endpoint),
            Outcome::HardFailure => {}
        }
    }

    // 保持与上一轮相同的相对顺序，便于日志对比
    let order: HashMap<&Endpoint, usize> = survivors.iter().enumerate().map(|(i, e)| (e, i)).collect();
    next.sort_by_key(|e| order.get(e).copied().unwrap_or(usize::MAX));
    *survivors = next;

    utils::sort_by_speed_desc(&mut successes);
    successes
}

impl Bench {
    /// 逐轮提高超时，直到至少一个端点测速成功
    pub async fn escalate(&self, endpoints: Vec<Endpoint>) -> Result<EscalationOutcome> {
        if endpoints.is_empty() {
            return Err(ScraperError::NoEndpoints);
        }

        let mut survivors = endpoints;
        let mut rounds: Vec<RoundReport> = Vec::new();
        let mut state = LoopState::Probing(0);

        loop {
            match state {
                LoopState::Probing(level) => {
                    if self.policy.max_rounds.is_some_and(|max| level >= max) {
                        state = LoopState::Exhausted(ExhaustReason::RoundLimit(level));
                        continue;
                    }

                    let timeout = self.policy.timeout_for(level);
                    info!(
                        "Starting test #{}, {} servers, {:.1}s timeout at {}",
                        level + 1,
                        survivors.len(),
                        timeout.as_secs_f64(),
                        self.payloads.url(Payload::Small)
                    );

                    let results = self.run_round(&survivors, timeout).await;
                    let probed = results.len();
                    let before = survivors.len();
                    let successes = fold_round(&mut survivors, results);

                    rounds.push(RoundReport {
                        level,
                        timeout,
                        probed,
                        succeeded: successes.len(),
                        hard_failures: before - survivors.len() - successes.len(),
                        survivors: survivors.len(),
                    });

                    state = if !successes.is_empty() {
                        LoopState::Success(successes)
                    } else if survivors.is_empty() {
                        LoopState::Exhausted(ExhaustReason::NoViableEndpoints)
                    } else {
                        warn!(
                            "No proxies responded, raising timeout to {:.1} seconds",
                            self.policy.timeout_for(level + 1).as_secs_f64()
                        );
                        LoopState::Probing(level + 1)
                    };
                }
                LoopState::Success(successes) => {
                    let timeout = rounds
                        .last()
                        .map_or(self.policy.timeout_for(0), |r| r.timeout);
                    return Ok(EscalationOutcome::Success {
                        successes,
                        timeout,
                        rounds,
                    });
                }
                LoopState::Exhausted(reason) => {
                    return Ok(EscalationOutcome::Exhausted { reason, rounds });
                }
            }
        }
    }
}
