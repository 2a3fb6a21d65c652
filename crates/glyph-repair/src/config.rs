use std::time::Duration;

use glyph_ledger::ResourceLimit;
use glyph_store::config::millis;
use glyph_types::{LogicalId, Salt, Strategy};
use serde::{Deserialize, Serialize};

use crate::error::{RepairError, RepairResult};

/// Upper bound on jobs dispatched from one debounce window.
pub const MAX_BATCH: usize = 16;

/// Which pointer strategy a repair attempt uses.
///
/// Deterministic attempts salt with [`Salt::for_logical_id`], so repeated
/// repairs of the same content land on the same pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Sequential,
    Deterministic,
}

impl StrategyKind {
    pub fn for_id(&self, id: &LogicalId) -> Strategy {
        match self {
            Self::Sequential => Strategy::Sequential,
            Self::Deterministic => Strategy::deterministic(Salt::for_logical_id(id)),
        }
    }
}

/// Retry, escalation, and batching knobs for the repair scanner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Submissions allowed per job. Zero disables re-driving.
    pub max_attempts: u32,
    /// Resource limit of the first attempt.
    pub initial_limit: ResourceLimit,
    /// Multiplier applied to the limit after each attempt.
    pub growth: u32,
    pub max_limit: ResourceLimit,
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    #[serde(with = "millis")]
    pub max_backoff: Duration,
    /// Jobs in flight at once.
    pub workers: usize,
    pub max_batch: usize,
    /// How long the queue waits for a batch to fill before dispatching.
    #[serde(with = "millis")]
    pub debounce: Duration,
    /// Attempt `i` uses `order[i % order.len()]`.
    pub order: Vec<StrategyKind>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_limit: ResourceLimit(250_000),
            growth: 2,
            max_limit: ResourceLimit(4_000_000),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            workers: 4,
            max_batch: MAX_BATCH,
            debounce: Duration::from_millis(50),
            order: vec![StrategyKind::Sequential, StrategyKind::Deterministic],
        }
    }
}

impl RepairConfig {
    pub fn validate(&self) -> RepairResult<()> {
        if self.workers == 0 {
            return Err(RepairError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.max_batch == 0 || self.max_batch > MAX_BATCH {
            return Err(RepairError::InvalidConfig(format!(
                "max_batch must be between 1 and {MAX_BATCH}"
            )));
        }
        if self.growth == 0 {
            return Err(RepairError::InvalidConfig("growth must be at least 1".into()));
        }
        if self.order.is_empty() {
            return Err(RepairError::InvalidConfig("strategy order is empty".into()));
        }
        if self.initial_limit > self.max_limit {
            return Err(RepairError::InvalidConfig(
                "initial_limit exceeds max_limit".into(),
            ));
        }
        Ok(())
    }

    /// Strategy for zero-based attempt `i`.
    pub fn strategy_for(&self, attempt: u32, id: &LogicalId) -> Strategy {
        self.order[attempt as usize % self.order.len()].for_id(id)
    }

    /// `initial_limit * growth^attempt`, capped at `max_limit`.
    pub fn limit_for(&self, attempt: u32) -> ResourceLimit {
        (0..attempt).fold(self.initial_limit.min(self.max_limit), |limit, _| {
            limit.escalate(self.growth, self.max_limit)
        })
    }

    /// Pause after zero-based attempt `i`: `initial_backoff * 2^i`, capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn with_limits(mut self, initial: ResourceLimit, growth: u32, max: ResourceLimit) -> Self {
        self.initial_limit = initial;
        self.growth = growth;
        self.max_limit = max;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_batching(mut self, max_batch: usize, debounce: Duration) -> Self {
        self.max_batch = max_batch;
        self.debounce = debounce;
        self
    }
}
