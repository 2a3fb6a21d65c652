use serde::{Deserialize, Serialize};

/// Per-submission budget of ledger work units.
///
/// A submission whose cost exceeds its limit fails with
/// [`SubmitError::OutOfResources`](crate::SubmitError::OutOfResources).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceLimit(pub u64);

impl ResourceLimit {
    pub const UNLIMITED: Self = Self(u64::MAX);

    pub fn units(&self) -> u64 {
        self.0
    }

    /// `self * factor`, saturating, capped at `max`.
    pub fn escalate(&self, factor: u32, max: ResourceLimit) -> Self {
        Self(self.0.saturating_mul(u64::from(factor)).min(max.0))
    }
}

/// How much a record of a given size costs to store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostModel {
    pub base: u64,
    pub per_byte: u64,
}

impl CostModel {
    pub const FREE: Self = Self {
        base: 0,
        per_byte: 0,
    };

    pub fn cost(&self, record_len: usize) -> u64 {
        self.base
            .saturating_add(self.per_byte.saturating_mul(record_len as u64))
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            base: 21_000,
            per_byte: 16,
        }
    }
}
