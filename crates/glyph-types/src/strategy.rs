use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::Salt;

/// Pointer derivation strategy requested for a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// Pointer derived from the writer identity and the ledger's nonce.
    /// Not known until the submission succeeds.
    Sequential,
    /// Pointer derived from the salt and the payload's content hash.
    /// Resubmitting identical content with the same salt is a no-op.
    Deterministic { salt: Salt },
}

impl Strategy {
    pub fn deterministic(salt: Salt) -> Self {
        Self::Deterministic { salt }
    }

    pub fn is_deterministic(&self) -> bool {
        matches!(self, Self::Deterministic { .. })
    }

    /// Short name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Deterministic { .. } => "deterministic",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
