use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;
use crate::logical::LogicalId;
use crate::pointer::Pointer;
use crate::strategy::Strategy;

/// Why the verification step after a submission did not prove the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum VerifyFailure {
    /// The ledger accepted the submission but the pointer resolves to nothing.
    Missing,
    /// The stored record decoded to a payload with a different content hash.
    Mismatch { found: ContentHash },
    /// The stored bytes are not a valid record.
    Malformed,
    /// Every fetch attempt failed at the transport layer.
    Fetch(String),
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("record missing after submission"),
            Self::Mismatch { found } => write!(f, "stored payload hash {}", found.short_hex()),
            Self::Malformed => f.write_str("stored record malformed"),
            Self::Fetch(e) => write!(f, "fetch failed: {e}"),
        }
    }
}

/// Binding from a [`LogicalId`] to the ledger record that currently holds it.
///
/// Entries are created by a write and replaced only while `finalized` is
/// false. `finalized` is a one-way latch; once set, `pointer` and
/// `content_hash` never change again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub logical_id: LogicalId,
    pub pointer: Pointer,
    pub content_hash: ContentHash,
    pub strategy: Strategy,
    /// True iff the last write or re-verification proved the record
    /// retrievable and byte-identical.
    pub healthy: bool,
    pub finalized: bool,
    /// Number of submissions recorded against this logical id.
    pub writes: u32,
    pub last_failure: Option<VerifyFailure>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    /// A freshly written, verified entry.
    pub fn new(
        logical_id: LogicalId,
        pointer: Pointer,
        content_hash: ContentHash,
        strategy: Strategy,
    ) -> Self {
        Self {
            logical_id,
            pointer,
            content_hash,
            strategy,
            healthy: true,
            finalized: false,
            writes: 1,
            last_failure: None,
            updated_at: Utc::now(),
        }
    }

    /// The entry that replaces `previous` after a new submission.
    ///
    /// Carries the write count forward. The caller decides health.
    pub fn superseding(
        previous: Option<&Entry>,
        logical_id: LogicalId,
        pointer: Pointer,
        content_hash: ContentHash,
        strategy: Strategy,
    ) -> Self {
        let mut entry = Self::new(logical_id, pointer, content_hash, strategy);
        entry.writes = previous.map_or(1, |p| p.writes.saturating_add(1));
        entry
    }

    pub fn mark_healthy(&mut self) {
        self.healthy = true;
        self.last_failure = None;
        self.updated_at = Utc::now();
    }

    pub fn mark_unhealthy(&mut self, failure: VerifyFailure) {
        self.healthy = false;
        self.last_failure = Some(failure);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> Entry {
        Entry::new(
            LogicalId::image(1),
            Pointer::from_raw([1; 32]),
            ContentHash::from_hash([2; 32]),
            Strategy::Sequential,
        )
    }

    #[test]
    fn new_entry_is_healthy_and_open() {
        let e = entry();
        assert!(e.healthy);
        assert!(!e.finalized);
        assert_eq!(e.writes, 1);
    }

    #[test]
    fn superseding_counts_writes() {
        let first = entry();
        let second = Entry::superseding(
            Some(&first),
            first.logical_id.clone(),
            Pointer::from_raw([9; 32]),
            first.content_hash,
            Strategy::Sequential,
        );
        assert_eq!(second.writes, 2);
        assert_eq!(second.pointer, Pointer::from_raw([9; 32]));
    }

    #[test]
    fn health_transitions_track_failure() {
        let mut e = entry();
        e.mark_unhealthy(VerifyFailure::Missing);
        assert!(!e.healthy);
        assert_eq!(e.last_failure, Some(VerifyFailure::Missing));
        e.mark_healthy();
        assert!(e.healthy);
        assert!(e.last_failure.is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let mut e = entry();
        e.mark_unhealthy(VerifyFailure::Fetch("timeout".into()));
        let json = serde_json::to_string(&e).unwrap();
        let parsed: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(e, parsed);
    }
}
