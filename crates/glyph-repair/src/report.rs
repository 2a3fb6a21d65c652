use std::fmt;

use chrono::{DateTime, Utc};
use glyph_types::LogicalId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::EntryState;

/// Number of ids in each state at the end of a scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub healthy: usize,
    pub write_failed: usize,
    pub uninitialized: usize,
    pub finalized: usize,
}

impl StateCounts {
    pub fn record(&mut self, state: EntryState) {
        match state {
            EntryState::Healthy => self.healthy += 1,
            EntryState::WriteFailed => self.write_failed += 1,
            EntryState::Uninitialized => self.uninitialized += 1,
            EntryState::Finalized => self.finalized += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.healthy + self.write_failed + self.uninitialized + self.finalized
    }
}

/// A logical id whose state differs between the start and end of a scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub logical_id: LogicalId,
    pub from: EntryState,
    pub to: EntryState,
}

/// An id the scan could not process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub logical_id: LogicalId,
    pub error: String,
}

/// Summary of one repair scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    pub scan_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counts: StateCounts,
    /// Ordered by logical id.
    pub changes: Vec<StateChange>,
    /// Submissions made across every job.
    pub attempts: u32,
    /// Jobs failed with `Cancelled` before dispatch.
    pub cancelled: usize,
    /// Ids that needed a payload no source could provide.
    pub unsourced: usize,
    pub failures: Vec<ScanFailure>,
}

impl RepairReport {
    pub(crate) fn begin() -> Self {
        let now = Utc::now();
        Self {
            scan_id: Uuid::now_v7(),
            started_at: now,
            finished_at: now,
            counts: StateCounts::default(),
            changes: Vec::new(),
            attempts: 0,
            cancelled: 0,
            unsourced: 0,
            failures: Vec::new(),
        }
    }

    /// No state changed and nothing failed.
    pub fn is_quiet(&self) -> bool {
        self.changes.is_empty() && self.failures.is_empty()
    }

    pub fn changed_ids(&self) -> impl Iterator<Item = &LogicalId> {
        self.changes.iter().map(|c| &c.logical_id)
    }

    pub fn scanned(&self) -> usize {
        self.counts.total()
    }
}

impl fmt::Display for RepairReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned {} ids: {} healthy, {} write_failed, {} uninitialized, {} finalized; {} changed, {} attempts, {} cancelled, {} failures",
            self.scanned(),
            self.counts.healthy,
            self.counts.write_failed,
            self.counts.uninitialized,
            self.counts.finalized,
            self.changes.len(),
            self.attempts,
            self.cancelled,
            self.failures.len(),
        )
    }
}
