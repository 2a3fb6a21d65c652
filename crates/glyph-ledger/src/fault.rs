use std::collections::VecDeque;
use std::time::Duration;

use glyph_types::Strategy;

/// A misbehavior the fake ledger applies to one submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Report success and return a pointer, but store nothing.
    Drop,
    /// Refuse the submission with the given reason.
    Reject(String),
    /// Store bytes that decode to a different payload.
    Corrupt,
    /// Delay before processing. The submission then proceeds normally.
    Stall(Duration),
}

/// Script of faults for [`InMemoryLedger`](crate::InMemoryLedger).
///
/// Scripted faults are consumed one per submission, in order. Once the
/// script is exhausted, the per-strategy fault (if any) applies to every
/// further submission of that strategy.
#[derive(Clone, Debug, Default)]
pub struct FaultPlan {
    scripted: VecDeque<Fault>,
    sequential: Option<Fault>,
    deterministic: Option<Fault>,
    fetch_errors: u32,
}

impl FaultPlan {
    /// An honest ledger.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every submission is accepted and silently dropped.
    pub fn drop_all() -> Self {
        Self {
            sequential: Some(Fault::Drop),
            deterministic: Some(Fault::Drop),
            ..Self::default()
        }
    }

    /// The next `n` submissions hit `fault`; later ones succeed.
    pub fn fail_first(n: usize, fault: Fault) -> Self {
        Self {
            scripted: std::iter::repeat(fault).take(n).collect(),
            ..Self::default()
        }
    }

    /// Append one scripted fault.
    pub fn then(mut self, fault: Fault) -> Self {
        self.scripted.push_back(fault);
        self
    }

    /// Apply `fault` to every sequential submission once the script is done.
    pub fn on_sequential(mut self, fault: Fault) -> Self {
        self.sequential = Some(fault);
        self
    }

    /// Apply `fault` to every deterministic submission once the script is done.
    pub fn on_deterministic(mut self, fault: Fault) -> Self {
        self.deterministic = Some(fault);
        self
    }

    /// The next `n` fetches fail with a transport error.
    pub fn with_fetch_errors(mut self, n: u32) -> Self {
        self.fetch_errors = n;
        self
    }

    pub(crate) fn next_submit_fault(&mut self, strategy: &Strategy) -> Option<Fault> {
        if let Some(fault) = self.scripted.pop_front() {
            return Some(fault);
        }
        match strategy {
            Strategy::Sequential => self.sequential.clone(),
            Strategy::Deterministic { .. } => self.deterministic.clone(),
        }
    }

    pub(crate) fn take_fetch_error(&mut self) -> bool {
        if self.fetch_errors > 0 {
            self.fetch_errors -= 1;
            true
        } else {
            false
        }
    }
}
