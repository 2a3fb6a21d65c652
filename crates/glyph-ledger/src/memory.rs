use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use glyph_crypto::{deterministic_pointer, sequential_pointer, ContentHasher};
use glyph_types::{Pointer, Record, Strategy, WriterId};
use tracing::debug;

use crate::cost::{CostModel, ResourceLimit};
use crate::error::{FetchError, FetchResult, SubmitError, SubmitResult};
use crate::fault::{Fault, FaultPlan};
use crate::traits::LedgerAdapter;

/// Per-record size limit of the reference ledger (24 KiB).
pub const DEFAULT_MAX_RECORD_SIZE: usize = 24 * 1024;

/// In-memory ledger for tests, local demos, and embedding.
///
/// Honest by default. A [`FaultPlan`] makes it reproduce the failure modes
/// seen on real networks: accepted-but-dropped records, rejections,
/// corrupted storage, stalls, and transient fetch errors.
pub struct InMemoryLedger {
    writer: WriterId,
    max_record_size: usize,
    cost: CostModel,
    inner: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    records: HashMap<Pointer, Record>,
    nonce: u64,
    plan: FaultPlan,
    submissions: u64,
    fetches: u64,
}

impl InMemoryLedger {
    pub fn new(writer: WriterId) -> Self {
        Self::with_limits(writer, DEFAULT_MAX_RECORD_SIZE, CostModel::default())
    }

    pub fn with_limits(writer: WriterId, max_record_size: usize, cost: CostModel) -> Self {
        Self {
            writer,
            max_record_size,
            cost,
            inner: Mutex::new(LedgerState::default()),
        }
    }

    /// Builder form of [`set_plan`](Self::set_plan).
    pub fn with_plan(self, plan: FaultPlan) -> Self {
        self.set_plan(plan);
        self
    }

    /// Replace the fault plan. Already stored records are untouched.
    pub fn set_plan(&self, plan: FaultPlan) {
        self.inner.lock().expect("lock poisoned").plan = plan;
    }

    /// Number of submissions that reached the ledger (size and resource
    /// checks passed).
    pub fn submissions(&self) -> u64 {
        self.inner.lock().expect("lock poisoned").submissions
    }

    pub fn fetches(&self) -> u64 {
        self.inner.lock().expect("lock poisoned").fetches
    }

    /// Number of records actually stored.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget a stored record, simulating loss after a successful write.
    pub fn forget(&self, pointer: &Pointer) -> bool {
        self.inner
            .lock()
            .expect("lock poisoned")
            .records
            .remove(pointer)
            .is_some()
    }

    /// Overwrite the bytes stored under a pointer.
    pub fn tamper(&self, pointer: Pointer, bytes: Vec<u8>) {
        self.inner
            .lock()
            .expect("lock poisoned")
            .records
            .insert(pointer, Record::from_bytes(bytes));
    }

    fn state(&self) -> Result<MutexGuard<'_, LedgerState>, String> {
        self.inner
            .lock()
            .map_err(|_| "ledger lock poisoned".to_string())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(WriterId::derive("glyph-memory-ledger"))
    }
}

#[async_trait]
impl LedgerAdapter for InMemoryLedger {
    fn writer(&self) -> WriterId {
        self.writer
    }

    fn max_record_size(&self) -> usize {
        self.max_record_size
    }

    async fn submit(
        &self,
        record: &Record,
        strategy: &Strategy,
        limit: ResourceLimit,
    ) -> SubmitResult<Pointer> {
        if record.len() > self.max_record_size {
            return Err(SubmitError::RecordTooLarge {
                size: record.len(),
                max: self.max_record_size,
            });
        }
        let cost = self.cost.cost(record.len());
        if cost > limit.units() {
            return Err(SubmitError::OutOfResources {
                cost,
                limit: limit.units(),
            });
        }
        let payload = record
            .payload()
            .map_err(|e| SubmitError::Rejected(e.to_string()))?;

        let fault = {
            let mut state = self.state().map_err(SubmitError::Transport)?;
            state.submissions += 1;
            state.plan.next_submit_fault(strategy)
        };

        match &fault {
            Some(Fault::Stall(delay)) => tokio::time::sleep(*delay).await,
            Some(Fault::Reject(reason)) => return Err(SubmitError::Rejected(reason.clone())),
            _ => {}
        }

        let mut state = self.state().map_err(SubmitError::Transport)?;
        let pointer = match strategy {
            Strategy::Sequential => {
                let pointer = sequential_pointer(&self.writer, state.nonce);
                state.nonce += 1;
                pointer
            }
            Strategy::Deterministic { salt } => {
                let content = ContentHasher::BLOB.hash(payload);
                let pointer = deterministic_pointer(&self.writer, salt, &content);
                if state.records.get(&pointer) == Some(record) {
                    debug!(pointer = %pointer.short_hex(), "deterministic resubmission is a no-op");
                    return Ok(pointer);
                }
                pointer
            }
        };

        match fault {
            Some(Fault::Drop) => {
                debug!(pointer = %pointer.short_hex(), "fault: record dropped after acceptance");
            }
            Some(Fault::Corrupt) => {
                let mut bytes = record.as_bytes().to_vec();
                bytes.push(0xff);
                state.records.insert(pointer, Record::from_bytes(bytes));
                debug!(pointer = %pointer.short_hex(), "fault: record corrupted");
            }
            _ => {
                state.records.insert(pointer, record.clone());
            }
        }
        debug!(pointer = %pointer.short_hex(), strategy = %strategy, len = record.len(), "record submitted");
        Ok(pointer)
    }

    async fn fetch(&self, pointer: &Pointer) -> FetchResult<Option<Record>> {
        let mut state = self.state().map_err(FetchError::Unavailable)?;
        state.fetches += 1;
        if state.plan.take_fetch_error() {
            return Err(FetchError::Unavailable("injected fetch failure".into()));
        }
        Ok(state.records.get(pointer).cloned())
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("writer", &self.writer)
            .field("record_count", &self.len())
            .finish()
    }
}
