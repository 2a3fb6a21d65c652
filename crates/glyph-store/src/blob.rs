use std::sync::Arc;

use glyph_crypto::ContentHasher;
use glyph_ledger::{FetchError, LedgerAdapter, ResourceLimit, SubmitError};
use glyph_types::record::{self, Record};
use glyph_types::{
    ContentHash, Entry, LogicalId, Pointer, ResolutionResult, Strategy, UnreadableReason,
    VerifyFailure,
};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{FinalizeError, ReverifyError, StoreResult, WriteError};
use crate::locks::IdLocks;
use crate::traits::EntryStore;

/// Write/read orchestrator over a ledger adapter and an entry store.
///
/// Both collaborators are injected; the store holds no global state.
pub struct BlobStore {
    ledger: Arc<dyn LedgerAdapter>,
    entries: Arc<dyn EntryStore>,
    config: StoreConfig,
    locks: IdLocks,
}

impl BlobStore {
    pub fn new(
        ledger: Arc<dyn LedgerAdapter>,
        entries: Arc<dyn EntryStore>,
        config: StoreConfig,
    ) -> Self {
        Self {
            ledger,
            entries,
            config,
            locks: IdLocks::default(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerAdapter> {
        &self.ledger
    }

    pub fn entries(&self) -> &Arc<dyn EntryStore> {
        &self.entries
    }

    /// The bookkeeping entry for a logical id, if any.
    pub fn entry(&self, id: &LogicalId) -> StoreResult<Option<Entry>> {
        self.entries.get(id)
    }

    /// Write `payload` under `id` with the configured default resource limit.
    pub async fn write(
        &self,
        id: &LogicalId,
        payload: &[u8],
        strategy: Strategy,
    ) -> Result<Entry, WriteError> {
        self.write_with_limit(id, payload, strategy, self.config.default_limit)
            .await
    }

    /// Encode, submit, and verify a payload.
    ///
    /// Returns the recorded entry. An entry with `healthy == false` means the
    /// ledger accepted the submission but the record could not be read back
    /// intact; use [`EntryExt::verified`] to turn that into an error.
    pub async fn write_with_limit(
        &self,
        id: &LogicalId,
        payload: &[u8],
        strategy: Strategy,
        limit: ResourceLimit,
    ) -> Result<Entry, WriteError> {
        let _guard = self.locks.lock(id).await;

        let previous = self.entries.get(id)?;
        if previous.as_ref().is_some_and(|e| e.finalized) {
            return Err(WriteError::AlreadyFinalized(id.clone()));
        }

        let encoded = record::encode(payload);
        let digest = ContentHasher::BLOB.hash(payload);

        let max = self.ledger.max_record_size();
        if encoded.len() > max {
            return Err(WriteError::SubmitFailed(SubmitError::RecordTooLarge {
                size: encoded.len(),
                max,
            }));
        }

        let pointer = self.submit(id, &encoded, &strategy, limit).await?;

        let mut entry = Entry::superseding(previous.as_ref(), id.clone(), pointer, digest, strategy);
        match self.verify(&pointer, &digest).await {
            Ok(()) => {
                info!(id = %id, pointer = %pointer.short_hex(), strategy = %strategy, "write verified");
            }
            Err(failure) => {
                warn!(id = %id, pointer = %pointer.short_hex(), strategy = %strategy, %failure, "write accepted but unhealthy");
                entry.mark_unhealthy(failure);
            }
        }
        self.entries.put(&entry)?;
        Ok(entry)
    }

    /// Latch the entry for `id` so it can never be rewritten.
    pub async fn finalize(&self, id: &LogicalId) -> Result<(), FinalizeError> {
        let _guard = self.locks.lock(id).await;

        let mut entry = self
            .entries
            .get(id)?
            .ok_or_else(|| FinalizeError::NotFound(id.clone()))?;
        if entry.finalized {
            return Err(FinalizeError::AlreadyFinalized(id.clone()));
        }
        if !entry.healthy {
            return Err(FinalizeError::NotHealthy(id.clone()));
        }
        entry.finalized = true;
        self.entries.put(&entry)?;
        info!(id = %id, pointer = %entry.pointer.short_hex(), "entry finalized");
        Ok(())
    }

    /// Fetch, decode, and check the payload stored for `id`.
    ///
    /// Side-effect free: health bookkeeping is only updated by
    /// [`reverify`](Self::reverify).
    pub async fn read(&self, id: &LogicalId) -> ResolutionResult {
        let entry = match self.entries.get(id) {
            Ok(Some(entry)) => entry,
            Ok(None) => return ResolutionResult::Unreadable(UnreadableReason::NoEntry),
            Err(e) => return ResolutionResult::Unreadable(UnreadableReason::Store(e.to_string())),
        };

        let stored = match self.fetch_with_retry(&entry.pointer).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                return ResolutionResult::Unreadable(UnreadableReason::Missing {
                    pointer: entry.pointer,
                })
            }
            Err(e) => return ResolutionResult::Unreadable(UnreadableReason::Fetch(e.to_string())),
        };

        let payload = match record::decode(stored.as_bytes()) {
            Ok(payload) => payload,
            Err(_) => {
                return ResolutionResult::Unreadable(UnreadableReason::Malformed {
                    pointer: entry.pointer,
                })
            }
        };

        if !ContentHasher::BLOB.verify(&payload, &entry.content_hash) {
            let found = ContentHasher::BLOB.hash(&payload);
            warn!(id = %id, expected = %entry.content_hash.short_hex(), found = %found.short_hex(), "integrity failure on read");
            return ResolutionResult::Unreadable(UnreadableReason::IntegrityFailure {
                expected: entry.content_hash,
                found,
            });
        }
        ResolutionResult::Healthy(payload)
    }

    /// Re-check a non-finalized entry against the ledger without rewriting.
    ///
    /// Promotes a late-arriving record to healthy, or demotes a record that
    /// has since become unreadable.
    pub async fn reverify(&self, id: &LogicalId) -> Result<Entry, ReverifyError> {
        let _guard = self.locks.lock(id).await;

        let mut entry = self
            .entries
            .get(id)?
            .ok_or_else(|| ReverifyError::NotFound(id.clone()))?;
        if entry.finalized {
            return Err(ReverifyError::Finalized(id.clone()));
        }

        let outcome = self.verify(&entry.pointer, &entry.content_hash).await;
        let changed = match outcome {
            Ok(()) if !entry.healthy => {
                entry.mark_healthy();
                true
            }
            Err(failure) if entry.healthy || entry.last_failure.as_ref() != Some(&failure) => {
                entry.mark_unhealthy(failure);
                true
            }
            _ => false,
        };
        if changed {
            self.entries.put(&entry)?;
            info!(id = %id, healthy = entry.healthy, "entry health changed on re-verification");
        }
        Ok(entry)
    }

    async fn submit(
        &self,
        id: &LogicalId,
        record: &Record,
        strategy: &Strategy,
        limit: ResourceLimit,
    ) -> Result<Pointer, WriteError> {
        let timeout = self.config.submit_timeout;
        match tokio::time::timeout(timeout, self.ledger.submit(record, strategy, limit)).await {
            Ok(Ok(pointer)) => {
                debug!(id = %id, pointer = %pointer.short_hex(), "submission accepted");
                Ok(pointer)
            }
            Ok(Err(e)) => {
                warn!(id = %id, strategy = %strategy, error = %e, "submission failed");
                Err(WriteError::SubmitFailed(e))
            }
            Err(_) => {
                warn!(id = %id, strategy = %strategy, ?timeout, "submission timed out");
                Err(WriteError::SubmitFailed(SubmitError::Timeout(timeout)))
            }
        }
    }

    async fn verify(&self, pointer: &Pointer, expected: &ContentHash) -> Result<(), VerifyFailure> {
        let stored = match self.fetch_with_retry(pointer).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return Err(VerifyFailure::Missing),
            Err(e) => return Err(VerifyFailure::Fetch(e.to_string())),
        };
        let payload = stored.payload().map_err(|_| VerifyFailure::Malformed)?;
        if !ContentHasher::BLOB.verify(payload, expected) {
            return Err(VerifyFailure::Mismatch {
                found: ContentHasher::BLOB.hash(payload),
            });
        }
        Ok(())
    }

    /// Fetch, retrying transport errors only. `Ok(None)` is returned as-is.
    async fn fetch_with_retry(&self, pointer: &Pointer) -> Result<Option<Record>, FetchError> {
        let mut attempt = 0;
        loop {
            match self.ledger.fetch(pointer).await {
                Ok(found) => return Ok(found),
                Err(e) if attempt < self.config.fetch_retries => {
                    attempt += 1;
                    debug!(pointer = %pointer.short_hex(), attempt, error = %e, "fetch failed; retrying");
                    tokio::time::sleep(self.config.fetch_retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore")
            .field("writer", &self.ledger.writer())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Conversions on entries returned by [`BlobStore::write`].
pub trait EntryExt: Sized {
    /// `Ok(self)` if healthy, otherwise [`WriteError::WriteUnhealthy`].
    fn verified(self) -> Result<Self, WriteError>;
}

impl EntryExt for Entry {
    fn verified(self) -> Result<Self, WriteError> {
        if self.healthy {
            return Ok(self);
        }
        Err(WriteError::WriteUnhealthy {
            logical_id: self.logical_id,
            pointer: self.pointer,
            failure: self.last_failure.unwrap_or(VerifyFailure::Missing),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEntryStore;
    use glyph_ledger::{CostModel, Fault, FaultPlan, InMemoryLedger};
    use glyph_types::{Salt, WriterId};
    use std::time::Duration;

    fn fixture(plan: FaultPlan) -> (Arc<InMemoryLedger>, BlobStore) {
        let ledger = Arc::new(InMemoryLedger::new(WriterId::derive("test")).with_plan(plan));
        let config = StoreConfig::new(Duration::from_secs(5)).with_fetch_retries(2, Duration::ZERO);
        let store = BlobStore::new(
            ledger.clone(),
            Arc::new(InMemoryEntryStore::new()),
            config,
        );
        (ledger, store)
    }

    const SVG: &[u8] = b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>";

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn healthy_write_records_entry() {
        let (_, store) = fixture(FaultPlan::none());
        let id = LogicalId::image(1);
        let entry = store.write(&id, SVG, Strategy::Sequential).await.unwrap();
        assert!(entry.healthy);
        assert!(!entry.finalized);
        assert_eq!(entry.content_hash, ContentHasher::BLOB.hash(SVG));
        assert_eq!(store.entry(&id).unwrap(), Some(entry));
    }

    #[tokio::test]
    async fn empty_payload_is_a_valid_write() {
        let (_, store) = fixture(FaultPlan::none());
        let id = LogicalId::image(1);
        store.write(&id, b"", Strategy::Sequential).await.unwrap();
        assert_eq!(store.read(&id).await, ResolutionResult::Healthy(Vec::new()));
    }

    #[tokio::test]
    async fn deterministic_write_is_idempotent() {
        let (ledger, store) = fixture(FaultPlan::none());
        let id = LogicalId::document(1);
        let strategy = Strategy::deterministic(Salt::from_raw([6; 32]));
        let first = store.write(&id, b"{}", strategy).await.unwrap();
        let second = store.write(&id, b"{}", strategy).await.unwrap();
        assert_eq!(first.pointer, second.pointer);
        assert_eq!(second.writes, 2);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn dropped_record_yields_unhealthy_entry() {
        let (_, store) = fixture(FaultPlan::drop_all());
        let id = LogicalId::image(1);
        let entry = store.write(&id, SVG, Strategy::Sequential).await.unwrap();
        assert!(!entry.healthy);
        assert_eq!(entry.last_failure, Some(VerifyFailure::Missing));
        assert_eq!(store.entry(&id).unwrap(), Some(entry.clone()));

        let err = entry.verified().unwrap_err();
        assert!(matches!(err, WriteError::WriteUnhealthy { .. }));
        assert!(err.is_retryable());

        let err = store.finalize(&id).await.unwrap_err();
        assert!(matches!(err, FinalizeError::NotHealthy(_)));
    }

    #[tokio::test]
    async fn corrupted_record_yields_mismatch() {
        let (_, store) = fixture(FaultPlan::fail_first(1, Fault::Corrupt));
        let entry = store
            .write(&LogicalId::image(1), SVG, Strategy::Sequential)
            .await
            .unwrap();
        assert!(matches!(entry.last_failure, Some(VerifyFailure::Mismatch { .. })));
    }

    #[tokio::test]
    async fn rejected_submission_creates_no_entry() {
        let (_, store) = fixture(FaultPlan::fail_first(1, Fault::Reject("reverted".into())));
        let id = LogicalId::image(1);
        let err = store.write(&id, SVG, Strategy::Sequential).await.unwrap_err();
        assert!(matches!(err, WriteError::SubmitFailed(SubmitError::Rejected(_))));
        assert_eq!(store.entry(&id).unwrap(), None);
    }

    #[tokio::test]
    async fn rejected_resubmission_leaves_previous_entry_untouched() {
        let (ledger, store) = fixture(FaultPlan::none());
        let id = LogicalId::image(1);
        let first = store.write(&id, SVG, Strategy::Sequential).await.unwrap();
        ledger.set_plan(FaultPlan::fail_first(1, Fault::Reject("nope".into())));
        assert!(store.write(&id, b"other", Strategy::Sequential).await.is_err());
        assert_eq!(store.entry(&id).unwrap(), Some(first));
    }

    #[tokio::test]
    async fn timed_out_submission_creates_no_entry() {
        let ledger = Arc::new(
            InMemoryLedger::new(WriterId::derive("slow"))
                .with_plan(FaultPlan::fail_first(1, Fault::Stall(Duration::from_secs(60)))),
        );
        let store = BlobStore::new(
            ledger,
            Arc::new(InMemoryEntryStore::new()),
            StoreConfig::new(Duration::from_millis(20)),
        );
        let id = LogicalId::image(1);
        let err = store.write(&id, SVG, Strategy::Sequential).await.unwrap_err();
        assert!(matches!(err, WriteError::SubmitFailed(SubmitError::Timeout(_))));
        assert_eq!(store.entry(&id).unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_payload_is_refused_before_submission() {
        let ledger = Arc::new(InMemoryLedger::with_limits(
            WriterId::derive("t"),
            8,
            CostModel::FREE,
        ));
        let store = BlobStore::new(
            ledger.clone(),
            Arc::new(InMemoryEntryStore::new()),
            StoreConfig::new(Duration::from_secs(1)),
        );
        let err = store
            .write(&LogicalId::image(1), SVG, Strategy::Sequential)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WriteError::SubmitFailed(SubmitError::RecordTooLarge { max: 8, .. })
        ));
        assert_eq!(ledger.submissions(), 0);
    }

    #[tokio::test]
    async fn transient_fetch_errors_are_retried_during_verification() {
        let (_, store) = fixture(FaultPlan::none().with_fetch_errors(2));
        let entry = store
            .write(&LogicalId::image(1), SVG, Strategy::Sequential)
            .await
            .unwrap();
        assert!(entry.healthy);
    }

    #[tokio::test]
    async fn exhausted_fetch_retries_mark_unhealthy() {
        let (_, store) = fixture(FaultPlan::none().with_fetch_errors(10));
        let entry = store
            .write(&LogicalId::image(1), SVG, Strategy::Sequential)
            .await
            .unwrap();
        assert!(matches!(entry.last_failure, Some(VerifyFailure::Fetch(_))));
    }

    // -----------------------------------------------------------------------
    // Finalization
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn finalized_entry_rejects_writes() {
        let (ledger, store) = fixture(FaultPlan::none());
        let id = LogicalId::image(1);
        store.write(&id, SVG, Strategy::Sequential).await.unwrap();
        store.finalize(&id).await.unwrap();

        let before = ledger.submissions();
        let err = store.write(&id, b"new", Strategy::Sequential).await.unwrap_err();
        assert!(matches!(err, WriteError::AlreadyFinalized(_)));
        assert!(!err.is_retryable());
        assert_eq!(ledger.submissions(), before);

        ledger.set_plan(FaultPlan::drop_all());
        let err = store.write(&id, b"new", Strategy::Sequential).await.unwrap_err();
        assert!(matches!(err, WriteError::AlreadyFinalized(_)));
    }

    #[tokio::test]
    async fn finalize_twice_fails() {
        let (_, store) = fixture(FaultPlan::none());
        let id = LogicalId::image(1);
        store.write(&id, SVG, Strategy::Sequential).await.unwrap();
        store.finalize(&id).await.unwrap();
        assert!(matches!(
            store.finalize(&id).await,
            Err(FinalizeError::AlreadyFinalized(_))
        ));
    }

    #[tokio::test]
    async fn finalize_without_entry_fails() {
        let (_, store) = fixture(FaultPlan::none());
        assert!(matches!(
            store.finalize(&LogicalId::image(5)).await,
            Err(FinalizeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_write_and_finalize_are_serialized() {
        let ledger = Arc::new(InMemoryLedger::new(WriterId::derive("race")));
        let store = Arc::new(BlobStore::new(
            ledger.clone(),
            Arc::new(InMemoryEntryStore::new()),
            StoreConfig::new(Duration::from_secs(5)),
        ));
        let id = LogicalId::image(1);
        store.write(&id, b"v1", Strategy::Sequential).await.unwrap();

        // Slow the next write down so finalize queues behind it.
        ledger.set_plan(FaultPlan::fail_first(1, Fault::Stall(Duration::from_millis(50))));
        let writer = {
            let store = Arc::clone(&store);
            let id = id.clone();
            tokio::spawn(async move { store.write(&id, b"v2", Strategy::Sequential).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.finalize(&id).await.unwrap();

        let written = writer.await.unwrap().unwrap();
        let final_entry = store.entry(&id).unwrap().unwrap();
        assert!(final_entry.finalized);
        assert_eq!(final_entry.pointer, written.pointer);
        assert_eq!(store.read(&id).await, ResolutionResult::Healthy(b"v2".to_vec()));
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn read_returns_payload() {
        let (_, store) = fixture(FaultPlan::none());
        let id = LogicalId::image(1);
        store.write(&id, SVG, Strategy::Sequential).await.unwrap();
        assert_eq!(store.read(&id).await, ResolutionResult::Healthy(SVG.to_vec()));
    }

    #[tokio::test]
    async fn read_without_entry_is_unreadable() {
        let (_, store) = fixture(FaultPlan::none());
        assert_eq!(
            store.read(&LogicalId::image(1)).await,
            ResolutionResult::Unreadable(UnreadableReason::NoEntry)
        );
    }

    #[tokio::test]
    async fn read_of_dropped_record_is_missing() {
        let (_, store) = fixture(FaultPlan::drop_all());
        let id = LogicalId::image(1);
        let entry = store.write(&id, SVG, Strategy::Sequential).await.unwrap();
        assert_eq!(
            store.read(&id).await,
            ResolutionResult::Unreadable(UnreadableReason::Missing {
                pointer: entry.pointer
            })
        );
    }

    #[tokio::test]
    async fn tampered_record_is_an_integrity_failure() {
        let (ledger, store) = fixture(FaultPlan::none());
        let id = LogicalId::image(1);
        let entry = store.write(&id, SVG, Strategy::Sequential).await.unwrap();
        ledger.tamper(entry.pointer, record::encode(b"<svg>evil</svg>").into_bytes());

        let result = store.read(&id).await;
        match result.unreadable_reason() {
            Some(UnreadableReason::IntegrityFailure { expected, found }) => {
                assert_eq!(*expected, entry.content_hash);
                assert_ne!(expected, found);
            }
            other => panic!("expected integrity failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_stored_bytes_are_malformed() {
        let (ledger, store) = fixture(FaultPlan::none());
        let id = LogicalId::image(1);
        let entry = store.write(&id, SVG, Strategy::Sequential).await.unwrap();
        ledger.tamper(entry.pointer, Vec::new());
        assert!(matches!(
            store.read(&id).await,
            ResolutionResult::Unreadable(UnreadableReason::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn persistent_fetch_errors_surface_as_unreadable() {
        let (ledger, store) = fixture(FaultPlan::none());
        let id = LogicalId::image(1);
        store.write(&id, SVG, Strategy::Sequential).await.unwrap();
        ledger.set_plan(FaultPlan::none().with_fetch_errors(100));
        assert!(matches!(
            store.read(&id).await,
            ResolutionResult::Unreadable(UnreadableReason::Fetch(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Re-verification
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn reverify_demotes_lost_record() {
        let (ledger, store) = fixture(FaultPlan::none());
        let id = LogicalId::image(1);
        let entry = store.write(&id, SVG, Strategy::Sequential).await.unwrap();
        ledger.forget(&entry.pointer);

        let entry = store.reverify(&id).await.unwrap();
        assert!(!entry.healthy);
        assert!(!store.entry(&id).unwrap().unwrap().healthy);
    }

    #[tokio::test]
    async fn reverify_promotes_late_record() {
        let (ledger, store) = fixture(FaultPlan::fail_first(1, Fault::Drop));
        let id = LogicalId::image(1);
        let entry = store.write(&id, SVG, Strategy::Sequential).await.unwrap();
        assert!(!entry.healthy);

        ledger.tamper(entry.pointer, record::encode(SVG).into_bytes());
        let entry = store.reverify(&id).await.unwrap();
        assert!(entry.healthy);
        assert_eq!(entry.writes, 1);
    }

    #[tokio::test]
    async fn reverify_refuses_finalized() {
        let (_, store) = fixture(FaultPlan::none());
        let id = LogicalId::image(1);
        store.write(&id, SVG, Strategy::Sequential).await.unwrap();
        store.finalize(&id).await.unwrap();
        assert!(matches!(
            store.reverify(&id).await,
            Err(ReverifyError::Finalized(_))
        ));
    }
}
