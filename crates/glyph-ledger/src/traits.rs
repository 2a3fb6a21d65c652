use std::sync::Arc;

use async_trait::async_trait;
use glyph_types::{Pointer, Record, Strategy, WriterId};

use crate::cost::ResourceLimit;
use crate::error::{FetchResult, SubmitResult};

/// Submission and retrieval boundary of the external ledger.
///
/// Implementations must satisfy these invariants:
/// - `fetch` returns `Ok(None)` only when the pointer resolves to no stored
///   bytes, and `Err` only for transport faults.
/// - A deterministic submission of content that is already stored under the
///   derived pointer is a no-op that returns the same pointer.
/// - Records larger than `max_record_size()` are refused before anything
///   is stored.
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    /// The writer identity mixed into every derived pointer.
    fn writer(&self) -> WriterId;

    /// Largest record (tag byte included) the ledger accepts.
    fn max_record_size(&self) -> usize;

    async fn submit(
        &self,
        record: &Record,
        strategy: &Strategy,
        limit: ResourceLimit,
    ) -> SubmitResult<Pointer>;

    async fn fetch(&self, pointer: &Pointer) -> FetchResult<Option<Record>>;
}

#[async_trait]
impl<T: LedgerAdapter + ?Sized> LedgerAdapter for Arc<T> {
    fn writer(&self) -> WriterId {
        (**self).writer()
    }

    fn max_record_size(&self) -> usize {
        (**self).max_record_size()
    }

    async fn submit(
        &self,
        record: &Record,
        strategy: &Strategy,
        limit: ResourceLimit,
    ) -> SubmitResult<Pointer> {
        (**self).submit(record, strategy, limit).await
    }

    async fn fetch(&self, pointer: &Pointer) -> FetchResult<Option<Record>> {
        (**self).fetch(pointer).await
    }
}
