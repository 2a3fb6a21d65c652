use glyph_types::{Entry, LogicalId};

use crate::error::StoreResult;

/// Key-value bookkeeping of [`Entry`] values, keyed by logical id.
///
/// All implementations must satisfy these invariants:
/// - Entries are never deleted, only superseded by `put`.
/// - `put` over a finalized entry fails with
///   [`StoreError::Finalized`](crate::StoreError::Finalized).
/// - Concurrent reads are always safe.
/// - All I/O errors are propagated, never silently ignored.
pub trait EntryStore: Send + Sync {
    /// Look up the entry for a logical id. `Ok(None)` if never written.
    fn get(&self, id: &LogicalId) -> StoreResult<Option<Entry>>;

    /// Insert or replace the entry for `entry.logical_id`.
    fn put(&self, entry: &Entry) -> StoreResult<()>;

    /// All logical ids with an entry, in sorted order.
    fn ids(&self) -> StoreResult<Vec<LogicalId>>;

    /// Number of entries.
    fn len(&self) -> StoreResult<usize> {
        Ok(self.ids()?.len())
    }

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Read multiple entries in a batch.
    ///
    /// Default implementation calls `get()` for each id.
    fn get_batch(&self, ids: &[LogicalId]) -> StoreResult<Vec<Option<Entry>>> {
        ids.iter().map(|id| self.get(id)).collect()
    }
}
