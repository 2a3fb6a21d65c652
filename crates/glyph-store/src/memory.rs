use std::collections::BTreeMap;
use std::sync::RwLock;

use glyph_types::{Entry, LogicalId};

use crate::error::{StoreError, StoreResult};
use crate::traits::EntryStore;

/// In-memory, `BTreeMap`-based entry store.
///
/// Intended for tests and embedding. Entries are cloned on read and write.
pub struct InMemoryEntryStore {
    entries: RwLock<BTreeMap<LogicalId, Entry>>,
}

impl InMemoryEntryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryStore for InMemoryEntryStore {
    fn get(&self, id: &LogicalId) -> StoreResult<Option<Entry>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn put(&self, entry: &Entry) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        if let Some(existing) = map.get(&entry.logical_id) {
            if existing.finalized {
                return Err(StoreError::Finalized(entry.logical_id.clone()));
            }
        }
        map.insert(entry.logical_id.clone(), entry.clone());
        Ok(())
    }

    fn ids(&self) -> StoreResult<Vec<LogicalId>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.keys().cloned().collect())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.entries.read().expect("lock poisoned").len())
    }
}

impl std::fmt::Debug for InMemoryEntryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.entries.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("InMemoryEntryStore")
            .field("entry_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_types::{ContentHash, Pointer, Strategy};

    fn entry(id: LogicalId, byte: u8) -> Entry {
        Entry::new(
            id,
            Pointer::from_raw([byte; 32]),
            ContentHash::from_hash([byte; 32]),
            Strategy::Sequential,
        )
    }

    #[test]
    fn put_and_get() {
        let store = InMemoryEntryStore::new();
        let e = entry(LogicalId::image(1), 1);
        store.put(&e).unwrap();
        assert_eq!(store.get(&LogicalId::image(1)).unwrap(), Some(e));
        assert_eq!(store.get(&LogicalId::image(2)).unwrap(), None);
    }

    #[test]
    fn put_replaces_open_entry() {
        let store = InMemoryEntryStore::new();
        store.put(&entry(LogicalId::image(1), 1)).unwrap();
        store.put(&entry(LogicalId::image(1), 2)).unwrap();
        let got = store.get(&LogicalId::image(1)).unwrap().unwrap();
        assert_eq!(got.pointer, Pointer::from_raw([2; 32]));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn finalized_entry_cannot_be_replaced() {
        let store = InMemoryEntryStore::new();
        let mut e = entry(LogicalId::image(1), 1);
        e.finalized = true;
        store.put(&e).unwrap();
        let err = store.put(&entry(LogicalId::image(1), 2)).unwrap_err();
        assert!(matches!(err, StoreError::Finalized(_)));
    }

    #[test]
    fn ids_are_sorted() {
        let store = InMemoryEntryStore::new();
        store.put(&entry(LogicalId::image(2), 2)).unwrap();
        store.put(&entry(LogicalId::document(1), 1)).unwrap();
        store.put(&entry(LogicalId::image(1), 3)).unwrap();
        let ids = store.ids().unwrap();
        for w in ids.windows(2) {
            assert!(w[0] <= w[1]);
        }
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn batch_get_with_missing() {
        let store = InMemoryEntryStore::new();
        store.put(&entry(LogicalId::image(1), 1)).unwrap();
        let got = store
            .get_batch(&[LogicalId::image(1), LogicalId::image(9)])
            .unwrap();
        assert!(got[0].is_some());
        assert!(got[1].is_none());
    }

    #[test]
    fn debug_format() {
        let store = InMemoryEntryStore::default();
        assert!(store.is_empty().unwrap());
        let debug = format!("{store:?}");
        assert!(debug.contains("entry_count"));
    }
}
