use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use glyph_types::{Entry, LogicalId};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::EntryStore;

/// Entry store persisted as a single JSON object keyed by logical id.
///
/// The whole map is rewritten on every `put` through a temporary file in the
/// same directory that is then renamed over the original, so readers of the
/// file never observe a partial write. Suited to the entry counts of a card
/// collection (thousands), not to large namespaces.
pub struct JsonFileEntryStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<LogicalId, Entry>>,
}

impl JsonFileEntryStore {
    /// Open the store at `path`, creating an empty one if the file is absent.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &BTreeMap<LogicalId, Entry>) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let bytes =
            serde_json::to_vec_pretty(map).map_err(|e| StoreError::Serialization(e.to_string()))?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        debug!(path = %self.path.display(), entries = map.len(), "entry file written");
        Ok(())
    }
}

impl EntryStore for JsonFileEntryStore {
    fn get(&self, id: &LogicalId) -> StoreResult<Option<Entry>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn put(&self, entry: &Entry) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        if map.get(&entry.logical_id).is_some_and(|e| e.finalized) {
            return Err(StoreError::Finalized(entry.logical_id.clone()));
        }
        let previous = map.insert(entry.logical_id.clone(), entry.clone());
        if let Err(e) = self.persist(&map) {
            // Keep memory consistent with what is on disk.
            match previous {
                Some(p) => map.insert(entry.logical_id.clone(), p),
                None => map.remove(&entry.logical_id),
            };
            return Err(e);
        }
        Ok(())
    }

    fn ids(&self) -> StoreResult<Vec<LogicalId>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.keys().cloned().collect())
    }
}

impl std::fmt::Debug for JsonFileEntryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileEntryStore")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_types::{ContentHash, Pointer, Strategy};

    fn entry(n: u64) -> Entry {
        Entry::new(
            LogicalId::image(n),
            Pointer::from_raw([n as u8; 32]),
            ContentHash::from_hash([n as u8; 32]),
            Strategy::Sequential,
        )
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileEntryStore::open(dir.path().join("entries.json")).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.json");
        let second = entry(2);
        {
            let store = JsonFileEntryStore::open(&path).unwrap();
            store.put(&entry(1)).unwrap();
            store.put(&second).unwrap();
        }
        let reopened = JsonFileEntryStore::open(&path).unwrap();
        assert_eq!(reopened.ids().unwrap(), vec![LogicalId::image(1), LogicalId::image(2)]);
        assert_eq!(reopened.get(&LogicalId::image(2)).unwrap(), Some(second));
    }

    #[test]
    fn finalized_entries_are_protected_on_disk_too() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.json");
        let store = JsonFileEntryStore::open(&path).unwrap();
        let mut e = entry(1);
        e.finalized = true;
        store.put(&e).unwrap();

        let reopened = JsonFileEntryStore::open(&path).unwrap();
        assert!(matches!(
            reopened.put(&entry(1)),
            Err(StoreError::Finalized(_))
        ));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            JsonFileEntryStore::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }
}
