use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use glyph_types::LogicalId;

use crate::error::{RepairError, RepairResult};

/// Where the scanner gets payloads to re-drive.
///
/// The ledger cannot give back a payload it failed to store, so every
/// re-drive needs an outside copy of the content.
#[async_trait]
pub trait PayloadSource: Send + Sync {
    /// The payload for `id`, or `None` if this source has no copy.
    async fn payload(&self, id: &LogicalId) -> RepairResult<Option<Vec<u8>>>;
}

/// Payloads held in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    payloads: RwLock<HashMap<LogicalId, Vec<u8>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, id: LogicalId, payload: impl Into<Vec<u8>>) -> Self {
        self.insert(id, payload);
        self
    }

    pub fn insert(&self, id: LogicalId, payload: impl Into<Vec<u8>>) {
        self.payloads
            .write()
            .expect("lock poisoned")
            .insert(id, payload.into());
    }

    pub fn len(&self) -> usize {
        self.payloads.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PayloadSource for MemorySource {
    async fn payload(&self, id: &LogicalId) -> RepairResult<Option<Vec<u8>>> {
        Ok(self.payloads.read().expect("lock poisoned").get(id).cloned())
    }
}

/// Payloads stored as files, one per logical id, at `root/<logical id>`.
///
/// `image/7` is read from `root/image/7`.
#[derive(Clone, Debug)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &LogicalId) -> RepairResult<PathBuf> {
        let relative = Path::new(id.as_str());
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(RepairError::Source {
                id: id.clone(),
                reason: "logical id does not map to a relative path".into(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl PayloadSource for DirSource {
    async fn payload(&self, id: &LogicalId) -> RepairResult<Option<Vec<u8>>> {
        let path = self.path_for(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RepairError::Source {
                id: id.clone(),
                reason: format!("{}: {e}", path.display()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_source_lookup() {
        let source = MemorySource::new().with(LogicalId::image(1), b"one".to_vec());
        assert_eq!(
            source.payload(&LogicalId::image(1)).await.unwrap(),
            Some(b"one".to_vec())
        );
        assert_eq!(source.payload(&LogicalId::image(2)).await.unwrap(), None);
        assert_eq!(source.len(), 1);
    }

    #[tokio::test]
    async fn dir_source_reads_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("image")).unwrap();
        std::fs::write(dir.path().join("image/4"), b"<svg/>").unwrap();

        let source = DirSource::new(dir.path());
        assert_eq!(
            source.payload(&LogicalId::image(4)).await.unwrap(),
            Some(b"<svg/>".to_vec())
        );
        assert_eq!(source.payload(&LogicalId::image(5)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn dir_source_refuses_escaping_ids() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirSource::new(dir.path());
        let id = LogicalId::new("../secret").unwrap();
        assert!(matches!(
            source.payload(&id).await,
            Err(RepairError::Source { .. })
        ));
    }
}
