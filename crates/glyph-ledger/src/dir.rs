use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glyph_crypto::{deterministic_pointer, sequential_pointer, ContentHasher};
use glyph_types::{Pointer, Record, Strategy, WriterId};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cost::{CostModel, ResourceLimit};
use crate::error::{FetchResult, SubmitError, SubmitResult};
use crate::memory::DEFAULT_MAX_RECORD_SIZE;
use crate::traits::LedgerAdapter;

const RECORDS_DIR: &str = "records";
const NONCE_FILE: &str = "NONCE";

/// Ledger that keeps each record in its own file, named by pointer hex.
///
/// ```text
/// <root>/
///   NONCE              next sequential nonce, decimal
///   records/<hex>      one record per pointer
/// ```
///
/// Files are written to a temporary name and renamed into place, so a
/// crash never leaves a partially written record under a valid pointer.
pub struct DirLedger {
    root: PathBuf,
    writer: WriterId,
    max_record_size: usize,
    cost: CostModel,
    nonce: Mutex<u64>,
}

impl DirLedger {
    /// Open (or create) a ledger directory.
    pub fn open(root: impl AsRef<Path>, writer: WriterId) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(RECORDS_DIR))?;
        let nonce = match std::fs::read_to_string(root.join(NONCE_FILE)) {
            Ok(s) => s.trim().parse().map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, format!("bad nonce: {e}"))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };
        info!(root = %root.display(), writer = %writer, nonce, "directory ledger opened");
        Ok(Self {
            root,
            writer,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            cost: CostModel::default(),
            nonce: Mutex::new(nonce),
        })
    }

    pub fn with_limits(mut self, max_record_size: usize, cost: CostModel) -> Self {
        self.max_record_size = max_record_size;
        self.cost = cost;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, pointer: &Pointer) -> PathBuf {
        self.root.join(RECORDS_DIR).join(pointer.to_hex())
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await
    }
}

#[async_trait]
impl LedgerAdapter for DirLedger {
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

        let pointer = match strategy {
            Strategy::Sequential => {
                let mut nonce = self.nonce.lock().await;
                let pointer = sequential_pointer(&self.writer, *nonce);
                Self::write_atomic(&self.record_path(&pointer), record.as_bytes()).await?;
                *nonce += 1;
                Self::write_atomic(&self.root.join(NONCE_FILE), nonce.to_string().as_bytes())
                    .await?;
                pointer
            }
            Strategy::Deterministic { salt } => {
                let content = ContentHasher::BLOB.hash(payload);
                let pointer = deterministic_pointer(&self.writer, salt, &content);
                let path = self.record_path(&pointer);
                match tokio::fs::read(&path).await {
                    Ok(existing) if existing == record.as_bytes() => {
                        debug!(pointer = %pointer.short_hex(), "deterministic resubmission is a no-op");
                        return Ok(pointer);
                    }
                    _ => Self::write_atomic(&path, record.as_bytes()).await?,
                }
                pointer
            }
        };
        debug!(pointer = %pointer.short_hex(), strategy = %strategy, len = record.len(), "record submitted");
        Ok(pointer)
    }

    async fn fetch(&self, pointer: &Pointer) -> FetchResult<Option<Record>> {
        match tokio::fs::read(self.record_path(pointer)).await {
            Ok(bytes) => Ok(Some(Record::from_bytes(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for DirLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirLedger")
            .field("root", &self.root)
            .field("writer", &self.writer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_types::record::encode;
    use glyph_types::Salt;

    const LIMIT: ResourceLimit = ResourceLimit::UNLIMITED;

    #[tokio::test]
    async fn submit_and_fetch_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DirLedger::open(dir.path(), WriterId::derive("w")).unwrap();
        let record = encode(b"{\"name\":\"Ace\"}");
        let ptr = ledger.submit(&record, &Strategy::Sequential, LIMIT).await.unwrap();
        assert_eq!(ledger.fetch(&ptr).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn unknown_pointer_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DirLedger::open(dir.path(), WriterId::derive("w")).unwrap();
        assert_eq!(ledger.fetch(&Pointer::from_raw([3; 32])).await.unwrap(), None);
    }

    #[tokio::test]
    async fn nonce_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let writer = WriterId::derive("w");
        let first = {
            let ledger = DirLedger::open(dir.path(), writer).unwrap();
            ledger
                .submit(&encode(b"a"), &Strategy::Sequential, LIMIT)
                .await
                .unwrap()
        };
        let reopened = DirLedger::open(dir.path(), writer).unwrap();
        let second = reopened
            .submit(&encode(b"a"), &Strategy::Sequential, LIMIT)
            .await
            .unwrap();
        assert_ne!(first, second);
        assert!(reopened.fetch(&first).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deterministic_pointer_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DirLedger::open(dir.path(), WriterId::derive("w")).unwrap();
        let strategy = Strategy::deterministic(Salt::from_raw([8; 32]));
        let a = ledger.submit(&encode(b"x"), &strategy, LIMIT).await.unwrap();
        let b = ledger.submit(&encode(b"x"), &strategy, LIMIT).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn oversized_record_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DirLedger::open(dir.path(), WriterId::derive("w"))
            .unwrap()
            .with_limits(2, CostModel::FREE);
        let err = ledger
            .submit(&encode(b"abc"), &Strategy::Sequential, LIMIT)
            .await
            .unwrap_err();
        assert_eq!(err, SubmitError::RecordTooLarge { size: 4, max: 2 });
    }
}
