use glyph_ledger::SubmitError;
use glyph_types::{LogicalId, Pointer, VerifyFailure};

/// Errors from entry store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Attempted to replace an entry that is already finalized.
    #[error("entry {0} is finalized and cannot be replaced")]
    Finalized(LogicalId),
}

/// Result alias for entry store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from [`BlobStore::write`](crate::BlobStore::write).
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The entry is finalized. Not retryable.
    #[error("entry {0} is finalized")]
    AlreadyFinalized(LogicalId),

    /// The ledger rejected the submission or it timed out. No entry was
    /// created or changed.
    #[error("submission failed: {0}")]
    SubmitFailed(#[source] SubmitError),

    /// The ledger accepted the submission but the record could not be
    /// verified. The entry is recorded as unhealthy and is retryable.
    #[error("write for {logical_id} at {pointer:?} is unhealthy: {failure}")]
    WriteUnhealthy {
        logical_id: LogicalId,
        pointer: Pointer,
        failure: VerifyFailure,
    },

    #[error("entry store error: {0}")]
    Store(#[from] StoreError),
}

impl WriteError {
    /// Whether a repair pass may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SubmitFailed(_) | Self::WriteUnhealthy { .. })
    }
}

/// Errors from [`BlobStore::finalize`](crate::BlobStore::finalize).
#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("no entry for {0}")]
    NotFound(LogicalId),

    /// The last write was not verified; finalizing would lock in a broken
    /// pointer.
    #[error("entry {0} is not healthy")]
    NotHealthy(LogicalId),

    #[error("entry {0} is already finalized")]
    AlreadyFinalized(LogicalId),

    #[error("entry store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from [`BlobStore::reverify`](crate::BlobStore::reverify).
#[derive(Debug, thiserror::Error)]
pub enum ReverifyError {
    #[error("no entry for {0}")]
    NotFound(LogicalId),

    #[error("entry {0} is finalized")]
    Finalized(LogicalId),

    #[error("entry store error: {0}")]
    Store(#[from] StoreError),
}
