use glyph_store::{ReverifyError, StoreError, WriteError};
use glyph_types::LogicalId;
use thiserror::Error;

/// Errors from the repair scanner and its write queue.
#[derive(Debug, Error)]
pub enum RepairError {
    /// The job was still queued when the queue was cancelled. No entry was
    /// touched on its behalf.
    #[error("job cancelled before dispatch")]
    Cancelled,

    #[error("invalid repair configuration: {0}")]
    InvalidConfig(String),

    #[error("payload source error for {id}: {reason}")]
    Source { id: LogicalId, reason: String },

    #[error("entry store error: {0}")]
    Store(#[from] StoreError),

    #[error("write error: {0}")]
    Write(#[from] WriteError),

    #[error("re-verification error: {0}")]
    Reverify(#[from] ReverifyError),

    #[error("worker task failed: {0}")]
    Worker(String),
}

pub type RepairResult<T> = Result<T, RepairError>;
