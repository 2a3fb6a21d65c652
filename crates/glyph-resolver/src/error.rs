use glyph_types::{LogicalId, UnreadableReason};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// A document can tolerate a missing image but not a missing schema.
    #[error("document {id} is unreadable: {reason}")]
    DocumentUnreadable {
        id: LogicalId,
        reason: UnreadableReason,
    },

    #[error("document {id} is not a JSON object: {reason}")]
    InvalidDocument { id: LogicalId, reason: String },

    #[error("no companion image id for {0}")]
    NoCompanionImage(LogicalId),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type ResolveResult<T> = Result<T, ResolveError>;
