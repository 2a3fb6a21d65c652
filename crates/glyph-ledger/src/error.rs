use std::time::Duration;

/// Why a submission did not produce a pointer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("out of resources: record costs {cost} units, limit was {limit}")]
    OutOfResources { cost: u64, limit: u64 },

    #[error("record of {size} bytes exceeds the {max} byte limit")]
    RecordTooLarge { size: usize, max: usize },

    #[error("submission timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Transport-level failure while fetching. Never used for "not found".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SubmitError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

pub type SubmitResult<T> = Result<T, SubmitError>;
pub type FetchResult<T> = Result<T, FetchError>;
