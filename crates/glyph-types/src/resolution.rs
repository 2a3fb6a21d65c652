use std::fmt;

use crate::hash::ContentHash;
use crate::logical::LogicalId;
use crate::pointer::Pointer;

/// Why a read could not produce the stored payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnreadableReason {
    /// No entry has ever been written for the logical id.
    NoEntry,
    /// The pointer resolves to no stored bytes.
    Missing { pointer: Pointer },
    /// The ledger could not be reached.
    Fetch(String),
    /// The entry bookkeeping could not be read.
    Store(String),
    /// The stored bytes are not a valid record.
    Malformed { pointer: Pointer },
    /// The decoded payload does not match the recorded content hash.
    IntegrityFailure {
        expected: ContentHash,
        found: ContentHash,
    },
}

impl fmt::Display for UnreadableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEntry => f.write_str("no entry"),
            Self::Missing { pointer } => write!(f, "pointer {} resolves to nothing", pointer.short_hex()),
            Self::Fetch(e) => write!(f, "fetch failed: {e}"),
            Self::Store(e) => write!(f, "entry store failed: {e}"),
            Self::Malformed { pointer } => write!(f, "record at {} is malformed", pointer.short_hex()),
            Self::IntegrityFailure { expected, found } => write!(
                f,
                "integrity failure: expected {}, found {}",
                expected.short_hex(),
                found.short_hex()
            ),
        }
    }
}

/// Outcome of reading a blob back.
///
/// Callers must handle all three variants: reads never panic and never
/// return unverified bytes as data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionResult {
    Healthy(Vec<u8>),
    /// A deterministic substitute generated because the real payload for
    /// `logical_id` was unreadable.
    Placeholder {
        payload: Vec<u8>,
        logical_id: LogicalId,
    },
    Unreadable(UnreadableReason),
}

impl ResolutionResult {
    /// The payload bytes, if any (healthy or substitute).
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::Healthy(p) => Some(p),
            Self::Placeholder { payload, .. } => Some(payload),
            Self::Unreadable(_) => None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy(_))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }

    pub fn unreadable_reason(&self) -> Option<&UnreadableReason> {
        match self {
            Self::Unreadable(r) => Some(r),
            _ => None,
        }
    }
}
