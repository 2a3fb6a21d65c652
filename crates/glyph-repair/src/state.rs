use std::fmt;

use glyph_types::Entry;
use serde::{Deserialize, Serialize};

/// Repair classification of one logical id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// No entry has ever been recorded.
    Uninitialized,
    /// The last write or re-verification did not prove the record.
    WriteFailed,
    Healthy,
    /// Terminal. Never rewritten.
    Finalized,
}

impl EntryState {
    pub fn classify(entry: Option<&Entry>) -> Self {
        match entry {
            None => Self::Uninitialized,
            Some(e) if e.finalized => Self::Finalized,
            Some(e) if e.healthy => Self::Healthy,
            Some(_) => Self::WriteFailed,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::WriteFailed => "write_failed",
            Self::Healthy => "healthy",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_types::{ContentHash, LogicalId, Pointer, Strategy, VerifyFailure};

    fn entry() -> Entry {
        Entry::new(
            LogicalId::image(1),
            Pointer::from_raw([1; 32]),
            ContentHash::from_hash([2; 32]),
            Strategy::Sequential,
        )
    }

    #[test]
    fn classification() {
        assert_eq!(EntryState::classify(None), EntryState::Uninitialized);

        let mut e = entry();
        assert_eq!(EntryState::classify(Some(&e)), EntryState::Healthy);

        e.mark_unhealthy(VerifyFailure::Missing);
        assert_eq!(EntryState::classify(Some(&e)), EntryState::WriteFailed);

        e.finalized = true;
        assert_eq!(EntryState::classify(Some(&e)), EntryState::Finalized);
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&EntryState::WriteFailed).unwrap(),
            "\"write_failed\""
        );
        assert_eq!(EntryState::WriteFailed.to_string(), "write_failed");
    }
}
