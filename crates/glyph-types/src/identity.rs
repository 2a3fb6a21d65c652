use std::fmt;

use serde::{Deserialize, Serialize};

use crate::logical::LogicalId;

/// Identity of the writer role that submits records to the ledger.
///
/// Glyph has exactly one writer role system-wide. Pointer derivation mixes
/// the writer identity in, so two writers never share a pointer space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WriterId {
    hash: [u8; 32],
}

impl WriterId {
    /// Derive a `WriterId` from a human-readable label (e.g. an account name).
    pub fn derive(label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"glyph-writer-v1:");
        hasher.update(label.as_bytes());
        Self {
            hash: *hasher.finalize().as_bytes(),
        }
    }

    /// Create from raw bytes. Use `derive()` for production code.
    pub fn from_raw(hash: [u8; 32]) -> Self {
        Self { hash }
    }

    /// The raw 32-byte identity.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("w:{}", hex::encode(&self.hash[..4]))
    }
}

impl fmt::Debug for WriterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WriterId({})", self.short_id())
    }
}

impl fmt::Display for WriterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_id())
    }
}

/// Caller-supplied salt for deterministic pointer derivation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Salt([u8; 32]);

impl Salt {
    pub const fn from_raw(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Stable salt for a logical id.
    ///
    /// Retrying a write for the same id with this salt and the same payload
    /// resolves to the same pointer, so repeated repair passes never create
    /// duplicate records.
    pub fn for_logical_id(id: &LogicalId) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"glyph-salt-v1:");
        hasher.update(id.as_str().as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", hex::encode(&self.0[..4]))
    }
}
