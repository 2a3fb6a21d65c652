use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque, globally unique handle to a record held by the ledger.
///
/// Pointers are produced by a ledger adapter on successful submission. Their
/// derivation depends on the [`Strategy`](crate::Strategy) used; callers must
/// never assume a pointer is predictable unless the deterministic strategy
/// was requested.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pointer([u8; 32]);

impl Pointer {
    /// Wrap a pre-computed 32-byte handle.
    pub const fn from_raw(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32-byte handle.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string, with or without a `ptr:` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("ptr:").unwrap_or(s);
        crate::parse_hex32(s).map(Self)
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointer({})", self.short_hex())
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for Pointer {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}
