//! Record codec.
//!
//! A record is the stored representation of a payload: one reserved tag byte
//! followed by the raw payload bytes.
//!
//! ```text
//! +-----+---------------------------+
//! | tag | payload (0..N bytes)      |
//! +-----+---------------------------+
//! ```
//!
//! `[tag]` alone is the empty payload, which is a valid state distinct from
//! "no record".

use serde::{Deserialize, Serialize};

/// The reserved tag byte. Currently constant.
pub const RECORD_TAG: u8 = 0x00;

/// Returned by [`decode`] when the input is shorter than the tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("malformed record: missing tag byte")]
pub struct MalformedRecord;

/// Encoded record bytes as handed to and returned by the ledger.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record(Vec<u8>);

impl Record {
    /// Wrap raw bytes read back from the ledger. No validation happens here;
    /// call [`Record::payload`] or [`decode`] to check the layout.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The tag byte, if present.
    pub fn tag(&self) -> Option<u8> {
        self.0.first().copied()
    }

    /// Borrow the payload without copying.
    pub fn payload(&self) -> Result<&[u8], MalformedRecord> {
        match self.0.split_first() {
            Some((_, rest)) => Ok(rest),
            None => Err(MalformedRecord),
        }
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("tag", &self.tag())
            .field("len", &self.0.len())
            .finish()
    }
}

/// Encode a payload into a record. Total: never fails.
pub fn encode(payload: &[u8]) -> Record {
    let mut bytes = Vec::with_capacity(payload.len() + 1);
    bytes.push(RECORD_TAG);
    bytes.extend_from_slice(payload);
    Record(bytes)
}

/// Decode a record back into its payload.
///
/// Fails iff the record is empty. Unknown tag values are not rejected: the
/// tag is reserved, not validated.
pub fn decode(record: &[u8]) -> Result<Vec<u8>, MalformedRecord> {
    match record.split_first() {
        Some((_, payload)) => Ok(payload.to_vec()),
        None => Err(MalformedRecord),
    }
}
