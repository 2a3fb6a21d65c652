//! Foundation types for Glyph, a content-addressable blob store.
//!
//! Every other Glyph crate depends on `glyph-types`.
//!
//! # Key Types
//!
//! - [`Record`] -- Tagged byte layout wrapping a payload, see [`record::encode`]
//! - [`Pointer`] -- Opaque handle returned by the ledger for a stored record
//! - [`ContentHash`] -- BLAKE3 fingerprint of a payload
//! - [`LogicalId`] -- Application-assigned key (e.g. a card number)
//! - [`WriterId`] -- Identity of the single writer role
//! - [`Strategy`] -- Pointer derivation strategy (sequential or deterministic)
//! - [`Entry`] -- Logical-id-to-pointer binding with health and finalization state
//! - [`ResolutionResult`] -- Outcome of reading a blob back

pub mod entry;
pub mod error;
pub mod hash;
pub mod identity;
pub mod logical;
pub mod pointer;
pub mod record;
pub mod resolution;
pub mod strategy;

pub use entry::{Entry, VerifyFailure};
pub use error::TypeError;
pub use hash::ContentHash;
pub use identity::{Salt, WriterId};
pub use logical::LogicalId;
pub use pointer::Pointer;
pub use record::{MalformedRecord, Record, RECORD_TAG};
pub use resolution::{ResolutionResult, UnreadableReason};
pub use strategy::Strategy;

/// Parse a 64-character hex string into 32 raw bytes.
pub(crate) fn parse_hex32(s: &str) -> Result<[u8; 32], TypeError> {
    let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(TypeError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}
