//! Pointer derivation.
//!
//! Ledger adapters name stored records with one of two schemes:
//!
//! - **Sequential**: `BLAKE3("glyph-pointer-seq-v1" || writer || nonce)`.
//!   The nonce is assigned by the ledger when the submission lands, so the
//!   pointer is unknown until then.
//! - **Deterministic**: `BLAKE3("glyph-pointer-det-v1" || writer || salt || hash)`.
//!   The same writer, salt and payload always name the same record.

use glyph_types::{ContentHash, Pointer, Salt, WriterId};

pub fn sequential_pointer(writer: &WriterId, nonce: u64) -> Pointer {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"glyph-pointer-seq-v1:");
    hasher.update(writer.as_bytes());
    hasher.update(&nonce.to_be_bytes());
    Pointer::from_raw(*hasher.finalize().as_bytes())
}

pub fn deterministic_pointer(writer: &WriterId, salt: &Salt, content: &ContentHash) -> Pointer {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"glyph-pointer-det-v1:");
    hasher.update(writer.as_bytes());
    hasher.update(salt.as_bytes());
    hasher.update(content.as_bytes());
    Pointer::from_raw(*hasher.finalize().as_bytes())
}
