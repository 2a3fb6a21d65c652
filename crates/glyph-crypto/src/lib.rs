//! Hashing and pointer derivation for Glyph.
//!
//! Provides the domain-separated BLAKE3 content hasher used for integrity
//! checks, and the two pointer derivation schemes ledger adapters use to
//! name stored records.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;
pub mod pointer;

pub use hasher::ContentHasher;
pub use pointer::{deterministic_pointer, sequential_pointer};
