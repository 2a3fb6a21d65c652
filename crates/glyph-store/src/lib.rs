//! Blob store for Glyph.
//!
//! The [`BlobStore`] orchestrates every write as encode -> submit -> verify
//! and every read as fetch -> decode -> verify. It owns the
//! write-once-after-finalize invariant per logical id and keeps an
//! [`Entry`](glyph_types::Entry) for every id it has written.
//!
//! # Entry Stores
//!
//! Entry bookkeeping goes through the [`EntryStore`] trait:
//!
//! - [`InMemoryEntryStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`JsonFileEntryStore`] -- whole-map JSON file, replaced atomically
//!
//! # Design Rules
//!
//! 1. A submission is not a success until the record has been fetched back
//!    and its payload hash matches.
//! 2. A failed or timed-out submission never creates or mutates an entry.
//! 3. Accepted-but-unverified writes are recorded with `healthy = false`
//!    so a repair pass can find them.
//! 4. `write` and `finalize` are serialized per logical id; distinct ids
//!    proceed in parallel.
//! 5. Reads never mutate anything and never fail with a panic: every
//!    failure is a typed [`ResolutionResult::Unreadable`](glyph_types::ResolutionResult).

pub mod blob;
pub mod config;
pub mod error;
pub mod file;
mod locks;
pub mod memory;
pub mod traits;

pub use blob::{BlobStore, EntryExt};
pub use config::StoreConfig;
pub use error::{FinalizeError, ReverifyError, StoreError, StoreResult, WriteError};
pub use file::JsonFileEntryStore;
pub use memory::InMemoryEntryStore;
pub use traits::EntryStore;
