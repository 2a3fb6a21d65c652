//! Ledger adapter boundary for Glyph.
//!
//! The ledger is an external collaborator: it accepts encoded records and
//! hands back a [`Pointer`](glyph_types::Pointer). It may reorder, delay, or
//! accept a submission yet never make the record retrievable. This crate
//! pins down that contract and ships two adapters:
//!
//! - [`InMemoryLedger`] -- fake for tests, with a scripted [`FaultPlan`]
//! - [`DirLedger`] -- records as files under a directory, for local use
//!
//! # Contract
//!
//! 1. `submit` returns a pointer or a typed [`SubmitError`]; it never blocks
//!    forever on its own but callers must still bound it with a timeout.
//! 2. `fetch` distinguishes "no stored bytes" (`Ok(None)`) from a transport
//!    fault (`Err`). Callers treat the first as a failed write and the
//!    second as a transient fault to retry at the fetch layer only.
//! 3. Deterministic submissions of identical content are idempotent.

pub mod cost;
pub mod dir;
pub mod error;
pub mod fault;
pub mod memory;
pub mod traits;

pub use cost::{CostModel, ResourceLimit};
pub use dir::DirLedger;
pub use error::{FetchError, FetchResult, SubmitError, SubmitResult};
pub use fault::{Fault, FaultPlan};
pub use memory::InMemoryLedger;
pub use traits::LedgerAdapter;
