//! Repair scanner for Glyph.
//!
//! Ledgers can accept a submission and never make it retrievable. The
//! [`RepairScanner`] finds every logical id whose record is not provably
//! intact and re-drives the write until it is, or until the attempt budget
//! runs out.
//!
//! # States
//!
//! | State           | Scanner action                                             |
//! |-----------------|------------------------------------------------------------|
//! | `Uninitialized` | write from the [`PayloadSource`], if it has a payload      |
//! | `WriteFailed`   | re-verify; re-drive if still unreadable                    |
//! | `Healthy`       | re-verify; rewrite only with `force`, finalize with `finalize` |
//! | `Finalized`     | skipped                                                    |
//!
//! # Re-drive
//!
//! Attempt `i` uses strategy `order[i % order.len()]` and resource limit
//! `initial_limit * growth^i` (capped), with exponential backoff between
//! attempts. Jobs pass through a debounced [`WriteQueue`] and run on a
//! bounded worker pool.

pub mod config;
pub mod error;
pub mod queue;
pub mod report;
pub mod scanner;
pub mod source;
pub mod state;

pub use config::{RepairConfig, StrategyKind, MAX_BATCH};
pub use error::{RepairError, RepairResult};
pub use queue::{JobHandle, JobOutcome, QueuedJob, RepairJob, WriteQueue};
pub use report::{RepairReport, ScanFailure, StateChange, StateCounts};
pub use scanner::{RepairScanner, ScanOptions};
pub use source::{DirSource, MemorySource, PayloadSource};
pub use state::EntryState;
