use std::time::Duration;

use glyph_ledger::ResourceLimit;
use serde::{Deserialize, Serialize};

/// Configuration for a [`BlobStore`](crate::BlobStore).
///
/// There is no default submission timeout: the ledger has none of its own,
/// so the caller must choose one with [`StoreConfig::new`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Upper bound on a single `submit`. A timed-out submission is treated
    /// exactly like a rejected one.
    #[serde(with = "millis")]
    pub submit_timeout: Duration,
    /// Extra fetch attempts after a transport error during verification or
    /// reads. `Ok(None)` from the ledger is never retried.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    /// Pause between fetch attempts.
    #[serde(with = "millis", default = "default_fetch_retry_delay")]
    pub fetch_retry_delay: Duration,
    /// Resource limit for writes that do not name one.
    #[serde(default = "default_limit")]
    pub default_limit: ResourceLimit,
}

impl StoreConfig {
    pub fn new(submit_timeout: Duration) -> Self {
        Self {
            submit_timeout,
            fetch_retries: default_fetch_retries(),
            fetch_retry_delay: default_fetch_retry_delay(),
            default_limit: default_limit(),
        }
    }

    pub fn with_fetch_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.fetch_retries = retries;
        self.fetch_retry_delay = delay;
        self
    }

    pub fn with_default_limit(mut self, limit: ResourceLimit) -> Self {
        self.default_limit = limit;
        self
    }
}

fn default_fetch_retries() -> u32 {
    2
}

fn default_fetch_retry_delay() -> Duration {
    Duration::from_millis(250)
}

fn default_limit() -> ResourceLimit {
    ResourceLimit(500_000)
}

/// Serde helper: a [`Duration`] as whole milliseconds.
pub mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().min(u128::from(u64::MAX)) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
