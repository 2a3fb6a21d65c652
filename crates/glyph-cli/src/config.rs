use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use glyph_ledger::{CostModel, ResourceLimit};
use glyph_repair::RepairConfig;
use glyph_store::config::millis;
use glyph_store::StoreConfig;
use serde::{Deserialize, Serialize};

/// Contents of `glyph.toml`. Every section and field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlyphConfig {
    pub store: StoreSection,
    pub repair: RepairConfig,
    pub ledger: LedgerSection,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    #[serde(with = "millis")]
    pub submit_timeout: Duration,
    pub fetch_retries: u32,
    #[serde(with = "millis")]
    pub fetch_retry_delay: Duration,
    pub default_limit: ResourceLimit,
}

impl Default for StoreSection {
    fn default() -> Self {
        let base = StoreConfig::new(Duration::from_secs(30));
        Self {
            submit_timeout: base.submit_timeout,
            fetch_retries: base.fetch_retries,
            fetch_retry_delay: base.fetch_retry_delay,
            default_limit: base.default_limit,
        }
    }
}

impl StoreSection {
    pub fn to_store_config(&self) -> StoreConfig {
        StoreConfig::new(self.submit_timeout)
            .with_fetch_retries(self.fetch_retries, self.fetch_retry_delay)
            .with_default_limit(self.default_limit)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// Holds `ledger/` (records) and `entries.json`.
    pub data_dir: PathBuf,
    /// Label the writer identity is derived from.
    pub writer: String,
    pub max_record_size: usize,
    pub cost: CostModel,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".glyph"),
            writer: "glyph".into(),
            max_record_size: 24 * 1024,
            cost: CostModel::default(),
        }
    }
}

impl LedgerSection {
    pub fn ledger_dir(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }

    pub fn entries_path(&self) -> PathBuf {
        self.data_dir.join("entries.json")
    }
}

impl GlyphConfig {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.repair.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
