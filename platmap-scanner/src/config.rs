use crate::error::{Result, ScanError};
use crate::identifier::{MAX_INDEX, MIN_INDEX, MapId};
use crate::references::ReferencePolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://esmeraldanv.devnetwedge.com";
pub const DEFAULT_OUTPUT_DIR: &str = "plat_maps";
pub const DEFAULT_SEED: &str = "001-01";
pub const DEFAULT_DELAY_MS: u64 = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("platmap/", env!("CARGO_PKG_VERSION"));

/// Everything a crawl needs, passed to the crawler and fetcher at
/// construction. Loaded from TOML by the CLI, with flags layered on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Starting maps, crawled one after another.
    pub seeds: Vec<MapId>,
    /// Pause between consecutive network requests.
    pub delay_ms: u64,
    /// Flat directory holding `{IDENTIFIER}.pdf` files.
    pub output_dir: PathBuf,
    /// Scheme and host of the records site.
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub references: ReferencePolicy,
    pub sweep: SweepConfig,
}

/// Sequential index sweep run after the reference-driven crawl of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub enabled: bool,
    /// Highest index tried.
    pub max_index: u32,
    /// Stop after this many absent or failed indices in a row.
    pub max_misses: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_index: MAX_INDEX,
            max_misses: 10,
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            delay_ms: DEFAULT_DELAY_MS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            references: ReferencePolicy::default(),
            sweep: SweepConfig::default(),
        }
    }
}

impl CrawlConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured seeds, or the default seed when none were given.
    pub fn seeds(&self) -> Result<Vec<MapId>> {
        if self.seeds.is_empty() {
            Ok(vec![MapId::parse(DEFAULT_SEED)?])
        } else {
            Ok(self.seeds.clone())
        }
    }

    pub fn base_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub fn sweep(&self) -> Option<&SweepConfig> {
        self.sweep.enabled.then_some(&self.sweep)
    }

    pub fn validate(&self) -> Result<()> {
        if self.delay_ms == 0 {
            return Err(ScanError::Config(
                "delay must be non-zero; the records server is rate limited by courtesy"
                    .to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ScanError::Config("timeout must be non-zero".to_string()));
        }
        if !(MIN_INDEX..=MAX_INDEX).contains(&self.sweep.max_index) {
            return Err(ScanError::Config(format!(
                "sweep max_index must be within {}-{}",
                MIN_INDEX, MAX_INDEX
            )));
        }
        if self.sweep.max_misses == 0 {
            return Err(ScanError::Config(
                "sweep max_misses must be at least 1".to_string(),
            ));
        }
        self.references.validate()?;
        self.base_url()?;
        Ok(())
    }
}
