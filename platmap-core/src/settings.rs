//! Configuration loading: TOML file first, command-line overrides on top.

use anyhow::{Context, Result};
use platmap_scanner::{CrawlConfig, MapId};
use std::fs;
use std::path::{Path, PathBuf};

/// Values given on the command line; `None` leaves the file/default value.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub seeds: Vec<MapId>,
    pub output_dir: Option<PathBuf>,
    pub delay_ms: Option<u64>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub sweep: bool,
    pub max_misses: Option<u32>,
    pub max_reference: Option<u32>,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut CrawlConfig) {
        if !self.seeds.is_empty() {
            config.seeds = self.seeds;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(delay) = self.delay_ms {
            config.delay_ms = delay;
        }
        if let Some(url) = self.base_url {
            config.base_url = url;
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout_secs = timeout;
        }
        if self.sweep {
            config.sweep.enabled = true;
        }
        if let Some(misses) = self.max_misses {
            config.sweep.max_misses = misses;
        }
        if let Some(max) = self.max_reference {
            config.references.max = max;
        }
    }
}

/// Parse a TOML configuration file.
pub fn load_config_file(path: &Path) -> Result<CrawlConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Expand a leading `~` in a path.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

/// Load (optional) file, apply overrides, expand paths and validate.
pub fn resolve_config(path: Option<&Path>, overrides: ConfigOverrides) -> Result<CrawlConfig> {
    let mut config = match path {
        Some(path) => load_config_file(&expand_path(path))?,
        None => CrawlConfig::default(),
    };

    overrides.apply(&mut config);
    config.output_dir = expand_path(&config.output_dir);
    config.validate().context("Invalid crawl configuration")?;

    Ok(config)
}
