//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Global configuration for ccindex
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub output: OutputConfig,
    pub http: HttpSettings,
    #[serde(rename = "match")]
    pub matching: MatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Collection identifier, e.g. `CC-MAIN-2017-34`
    pub id: String,
    pub base_url: String,
    /// First shard index (inclusive)
    pub start: u32,
    /// Last shard index (inclusive)
    pub end: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            id: "CC-MAIN-2017-34".to_string(),
            base_url: ccindex_core::DEFAULT_BASE_URL.to_string(),
            start: 0,
            end: 299,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Append target; `commoncrawl-<crawl id>.txt` when unset
    pub path: Option<PathBuf>,
}

/// Timeouts in seconds
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub connect_timeout: u64,
    pub read_timeout: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let defaults = ccindex_core::HttpConfig::default();
        Self {
            connect_timeout: defaults.connect_timeout.as_secs(),
            read_timeout: defaults.read_timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub extensions: Vec<String>,
    pub mime_types: Vec<String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            extensions: ccindex_core::DEFAULT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            mime_types: ccindex_core::DEFAULT_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./ccindex.toml (current directory)
    /// 2. ~/.config/ccindex/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("ccindex.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "ccindex") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.crawl.id.trim().is_empty() {
            bail!("crawl id must not be empty");
        }
        if self.crawl.start > self.crawl.end {
            bail!(
                "shard range is empty: start {} > end {}",
                self.crawl.start,
                self.crawl.end
            );
        }
        if self.http.read_timeout == 0 || self.http.connect_timeout == 0 {
            bail!("HTTP timeouts must be at least 1 second");
        }
        Ok(())
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("commoncrawl-{}.txt", self.crawl.id)))
    }

    pub fn http_config(&self) -> ccindex_core::HttpConfig {
        ccindex_core::HttpConfig {
            connect_timeout: std::time::Duration::from_secs(self.http.connect_timeout),
            read_timeout: std::time::Duration::from_secs(self.http.read_timeout),
        }
    }

    pub fn filter(&self) -> ccindex_core::SuffixFilter {
        ccindex_core::SuffixFilter::new(&self.matching.extensions, &self.matching.mime_types)
    }
}
