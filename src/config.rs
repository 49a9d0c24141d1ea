//! Configuration file parser for ~/.config/brief/config.toml.
//!
//! The config file is optional: a missing or empty file yields
//! `Config::default()`, and unknown keys are logged and ignored. The file
//! only seeds the per-call structs ([`FetchConfig`], [`NormalizeConfig`])
//! that the feed pipeline takes explicitly; nothing in the core reads
//! ambient configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::feed::{FetchConfig, NormalizeConfig, MAX_CONCURRENCY};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config file too large: {0} bytes (max {1})")]
    TooLarge(u64, u64),
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified; missing keys fall back to the defaults below.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-feed timeout for digest and health-check fetches, in seconds.
    pub digest_timeout_secs: u64,

    /// Timeout for single-feed fetches, in seconds.
    pub fetch_timeout_secs: u64,

    /// Upper bound on concurrently fetching feeds (hard-capped at 20).
    pub concurrency: usize,

    /// Summary truncation length for digest-path normalization.
    pub summary_limit: usize,

    /// Summary truncation length for the single-feed fetch view.
    pub fetch_summary_limit: usize,

    /// Overrides the default subscriptions path (feeds.json next to this
    /// file).
    pub feeds_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            digest_timeout_secs: 10,
            fetch_timeout_secs: 15,
            concurrency: MAX_CONCURRENCY,
            summary_limit: 500,
            fetch_summary_limit: 300,
            feeds_file: None,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as a warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(meta.len(), Self::MAX_FILE_SIZE));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read.
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "digest_timeout_secs",
                "fetch_timeout_secs",
                "concurrency",
                "summary_limit",
                "fetch_summary_limit",
                "feeds_file",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Fetch tunables for the concurrent digest/check path.
    pub fn digest_fetch(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.digest_timeout_secs),
            concurrency: self.concurrency,
        }
    }

    /// Normalization tunables for the digest path: every item, no full
    /// content.
    pub fn digest_normalize(&self) -> NormalizeConfig {
        NormalizeConfig {
            summary_limit: self.summary_limit,
            ..NormalizeConfig::default()
        }
    }

    /// Normalization tunables for the single-feed fetch view, which
    /// historically truncates summaries shorter than the digest path does.
    pub fn fetch_normalize(&self, item_limit: usize, full_content: bool) -> NormalizeConfig {
        NormalizeConfig {
            item_limit,
            summary_limit: self.fetch_summary_limit,
            full_content,
        }
    }
}
