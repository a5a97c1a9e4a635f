//! Pipeline configuration.
//!
//! An explicit value threaded into the pipeline's constructors. Loaded from
//! TOML (every field optional) with the API key taken from the
//! `QUANDL_API_KEY` environment variable when it is set.

use crate::data::merge::MeanPolicy;
use crate::data::poloniex::POLONIEX_BASE_URL;
use crate::data::quandl::QUANDL_BASE_URL;
use crate::epoch::SECONDS_PER_DAY;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the price API key.
pub const API_KEY_ENV: &str = "QUANDL_API_KEY";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no API key configured: set QUANDL_API_KEY or `api_key` in the config file")]
    MissingApiKey,
}

/// A secret API token. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Everything the pipeline needs to know up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding one CSV per cached series.
    pub data_dir: PathBuf,
    /// Exchanges aggregated into the BTC/USD table.
    pub exchanges: Vec<String>,
    /// Alt-coin tickers fetched against BTC.
    pub altcoins: Vec<String>,
    /// First day of the alt-coin history window.
    pub history_start: NaiveDate,
    /// Candlestick width in seconds.
    pub candlestick_period: u64,
    pub quandl_base_url: String,
    pub poloniex_base_url: String,
    /// Missing-value handling for the `Mean` and `Volume` columns.
    pub mean_policy: MeanPolicy,
    pub api_key: Option<ApiKey>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("crypto_data"),
            exchanges: ["COINBASE", "BITSTAMP", "KRAKEN", "OKCOIN"]
                .map(String::from)
                .to_vec(),
            altcoins: [
                "ETH", "XRP", "BCH", "LTC", "DASH", "XMR", "ETC", "XEM", "ZEC", "DOGE",
            ]
            .map(String::from)
            .to_vec(),
            history_start: NaiveDate::from_ymd_opt(2011, 1, 1).expect("valid constant date"),
            candlestick_period: SECONDS_PER_DAY as u64,
            quandl_base_url: QUANDL_BASE_URL.to_string(),
            poloniex_base_url: POLONIEX_BASE_URL.to_string(),
            mean_policy: MeanPolicy::default(),
            api_key: None,
        }
    }
}

impl PipelineConfig {
    /// Parse from a TOML string. Missing fields take their defaults.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load from `path` if given, else defaults, then apply the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Take the API key from `QUANDL_API_KEY` when it is set.
    pub fn with_env_overrides(self) -> Self {
        self.with_api_key_override(std::env::var(API_KEY_ENV).ok())
    }

    /// Replace the API key with `key` unless it is absent or blank.
    pub fn with_api_key_override(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(ApiKey::new(key.trim()));
        }
        self
    }

    /// The API key, or `MissingApiKey`.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_ref()
            .map(ApiKey::expose)
            .ok_or(ConfigError::MissingApiKey)
    }
}
