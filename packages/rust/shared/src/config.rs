//! Application configuration for Pricewatch.
//!
//! User config lives at `~/.pricewatch/pricewatch.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! Configuration is loaded once at process start and passed by reference into
//! each component; business logic never reads the environment directly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PricewatchError, Result};
use crate::types::LoadStrategy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pricewatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pricewatch";

// ---------------------------------------------------------------------------
// Config structs (matching pricewatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Catalog scraping settings.
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Exchange-rate API settings.
    #[serde(default)]
    pub rates: RatesConfig,

    /// Load strategy settings.
    #[serde(default)]
    pub load: LoadConfig,

    /// Orchestration retry/timeout settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the local libSQL database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "var/pricewatch.db".into()
}

/// `[scrape]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Base URL of the catalog site.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Maximum number of catalog pages to scrape.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_pages: default_max_pages(),
            timeout_secs: default_http_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://books.toscrape.com".into()
}
fn default_max_pages() -> u32 {
    5
}
fn default_http_timeout() -> u64 {
    10
}

/// `[rates]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesConfig {
    /// Exchange-rate API endpoint.
    #[serde(default = "default_rates_api_url")]
    pub api_url: String,

    /// Base currency code.
    #[serde(default = "default_base_currency")]
    pub base_currency: String,

    /// Target currency code.
    #[serde(default = "default_target_currency")]
    pub target_currency: String,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            api_url: default_rates_api_url(),
            base_currency: default_base_currency(),
            target_currency: default_target_currency(),
            timeout_secs: default_http_timeout(),
        }
    }
}

fn default_rates_api_url() -> String {
    "https://api.exchangerate.host/latest".into()
}
fn default_base_currency() -> String {
    "GBP".into()
}
fn default_target_currency() -> String {
    "INR".into()
}

/// `[load]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Strategy for persisting the transformed batch.
    #[serde(default)]
    pub strategy: LoadStrategy,
}

/// `[pipeline]` section — retry/timeout policy applied uniformly to every
/// stage of the task graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Attempts per stage before the run is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts, in seconds.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Hard per-attempt timeout, in seconds.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_secs() -> u64 {
    300
}
fn default_attempt_timeout_secs() -> u64 {
    1800
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pricewatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PricewatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pricewatch/pricewatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PricewatchError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PricewatchError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PricewatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PricewatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PricewatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("books.toscrape.com"));
        assert!(toml_str.contains("strategy = \"replace\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.scrape.max_pages, 5);
        assert_eq!(parsed.rates.base_currency, "GBP");
        assert_eq!(parsed.rates.target_currency, "INR");
        assert_eq!(parsed.pipeline.max_attempts, 3);
        assert_eq!(parsed.pipeline.retry_delay_secs, 300);
        assert_eq!(parsed.pipeline.attempt_timeout_secs, 1800);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[scrape]
max_pages = 2

[load]
strategy = "upsert"
"#;
        let config: AppConfig = toml_str.parse::<toml::Table>().unwrap().try_into().unwrap();
        assert_eq!(config.scrape.max_pages, 2);
        assert_eq!(config.scrape.timeout_secs, 10);
        assert_eq!(config.load.strategy, LoadStrategy::Upsert);
        assert_eq!(config.database.path, "var/pricewatch.db");
    }

    #[test]
    fn unknown_strategy_rejected() {
        let toml_str = r#"
[load]
strategy = "append"
"#;
        let parsed: std::result::Result<AppConfig, _> = toml::from_str(toml_str);
        assert!(parsed.is_err());
    }
}
