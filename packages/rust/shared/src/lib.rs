//! Shared types, error model, and configuration for Pricewatch.
//!
//! This crate is the foundation depended on by all other Pricewatch crates.
//! It provides:
//! - [`PricewatchError`] — the unified error type
//! - Domain types ([`RawRecord`], [`ExchangeRate`], [`EnrichedRecord`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DatabaseConfig, LoadConfig, PipelineConfig, RatesConfig, ScrapeConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{PricewatchError, Result};
pub use types::{
    AvailabilityStatus, EnrichedRecord, ExchangeRate, LoadStrategy, PriceTier, RawRecord,
};
