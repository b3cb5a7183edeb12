//! Core domain types for the Pricewatch pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RawRecord
// ---------------------------------------------------------------------------

/// A listing as scraped from the catalog, before any normalization.
///
/// `price_gbp` holds the raw price text (e.g. `"£51.77"`); parsing it into a
/// number is the transform stage's job, so an unparseable price surfaces as a
/// record-level enrichment failure rather than a scrape failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// Listing title as displayed.
    pub title: String,
    /// Raw price text in the base currency.
    pub price_gbp: String,
    /// Category from the detail-page breadcrumb, or empty if unavailable.
    pub category: String,
    /// Raw availability text (e.g. `"In stock (22 available)"`).
    pub availability: String,
}

// ---------------------------------------------------------------------------
// ExchangeRate
// ---------------------------------------------------------------------------

/// One staged exchange rate, unique per `(as_of_date, base, target)`.
///
/// Re-fetching the same day overwrites `rate` and refreshes `fetched_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// The day this rate applies to.
    pub as_of_date: NaiveDate,
    /// Base currency code (e.g. `GBP`).
    pub base_currency: String,
    /// Target currency code (e.g. `INR`).
    pub target_currency: String,
    /// Units of target currency per one unit of base currency.
    pub rate: f64,
    /// When the rate was fetched from the API.
    pub fetched_at: DateTime<Utc>,
}

impl ExchangeRate {
    /// Build a rate stamped for today (UTC).
    pub fn today(base: impl Into<String>, target: impl Into<String>, rate: f64) -> Self {
        let now = Utc::now();
        Self {
            as_of_date: now.date_naive(),
            base_currency: base.into(),
            target_currency: target.into(),
            rate,
            fetched_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Availability / price tier enums
// ---------------------------------------------------------------------------

/// Stock availability derived from the raw availability text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailabilityStatus {
    InStock,
    OutOfStock,
    Unknown,
}

impl AvailabilityStatus {
    /// The label stored in the `products` table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InStock => "In Stock",
            Self::OutOfStock => "Out of Stock",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse a stored label back into the enum. Unrecognized labels map to
    /// `Unknown` rather than failing, matching read-back leniency.
    pub fn from_label(label: &str) -> Self {
        match label {
            "In Stock" => Self::InStock,
            "Out of Stock" => Self::OutOfStock,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse price bucket derived from the base-currency price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier {
    Cheap,
    Moderate,
    Expensive,
}

impl PriceTier {
    /// The lowercase label stored in the `products` table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cheap => "cheap",
            Self::Moderate => "moderate",
            Self::Expensive => "expensive",
        }
    }

    /// Parse a stored label back into the enum.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "cheap" => Some(Self::Cheap),
            "moderate" => Some(Self::Moderate),
            "expensive" => Some(Self::Expensive),
            _ => None,
        }
    }
}

impl std::fmt::Display for PriceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EnrichedRecord
// ---------------------------------------------------------------------------

/// A fully enriched product, immutable once produced by the transformer.
///
/// `product_id` is a pure function of the cleaned title, normalized category,
/// and canonically formatted price, so identical inputs always yield the
/// identical identifier across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// Stable identity: hex-encoded SHA-256 digest (64 chars).
    pub product_id: String,
    /// Cleaned title.
    pub title: String,
    /// Price in the base currency.
    pub price_gbp: f64,
    /// Converted price, rounded to two decimals.
    pub price_inr: f64,
    /// Normalized category (`"Uncategorized"` if absent/unknown).
    pub category: String,
    /// Parsed availability status.
    pub availability_status: AvailabilityStatus,
    /// Units available, when the availability text carried a quantity.
    pub stock_quantity: Option<u32>,
    /// Coarse price bucket.
    pub price_tier: PriceTier,
}

// ---------------------------------------------------------------------------
// LoadStrategy
// ---------------------------------------------------------------------------

/// How the transformed batch is persisted into the `products` table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStrategy {
    /// Full refresh: clear the table and bulk-insert, atomically.
    #[default]
    Replace,
    /// Insert-or-update per row, keyed by `product_id`.
    Upsert,
}

impl LoadStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Upsert => "upsert",
        }
    }
}

impl std::fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LoadStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "upsert" => Ok(Self::Upsert),
            other => Err(format!(
                "unknown load strategy '{other}': expected 'replace' or 'upsert'"
            )),
        }
    }
}
