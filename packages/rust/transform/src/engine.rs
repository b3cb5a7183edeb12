//! Identity & enrichment engine: pure per-record operations, no I/O.
//!
//! Every function here is deterministic. [`generate_product_id`] in
//! particular must be stable across runs — the canonical price formatting it
//! relies on is fixed by [`canonical_price`].

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use pricewatch_shared::{
    AvailabilityStatus, EnrichedRecord, PricewatchError, PriceTier, RawRecord, Result,
};

/// Collapse internal whitespace runs to a single space and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a category name.
///
/// Empty or case-insensitive `"unknown"` maps to the `"Uncategorized"`
/// sentinel; anything else is cleaned and converted to Title Case.
pub fn normalize_category(category: &str) -> String {
    let cleaned = clean_text(category);
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("unknown") {
        return "Uncategorized".to_string();
    }
    title_case(&cleaned)
}

/// Capitalize the first letter of each word, lowercasing the rest.
fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a raw price text into a non-negative number.
///
/// Strips everything except digits and `.` (currency symbols, thousands
/// separators), then parses. Returns `None` if nothing parseable remains.
pub fn parse_price(text: &str) -> Option<f64> {
    let numeric: String = text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    let price = numeric.parse::<f64>().ok()?;
    (price.is_finite() && price >= 0.0).then_some(price)
}

/// Parse availability text into a status and optional quantity.
///
/// Quantity matches the pattern `(<digits> available)`; status is decided by
/// case-insensitive substring match.
pub fn parse_availability(availability: &str) -> (AvailabilityStatus, Option<u32>) {
    static QUANTITY_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\((\d+)\s+available\)").expect("valid regex"));

    let cleaned = clean_text(availability);
    if cleaned.is_empty() {
        return (AvailabilityStatus::Unknown, None);
    }

    let quantity = QUANTITY_RE
        .captures(&cleaned)
        .and_then(|caps| caps[1].parse::<u32>().ok());

    let lower = cleaned.to_lowercase();
    let status = if lower.contains("in stock") {
        AvailabilityStatus::InStock
    } else if lower.contains("out of stock") {
        AvailabilityStatus::OutOfStock
    } else {
        AvailabilityStatus::Unknown
    };

    (status, quantity)
}

/// Convert a base-currency price using the given rate.
///
/// Returns `0.0` if either input is zero. Rounds to two decimals, half away
/// from zero (`f64::round` semantics).
pub fn convert_price(price_gbp: f64, rate: f64) -> f64 {
    if price_gbp == 0.0 || rate == 0.0 {
        return 0.0;
    }
    (price_gbp * rate * 100.0).round() / 100.0
}

/// Bucket a base-currency price into a coarse tier.
///
/// Boundaries are inclusive-lower: exactly 20.00 is moderate, exactly 50.00
/// is expensive.
pub fn derive_price_tier(price_gbp: f64) -> PriceTier {
    if price_gbp < 20.0 {
        PriceTier::Cheap
    } else if price_gbp < 50.0 {
        PriceTier::Moderate
    } else {
        PriceTier::Expensive
    }
}

/// Canonical fixed-point price formatting used for identity hashing.
///
/// Always two fractional digits, so `51.7` and `51.70` hash identically.
pub fn canonical_price(price_gbp: f64) -> String {
    format!("{price_gbp:.2}")
}

/// Generate the stable product identifier.
///
/// SHA-256 over the UTF-8 bytes of `"{title}|{category}|{price}"` using the
/// cleaned title, normalized category, and canonical price formatting;
/// hex-encoded (64 chars).
pub fn generate_product_id(title: &str, category: &str, price_gbp: f64) -> String {
    let unique = format!("{title}|{category}|{}", canonical_price(price_gbp));
    let mut hasher = Sha256::new();
    hasher.update(unique.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Enrich a single raw record with the effective exchange rate.
///
/// Fails (record dropped by the caller, batch continues) if the raw price
/// text cannot be parsed as a non-negative number.
pub fn enrich(raw: &RawRecord, rate: f64) -> Result<EnrichedRecord> {
    let title = clean_text(&raw.title);

    let price_gbp = parse_price(&raw.price_gbp).ok_or_else(|| {
        PricewatchError::enrichment(
            title.clone(),
            format!("price {:?} is not a non-negative number", raw.price_gbp),
        )
    })?;

    let category = normalize_category(&raw.category);
    let (availability_status, stock_quantity) = parse_availability(&raw.availability);

    Ok(EnrichedRecord {
        product_id: generate_product_id(&title, &category, price_gbp),
        title,
        price_gbp,
        price_inr: convert_price(price_gbp, rate),
        category,
        availability_status,
        stock_quantity,
        price_tier: derive_price_tier(price_gbp),
    })
}
