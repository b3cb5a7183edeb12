//! Identity & enrichment engine and batch transformer.
//!
//! This crate provides:
//! - [`engine`] — pure per-record operations: text cleanup, category
//!   normalization, availability parsing, price conversion, tiering, and
//!   stable product-identity hashing
//! - [`batch`] — rate fan-in resolution and batch mapping with per-record
//!   failure absorption

pub mod batch;
pub mod engine;

pub use batch::{resolve_rate, transform_batch};
pub use engine::{
    canonical_price, clean_text, convert_price, derive_price_tier, enrich, generate_product_id,
    normalize_category, parse_availability, parse_price,
};
