//! Catalog scraping collaborator.
//!
//! This crate provides:
//! - [`extract`] — pure DOM field extraction for catalog and detail pages
//! - [`engine`] — the sequential page-by-page [`Scraper`]

pub mod engine;
pub mod extract;

pub use engine::Scraper;
pub use extract::{Listing, extract_category, parse_listings};
