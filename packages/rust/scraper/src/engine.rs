//! Sequential catalog scraper.
//!
//! Walks `catalogue/page-{n}.html` pages up to the configured maximum,
//! extracts listing fields, and resolves each listing's category from its
//! detail page. Detail lookups are cached per run so repeated categories do
//! not refetch.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use pricewatch_shared::{PricewatchError, RawRecord, Result, ScrapeConfig};

use crate::extract::{Listing, extract_category, parse_listings};

/// User-Agent string for scrape requests.
const USER_AGENT: &str = concat!("Pricewatch/", env!("CARGO_PKG_VERSION"));

/// Sequential catalog scraper with a per-run category cache.
pub struct Scraper {
    base_url: Url,
    max_pages: u32,
    client: Client,
}

impl Scraper {
    /// Create a new scraper from the scrape configuration.
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| PricewatchError::config(format!("invalid base_url: {e}")))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PricewatchError::fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            max_pages: config.max_pages,
            client,
        })
    }

    /// Scrape up to `max_pages` catalog pages sequentially.
    ///
    /// A page-level fetch failure or a page with no listings ends the loop;
    /// everything scraped so far is returned. Listing-level extraction
    /// problems are skipped. An empty overall result is the caller's signal
    /// that the run found no data.
    #[instrument(skip_all, fields(base_url = %self.base_url, max_pages = self.max_pages))]
    pub async fn scrape(&self) -> Result<Vec<RawRecord>> {
        let mut records: Vec<RawRecord> = Vec::new();
        let mut category_cache: HashMap<String, String> = HashMap::new();

        for page_num in 1..=self.max_pages {
            let page_url = self
                .base_url
                .join(&format!("catalogue/page-{page_num}.html"))
                .map_err(|e| PricewatchError::fetch(format!("bad page URL: {e}")))?;

            info!(page = page_num, url = %page_url, "scraping catalog page");

            let body = match self.fetch_text(&page_url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(page = page_num, error = %e, "page fetch failed, stopping pagination");
                    break;
                }
            };

            let listings = parse_listings(&body);
            if listings.is_empty() {
                warn!(page = page_num, "no listings found, stopping pagination");
                break;
            }

            let page_count = listings.len();
            for listing in listings {
                let category = self
                    .resolve_category(&page_url, &listing, &mut category_cache)
                    .await;

                records.push(RawRecord {
                    title: listing.title,
                    price_gbp: listing.price_text,
                    category,
                    availability: listing.availability,
                });
            }

            info!(page = page_num, listings = page_count, "scraped catalog page");
        }

        info!(total = records.len(), "scrape complete");
        Ok(records)
    }

    /// Resolve a listing's category from its detail page, consulting the
    /// per-run cache first. Any failure degrades to an empty category, which
    /// normalizes to the `"Uncategorized"` sentinel downstream.
    async fn resolve_category(
        &self,
        page_url: &Url,
        listing: &Listing,
        cache: &mut HashMap<String, String>,
    ) -> String {
        let Some(href) = listing.detail_href.as_deref() else {
            return String::new();
        };

        let Ok(detail_url) = page_url.join(href) else {
            warn!(title = %listing.title, href, "unresolvable detail link");
            return String::new();
        };

        let key = detail_url.to_string();
        if let Some(category) = cache.get(&key) {
            debug!(url = %key, "category cache hit");
            return category.clone();
        }

        let category = match self.fetch_text(&detail_url).await {
            Ok(body) => extract_category(&body).unwrap_or_default(),
            Err(e) => {
                warn!(url = %detail_url, error = %e, "category lookup failed");
                String::new()
            }
        };

        cache.insert(key, category.clone());
        category
    }

    /// Fetch a URL and return its body, failing on non-success status.
    async fn fetch_text(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| PricewatchError::fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PricewatchError::fetch(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| PricewatchError::fetch(format!("{url}: body read failed: {e}")))
    }
}
