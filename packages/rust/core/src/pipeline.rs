//! Pipeline orchestration.
//!
//! Task graph per run:
//!
//! ```text
//!   scrape ──┬──> transform ──> load
//!   fetch_rate ┘
//! ```
//!
//! Scrape and rate fetch run concurrently; transform starts only after both
//! succeed. The fetched rate is staged in the store before the rate stage
//! reports success, so the transform stage can read it back and survive a
//! process that lost its in-memory value. Every stage runs under the
//! configured retry policy, and the run's outcome is recorded in the
//! `pipeline_runs` table.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use pricewatch_rates::RateClient;
use pricewatch_scraper::Scraper;
use pricewatch_shared::{AppConfig, ExchangeRate, LoadStrategy, PricewatchError};
use pricewatch_storage::Storage;
use pricewatch_transform::{resolve_rate, transform_batch};

use crate::retry::{RetryPolicy, Stage, StageFailure, run_stage};

/// Observer for stage progress, implemented by the CLI for terminal feedback.
pub trait ProgressReporter: Send + Sync {
    fn stage_started(&self, stage: Stage);
    fn stage_finished(&self, stage: Stage, detail: &str);
}

/// Reporter that does nothing. Default for non-interactive callers.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage, _detail: &str) {}
}

/// Summary of a completed run, also persisted as the run's stats JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub records_scraped: usize,
    pub rate: f64,
    pub records_transformed: usize,
    pub records_loaded: usize,
    pub strategy: LoadStrategy,
    pub elapsed_ms: u64,
}

/// Why a pipeline run did not complete.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failure before the task graph started (config, store open, run row).
    #[error(transparent)]
    Setup(#[from] PricewatchError),

    /// A stage exhausted its attempts.
    #[error(transparent)]
    Stage(#[from] StageFailure),
}

/// Counts produced by a successful task graph.
struct GraphOutcome {
    records_scraped: usize,
    rate: f64,
    records_transformed: usize,
    records_loaded: usize,
}

/// Execute one full pipeline run.
///
/// On success the run row is marked `completed` with the report as stats JSON;
/// on stage failure it is marked `failed` with the originating stage. Errors
/// while recording the outcome are logged, not propagated, so the caller
/// always sees the run's real result.
pub async fn run_pipeline(
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> std::result::Result<RunReport, PipelineError> {
    let started = Instant::now();
    let policy = RetryPolicy::from(&config.pipeline);

    let storage = Storage::open(Path::new(&config.database.path)).await?;
    let run_id = storage.insert_run().await?;
    info!(run_id, strategy = %config.load.strategy, "pipeline run started");

    match run_graph(config, &storage, policy, progress).await {
        Ok(outcome) => {
            let report = RunReport {
                run_id: run_id.clone(),
                records_scraped: outcome.records_scraped,
                rate: outcome.rate,
                records_transformed: outcome.records_transformed,
                records_loaded: outcome.records_loaded,
                strategy: config.load.strategy,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };

            let stats = serde_json::to_string(&report).unwrap_or_else(|_| "{}".into());
            if let Err(e) = storage.finish_run(&run_id, "completed", None, &stats).await {
                warn!(run_id, error = %e, "failed to record run completion");
            }

            info!(
                run_id,
                loaded = report.records_loaded,
                elapsed_ms = report.elapsed_ms,
                "pipeline run succeeded"
            );
            Ok(report)
        }
        Err(failure) => {
            let stats = serde_json::json!({ "error": failure.to_string() }).to_string();
            if let Err(e) = storage
                .finish_run(&run_id, "failed", Some(failure.stage.as_str()), &stats)
                .await
            {
                warn!(run_id, error = %e, "failed to record run failure");
            }
            Err(PipelineError::Stage(failure))
        }
    }
}

/// Run the four stages against an open store.
async fn run_graph(
    config: &AppConfig,
    storage: &Storage,
    policy: RetryPolicy,
    progress: &dyn ProgressReporter,
) -> std::result::Result<GraphOutcome, StageFailure> {
    progress.stage_started(Stage::Scrape);
    progress.stage_started(Stage::FetchRate);

    let scrape_fut = run_stage(Stage::Scrape, policy, || async {
        let records = Scraper::new(&config.scrape)?.scrape().await?;
        if records.is_empty() {
            return Err(PricewatchError::fetch("scrape produced no records"));
        }
        Ok(records)
    });

    let rate_fut = run_stage(Stage::FetchRate, policy, || async {
        let base = config.rates.base_currency.as_str();
        let target = config.rates.target_currency.as_str();
        let value = RateClient::new(&config.rates)?.fetch_rate(base, target).await?;
        // Stage the rate before reporting success so transform can read it back.
        storage
            .upsert_rate(&ExchangeRate::today(base, target, value))
            .await?;
        Ok(value)
    });

    let (scrape_result, rate_result) = tokio::join!(scrape_fut, rate_fut);
    let raws = scrape_result?;
    let transient_rate = rate_result?;

    progress.stage_finished(Stage::Scrape, &format!("{} records", raws.len()));
    progress.stage_finished(Stage::FetchRate, &format!("rate {transient_rate}"));

    // Raw sink is best-effort: a failure here never blocks the run.
    if let Err(e) = storage.load_raw(&raws).await {
        warn!(error = %e, "raw sink load failed");
    }

    progress.stage_started(Stage::Transform);
    let (rate, enriched) = run_stage(Stage::Transform, policy, || {
        let raws = raws.clone();
        async move {
            let stored = storage.latest_rate().await?.map(|r| r.rate);
            let rate = resolve_rate(stored, Some(transient_rate))?;
            let records = transform_batch(&raws, rate)?;
            Ok((rate, records))
        }
    })
    .await?;
    progress.stage_finished(Stage::Transform, &format!("{} records", enriched.len()));

    progress.stage_started(Stage::Load);
    let strategy = config.load.strategy;
    let loaded = run_stage(Stage::Load, policy, || async {
        match strategy {
            LoadStrategy::Replace => storage.load_replace(&enriched).await,
            LoadStrategy::Upsert => storage.load_upsert(&enriched).await,
        }
    })
    .await?;
    progress.stage_finished(Stage::Load, &format!("{loaded} rows ({strategy})"));

    Ok(GraphOutcome {
        records_scraped: raws.len(),
        rate,
        records_transformed: enriched.len(),
        records_loaded: loaded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricewatch_shared::{
        DatabaseConfig, LoadConfig, PipelineConfig, RatesConfig, ScrapeConfig,
    };
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn catalog_page(entries: &[(&str, &str)]) -> String {
        let pods: String = entries
            .iter()
            .map(|(title, price)| {
                format!(
                    r#"<article class="product_pod">
                        <h3><a href="book/index.html" title="{title}">{title}</a></h3>
                        <p class="price_color">{price}</p>
                        <p class="instock availability">In stock (8 available)</p>
                    </article>"#
                )
            })
            .collect();
        format!("<html><body>{pods}</body></html>")
    }

    const DETAIL_PAGE: &str = r#"<html><body><ul class="breadcrumb">
        <li><a href="/">Home</a></li>
        <li><a href="/books">Books</a></li>
        <li><a href="/books/poetry">Poetry</a></li>
    </ul></body></html>"#;

    fn test_config(catalog: &MockServer, rates: &MockServer, strategy: LoadStrategy) -> AppConfig {
        let db_path = std::env::temp_dir().join(format!("pw_run_{}.db", Uuid::now_v7()));
        AppConfig {
            database: DatabaseConfig {
                path: db_path.to_string_lossy().into_owned(),
            },
            scrape: ScrapeConfig {
                base_url: catalog.uri(),
                max_pages: 2,
                timeout_secs: 5,
            },
            rates: RatesConfig {
                api_url: format!("{}/latest", rates.uri()),
                base_currency: "GBP".into(),
                target_currency: "INR".into(),
                timeout_secs: 5,
            },
            load: LoadConfig { strategy },
            pipeline: PipelineConfig {
                max_attempts: 1,
                retry_delay_secs: 0,
                attempt_timeout_secs: 10,
            },
        }
    }

    async fn mount_catalog(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/catalogue/page-1.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(catalog_page(&[
                ("A Light in the Attic", "£51.77"),
                ("Starving Hysterical Naked", "£12.00"),
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/catalogue/page-2.html"))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/catalogue/book/index.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_PAGE))
            .mount(server)
            .await;
    }

    async fn mount_rate(server: &MockServer, rate: f64) {
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "rates": { "INR": rate }
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn full_run_scrapes_converts_and_loads() {
        let catalog = MockServer::start().await;
        let rates = MockServer::start().await;
        mount_catalog(&catalog).await;
        mount_rate(&rates, 105.50).await;

        let config = test_config(&catalog, &rates, LoadStrategy::Replace);
        let report = run_pipeline(&config, &SilentProgress)
            .await
            .expect("pipeline run");

        assert_eq!(report.records_scraped, 2);
        assert_eq!(report.rate, 105.50);
        assert_eq!(report.records_transformed, 2);
        assert_eq!(report.records_loaded, 2);

        let storage = Storage::open(Path::new(&config.database.path))
            .await
            .expect("reopen store");
        assert_eq!(storage.product_count().await.unwrap(), 2);
        assert_eq!(storage.raw_product_count().await.unwrap(), 2);

        let products = storage.list_products(10).await.unwrap();
        let light = products
            .iter()
            .find(|p| p.title == "A Light in the Attic")
            .expect("product present");
        assert_eq!(light.price_inr, 5461.74);
        assert_eq!(light.category, "Poetry");
        assert_eq!(light.stock_quantity, Some(8));

        // The fetched rate was staged for future runs.
        let staged = storage.latest_rate().await.unwrap().expect("rate staged");
        assert_eq!(staged.rate, 105.50);
    }

    #[tokio::test]
    async fn upsert_run_updates_existing_rows() {
        let catalog = MockServer::start().await;
        let rates = MockServer::start().await;
        mount_catalog(&catalog).await;
        mount_rate(&rates, 100.0).await;

        let config = test_config(&catalog, &rates, LoadStrategy::Upsert);
        run_pipeline(&config, &SilentProgress).await.expect("first run");
        run_pipeline(&config, &SilentProgress).await.expect("second run");

        let storage = Storage::open(Path::new(&config.database.path))
            .await
            .expect("reopen store");
        assert_eq!(storage.product_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rate_api_outage_fails_the_rate_stage() {
        let catalog = MockServer::start().await;
        let rates = MockServer::start().await;
        mount_catalog(&catalog).await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&rates)
            .await;

        let config = test_config(&catalog, &rates, LoadStrategy::Replace);
        let err = run_pipeline(&config, &SilentProgress)
            .await
            .expect_err("must fail");

        match err {
            PipelineError::Stage(failure) => {
                assert_eq!(failure.stage, Stage::FetchRate);
                assert_eq!(failure.attempts, 1);
            }
            other => panic!("unexpected error: {other}"),
        }

        // No products were loaded.
        let storage = Storage::open(Path::new(&config.database.path))
            .await
            .expect("reopen store");
        assert_eq!(storage.product_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_catalog_fails_the_scrape_stage() {
        let catalog = MockServer::start().await;
        let rates = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalogue/page-1.html"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&catalog)
            .await;
        mount_rate(&rates, 105.50).await;

        let config = test_config(&catalog, &rates, LoadStrategy::Replace);
        let err = run_pipeline(&config, &SilentProgress)
            .await
            .expect_err("must fail");

        match err {
            PipelineError::Stage(failure) => assert_eq!(failure.stage, Stage::Scrape),
            other => panic!("unexpected error: {other}"),
        }
    }
}
