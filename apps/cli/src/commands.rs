//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use pricewatch_core::{ProgressReporter, Stage, run_pipeline};
use pricewatch_rates::RateClient;
use pricewatch_shared::{
    AppConfig, ExchangeRate, LoadStrategy, init_config, load_config, load_config_from,
};
use pricewatch_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Pricewatch — scrape, enrich, and store catalog prices.
#[derive(Parser)]
#[command(
    name = "pricewatch",
    version,
    about = "Scrape catalog listings, convert prices, and load them into a local store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a config file (defaults to ~/.pricewatch/pricewatch.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full scrape/convert/load pipeline once.
    Run {
        /// Maximum catalog pages to scrape (overrides config).
        #[arg(long)]
        max_pages: Option<u32>,

        /// Load strategy: replace or upsert (overrides config).
        #[arg(long)]
        strategy: Option<LoadStrategy>,

        /// Database file path (overrides config).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Fetch the current exchange rate and stage it in the store.
    Rate,

    /// List products from the store.
    Products {
        /// Maximum number of rows to print.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pricewatch=info",
        1 => "pricewatch=debug",
        _ => "pricewatch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            max_pages,
            strategy,
            db,
        } => cmd_run(config, max_pages, strategy, db).await,
        Command::Rate => cmd_rate(config).await,
        Command::Products { limit } => cmd_products(config, limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

/// Load config from the explicit path if given, otherwise the default location.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    mut config: AppConfig,
    max_pages: Option<u32>,
    strategy: Option<LoadStrategy>,
    db: Option<PathBuf>,
) -> Result<()> {
    // CLI flags win over config file values.
    if let Some(pages) = max_pages {
        config.scrape.max_pages = pages;
    }
    if let Some(strategy) = strategy {
        config.load.strategy = strategy;
    }
    if let Some(db) = db {
        config.database.path = db.to_string_lossy().into_owned();
    }

    info!(
        base_url = %config.scrape.base_url,
        max_pages = config.scrape.max_pages,
        strategy = %config.load.strategy,
        "starting pipeline run"
    );

    let reporter = CliProgress::new();
    let result = run_pipeline(&config, &reporter).await;
    reporter.finish();

    let report = result?;

    println!();
    println!("  Pipeline run complete!");
    println!("  Run ID:      {}", report.run_id);
    println!("  Scraped:     {} records", report.records_scraped);
    println!("  Rate:        {} {}/{}",
        report.rate, config.rates.target_currency, config.rates.base_currency);
    println!("  Transformed: {} records", report.records_transformed);
    println!("  Loaded:      {} rows ({})", report.records_loaded, report.strategy);
    println!("  Time:        {:.1}s", report.elapsed_ms as f64 / 1000.0);
    println!();

    Ok(())
}

async fn cmd_rate(config: AppConfig) -> Result<()> {
    let base = config.rates.base_currency.as_str();
    let target = config.rates.target_currency.as_str();

    let rate = RateClient::new(&config.rates)?.fetch_rate(base, target).await?;

    let storage = Storage::open(Path::new(&config.database.path)).await?;
    storage
        .upsert_rate(&ExchangeRate::today(base, target, rate))
        .await?;

    println!("1 {base} = {rate} {target} (staged)");
    Ok(())
}

async fn cmd_products(config: AppConfig, limit: u32) -> Result<()> {
    let storage = Storage::open(Path::new(&config.database.path)).await?;

    let total = storage.product_count().await?;
    let products = storage.list_products(limit).await?;

    if products.is_empty() {
        println!("No products in store. Run `pricewatch run` first.");
        return Ok(());
    }

    println!("{total} product(s) in store, showing {}:", products.len());
    println!();
    for p in products {
        let quantity = p
            .stock_quantity
            .map(|q| q.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  £{:<8.2} ₹{:<12.2} {:<9} {:<12} qty {:<4} {}",
            p.price_gbp, p.price_inr, p.price_tier, p.availability_status, quantity, p.title
        );
    }

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config file created at {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: Stage) {
        self.spinner.set_message(format!("Running {stage}..."));
    }

    fn stage_finished(&self, stage: Stage, detail: &str) {
        self.spinner.println(format!("  {stage}: {detail}"));
    }
}
