//! SQL migration definitions for the Pricewatch database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: staging_exchange_rates, products, raw_products, pipeline_runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Staging table for fetched exchange rates; one row per run-day, read back
-- by the transform stage instead of relying on transient inter-task state
CREATE TABLE IF NOT EXISTS staging_exchange_rates (
    as_of_date      TEXT NOT NULL,
    base_currency   TEXT NOT NULL,
    target_currency TEXT NOT NULL,
    exchange_rate   REAL NOT NULL,
    fetched_at      TEXT NOT NULL,
    UNIQUE(as_of_date, base_currency, target_currency)
);

CREATE INDEX IF NOT EXISTS idx_staging_rates_date ON staging_exchange_rates(as_of_date);

-- Enriched products, keyed by the stable identity hash
CREATE TABLE IF NOT EXISTS products (
    product_id          TEXT PRIMARY KEY,
    title               TEXT NOT NULL,
    price_gbp           REAL NOT NULL,
    price_inr           REAL NOT NULL,
    category            TEXT NOT NULL,
    availability_status TEXT NOT NULL,
    stock_quantity      INTEGER,
    price_tier          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_category ON products(category);
CREATE INDEX IF NOT EXISTS idx_products_price_tier ON products(price_tier);

-- Untransformed listings, kept as a debugging sink
CREATE TABLE IF NOT EXISTS raw_products (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    title        TEXT,
    price_gbp    TEXT,
    category     TEXT,
    availability TEXT,
    scraped_at   TEXT NOT NULL
);

-- Pipeline run history
CREATE TABLE IF NOT EXISTS pipeline_runs (
    id           TEXT PRIMARY KEY,
    started_at   TEXT NOT NULL,
    finished_at  TEXT,
    status       TEXT NOT NULL,
    failed_stage TEXT,
    stats_json   TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
