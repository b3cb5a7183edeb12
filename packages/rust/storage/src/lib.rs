//! libSQL storage layer for Pricewatch.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the exchange
//! rate staging table, the enriched `products` table, the `raw_products`
//! debugging sink, and pipeline run history.
//!
//! Each call performs its unit of work against a single connection;
//! `load_replace` and `load_raw` run inside one transaction (old set or new
//! set visible, never a partial table), while `load_upsert` is row-at-a-time
//! by design and reports how many rows were committed before a failure.

mod migrations;

use std::path::Path;

use chrono::{NaiveDate, Utc};
use libsql::{Connection, Database, params};
use uuid::Uuid;

use pricewatch_shared::{
    AvailabilityStatus, EnrichedRecord, ExchangeRate, PricewatchError, PriceTier, RawRecord,
    Result,
};

const INSERT_PRODUCT_SQL: &str = "INSERT INTO products (
    product_id, title, price_gbp, price_inr, category,
    availability_status, stock_quantity, price_tier, updated_at
 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

const UPSERT_PRODUCT_SQL: &str = "INSERT INTO products (
    product_id, title, price_gbp, price_inr, category,
    availability_status, stock_quantity, price_tier, updated_at
 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
 ON CONFLICT(product_id) DO UPDATE SET
   title = excluded.title,
   price_gbp = excluded.price_gbp,
   price_inr = excluded.price_inr,
   category = excluded.category,
   availability_status = excluded.availability_status,
   stock_quantity = excluded.stock_quantity,
   price_tier = excluded.price_tier,
   updated_at = excluded.updated_at";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

/// Map a storage-layer failure outside the load path.
fn store_err(e: impl std::fmt::Display) -> PricewatchError {
    PricewatchError::StoreUnavailable(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| PricewatchError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(store_err)?;

        let conn = db.connect().map_err(store_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    PricewatchError::StoreUnavailable(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Rate store
    // -----------------------------------------------------------------------

    /// Idempotent upsert keyed by `(as_of_date, base, target)`.
    ///
    /// On conflict the rate is overwritten and `fetched_at` refreshed, so
    /// re-fetching the same day leaves exactly one row for that key.
    pub async fn upsert_rate(&self, rate: &ExchangeRate) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO staging_exchange_rates
                   (as_of_date, base_currency, target_currency, exchange_rate, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(as_of_date, base_currency, target_currency) DO UPDATE SET
                   exchange_rate = excluded.exchange_rate,
                   fetched_at = excluded.fetched_at",
                params![
                    rate.as_of_date.to_string(),
                    rate.base_currency.as_str(),
                    rate.target_currency.as_str(),
                    rate.rate,
                    rate.fetched_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(store_err)?;
        Ok(())
    }

    /// The staged rate with the most recent `as_of_date`, if any.
    pub async fn latest_rate(&self) -> Result<Option<ExchangeRate>> {
        let mut rows = self
            .conn
            .query(
                "SELECT as_of_date, base_currency, target_currency, exchange_rate, fetched_at
                 FROM staging_exchange_rates
                 ORDER BY as_of_date DESC
                 LIMIT 1",
                params![],
            )
            .await
            .map_err(store_err)?;

        match rows.next().await {
            Ok(Some(row)) => {
                let as_of: String = row.get(0).map_err(store_err)?;
                let fetched: String = row.get(4).map_err(store_err)?;
                Ok(Some(ExchangeRate {
                    as_of_date: NaiveDate::parse_from_str(&as_of, "%Y-%m-%d")
                        .map_err(|e| store_err(format!("invalid as_of_date {as_of:?}: {e}")))?,
                    base_currency: row.get(1).map_err(store_err)?,
                    target_currency: row.get(2).map_err(store_err)?,
                    rate: row.get(3).map_err(store_err)?,
                    fetched_at: chrono::DateTime::parse_from_rfc3339(&fetched)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|e| store_err(format!("invalid fetched_at: {e}")))?,
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(store_err(e)),
        }
    }

    // -----------------------------------------------------------------------
    // Loader
    // -----------------------------------------------------------------------

    /// Full-refresh load: clear `products` and insert the batch, atomically.
    ///
    /// Readers outside the transaction see either the old full set or the new
    /// full set. On any failure the transaction rolls back and the prior data
    /// stays intact.
    pub async fn load_replace(&self, records: &[EnrichedRecord]) -> Result<usize> {
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| PricewatchError::load(e.to_string(), 0))?;

        let result = async {
            tx.execute("DELETE FROM products", params![]).await?;
            let now = Utc::now().to_rfc3339();
            for record in records {
                tx.execute(INSERT_PRODUCT_SQL, product_params(record, &now))
                    .await?;
            }
            Ok::<_, libsql::Error>(())
        }
        .await;

        if let Err(e) = result {
            let _ = tx.rollback().await;
            return Err(PricewatchError::load(e.to_string(), 0));
        }

        tx.commit()
            .await
            .map_err(|e| PricewatchError::load(e.to_string(), 0))?;

        tracing::info!(rows = records.len(), "loaded products (replace)");
        Ok(records.len())
    }

    /// Per-row upsert keyed by `product_id`.
    ///
    /// Row-at-a-time by design: a mid-batch failure leaves the committed
    /// prefix applied and reports its size. Safe to retry, since upserts are
    /// idempotent by key.
    pub async fn load_upsert(&self, records: &[EnrichedRecord]) -> Result<usize> {
        let now = Utc::now().to_rfc3339();

        for (committed, record) in records.iter().enumerate() {
            self.conn
                .execute(UPSERT_PRODUCT_SQL, product_params(record, &now))
                .await
                .map_err(|e| PricewatchError::load(e.to_string(), committed))?;
        }

        tracing::info!(rows = records.len(), "loaded products (upsert)");
        Ok(records.len())
    }

    /// Debugging sink: replace the `raw_products` table with this batch.
    ///
    /// Callers on the primary load path must treat a failure here as
    /// non-blocking.
    pub async fn load_raw(&self, records: &[RawRecord]) -> Result<usize> {
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| PricewatchError::load(e.to_string(), 0))?;

        let result = async {
            tx.execute("DELETE FROM raw_products", params![]).await?;
            let now = Utc::now().to_rfc3339();
            for record in records {
                tx.execute(
                    "INSERT INTO raw_products (title, price_gbp, category, availability, scraped_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        record.title.as_str(),
                        record.price_gbp.as_str(),
                        record.category.as_str(),
                        record.availability.as_str(),
                        now.as_str(),
                    ],
                )
                .await?;
            }
            Ok::<_, libsql::Error>(())
        }
        .await;

        if let Err(e) = result {
            let _ = tx.rollback().await;
            return Err(PricewatchError::load(e.to_string(), 0));
        }

        tx.commit()
            .await
            .map_err(|e| PricewatchError::load(e.to_string(), 0))?;

        tracing::info!(rows = records.len(), "loaded raw products");
        Ok(records.len())
    }

    // -----------------------------------------------------------------------
    // Pipeline run history
    // -----------------------------------------------------------------------

    /// Insert a new pipeline run row. Returns the generated run ID.
    pub async fn insert_run(&self) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO pipeline_runs (id, started_at, status) VALUES (?1, ?2, 'running')",
                params![id.as_str(), now.as_str()],
            )
            .await
            .map_err(store_err)?;
        Ok(id)
    }

    /// Mark a run finished with its final status and stats.
    pub async fn finish_run(
        &self,
        run_id: &str,
        status: &str,
        failed_stage: Option<&str>,
        stats_json: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE pipeline_runs
                 SET finished_at = ?1, status = ?2, failed_stage = ?3, stats_json = ?4
                 WHERE id = ?5",
                params![now.as_str(), status, failed_stage, stats_json, run_id],
            )
            .await
            .map_err(store_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read-back helpers
    // -----------------------------------------------------------------------

    /// Number of rows currently in `products`.
    pub async fn product_count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM products", params![])
            .await
            .map_err(store_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map_err(store_err)? as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(store_err(e)),
        }
    }

    /// List loaded products ordered by title.
    pub async fn list_products(&self, limit: u32) -> Result<Vec<EnrichedRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT product_id, title, price_gbp, price_inr, category,
                        availability_status, stock_quantity, price_tier
                 FROM products ORDER BY title LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(store_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_product(&row)?);
        }
        Ok(results)
    }

    /// Number of rows currently in `raw_products`.
    pub async fn raw_product_count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM raw_products", params![])
            .await
            .map_err(store_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map_err(store_err)? as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(store_err(e)),
        }
    }
}

/// Bind parameters for a product insert/upsert.
fn product_params(record: &EnrichedRecord, now: &str) -> impl libsql::params::IntoParams {
    params![
        record.product_id.as_str(),
        record.title.as_str(),
        record.price_gbp,
        record.price_inr,
        record.category.as_str(),
        record.availability_status.as_str(),
        record.stock_quantity.map(i64::from),
        record.price_tier.as_str(),
        now,
    ]
}

/// Convert a database row back into an [`EnrichedRecord`].
fn row_to_product(row: &libsql::Row) -> Result<EnrichedRecord> {
    let status: String = row.get(5).map_err(store_err)?;
    let tier: String = row.get(7).map_err(store_err)?;

    Ok(EnrichedRecord {
        product_id: row.get(0).map_err(store_err)?,
        title: row.get(1).map_err(store_err)?,
        price_gbp: row.get(2).map_err(store_err)?,
        price_inr: row.get(3).map_err(store_err)?,
        category: row.get(4).map_err(store_err)?,
        availability_status: AvailabilityStatus::from_label(&status),
        stock_quantity: row.get::<Option<i64>>(6).map_err(store_err)?.map(|q| q as u32),
        price_tier: PriceTier::from_label(&tier)
            .ok_or_else(|| store_err(format!("unknown price tier {tier:?}")))?,
    })
}
