//! libSQL storage layer for company records and the processing log.
//!
//! The [`Storage`] struct wraps a local libSQL database holding one row per
//! company website (keyed by URL, with its services and products) and an
//! append-only log of processing runs.
//!
//! **Access rules:**
//! - Pipeline runs: read-write via [`Storage::open`]; writes are serialized
//!   behind an async mutex so concurrent pipelines can share one handle
//! - Read-only CLI commands: [`Storage::open_readonly`]

mod migrations;
mod models;

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use libsql::{Connection, Database, params};
use tokio::sync::Mutex;
use uuid::Uuid;

use firmscope_shared::{FirmScopeError, ProcessingResult, Result, StructuredRecord};

pub use models::{CompanyDetails, CompanySummary, Count, ProcessingLogEntry, Statistics};

/// Columns selected for a [`CompanySummary`], in `row_to_company_summary` order.
const COMPANY_SUMMARY_SELECT: &str = "
    SELECT c.id, c.url, c.name, c.headline, c.industry, c.description, c.updated_at,
           (SELECT COUNT(*) FROM services s WHERE s.company_id = c.id),
           (SELECT COUNT(*) FROM products p WHERE p.company_id = c.id),
           (SELECT MAX(pr.timestamp) FROM processing_results pr WHERE pr.company_id = c.id)
    FROM companies c";

/// Columns selected for a [`ProcessingLogEntry`], in `row_to_log_entry` order.
const LOG_ENTRY_SELECT: &str = "
    SELECT pr.id, pr.url, pr.company_id, c.name, pr.success, pr.pages_crawled,
           pr.processing_time, pr.error_message, pr.crawl_summary, pr.timestamp
    FROM processing_results pr
    LEFT JOIN companies c ON pr.company_id = c.id";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| FirmScopeError::io(parent, e))?;
        }

        let storage = Self::connect(path, false).await?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FirmScopeError::Storage(format!(
                "database not found: {}",
                path.display()
            )));
        }
        Self::connect(path, true).await
    }

    async fn connect(path: &Path, readonly: bool) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly,
            write_lock: Mutex::new(()),
        })
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
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        FirmScopeError::Storage(format!(
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

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(FirmScopeError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Company writes
    // -----------------------------------------------------------------------

    /// Insert or update the company stored for `url` and replace its
    /// services and products. Returns the company id, which stays stable
    /// across upserts of the same URL.
    pub async fn upsert_company(&self, url: &str, record: &StructuredRecord) -> Result<String> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;

        let record_json =
            serde_json::to_string(record).map_err(|e| FirmScopeError::Storage(e.to_string()))?;
        let now = now();
        let info = &record.company_info;

        let tx = self.conn.transaction().await.map_err(db_err)?;

        let existing = {
            let mut rows = tx
                .query("SELECT id FROM companies WHERE url = ?1", params![url])
                .await
                .map_err(db_err)?;
            match rows.next().await.map_err(db_err)? {
                Some(row) => Some(row.get::<String>(0).map_err(db_err)?),
                None => None,
            }
        };

        let company_id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE companies SET
                       name = ?1, headline = ?2, description = ?3, company_type = ?4,
                       industry = ?5, sub_industry = ?6, solution_area = ?7,
                       business_model = ?8, headquarter = ?9, city = ?10,
                       founded_year = ?11, employee_count = ?12, active_customers = ?13,
                       available_countries = ?14, record_json = ?15, updated_at = ?16
                     WHERE id = ?17",
                    params![
                        info.name.as_deref(),
                        info.headline.as_deref(),
                        info.description.as_deref(),
                        info.company_type.as_deref(),
                        info.industry.as_deref(),
                        info.sub_industry.as_deref(),
                        info.solution_area.as_deref(),
                        info.business_model.as_deref(),
                        info.headquarter.as_deref(),
                        info.city.as_deref(),
                        info.founded_year.as_deref(),
                        info.employee_count.as_deref(),
                        info.active_customers.as_deref(),
                        info.available_countries.as_deref(),
                        record_json.as_str(),
                        now.as_str(),
                        id.as_str(),
                    ],
                )
                .await
                .map_err(db_err)?;

                tx.execute("DELETE FROM services WHERE company_id = ?1", params![id.as_str()])
                    .await
                    .map_err(db_err)?;
                tx.execute("DELETE FROM products WHERE company_id = ?1", params![id.as_str()])
                    .await
                    .map_err(db_err)?;
                id
            }
            None => {
                let id = Uuid::now_v7().to_string();
                tx.execute(
                    "INSERT INTO companies (
                       id, url, name, headline, description, company_type,
                       industry, sub_industry, solution_area, business_model,
                       headquarter, city, founded_year, employee_count,
                       active_customers, available_countries, record_json,
                       created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
                    params![
                        id.as_str(),
                        url,
                        info.name.as_deref(),
                        info.headline.as_deref(),
                        info.description.as_deref(),
                        info.company_type.as_deref(),
                        info.industry.as_deref(),
                        info.sub_industry.as_deref(),
                        info.solution_area.as_deref(),
                        info.business_model.as_deref(),
                        info.headquarter.as_deref(),
                        info.city.as_deref(),
                        info.founded_year.as_deref(),
                        info.employee_count.as_deref(),
                        info.active_customers.as_deref(),
                        info.available_countries.as_deref(),
                        record_json.as_str(),
                        now.as_str(),
                        now.as_str(),
                    ],
                )
                .await
                .map_err(db_err)?;
                id
            }
        };

        for (position, service) in record.services.iter().enumerate() {
            tx.execute(
                "INSERT INTO services (id, company_id, position, name, description)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::now_v7().to_string(),
                    company_id.as_str(),
                    position as i64,
                    service.name.as_deref(),
                    service.description.as_deref(),
                ],
            )
            .await
            .map_err(db_err)?;
        }

        for (position, product) in record.products.iter().enumerate() {
            let product_json = serde_json::to_string(product)
                .map_err(|e| FirmScopeError::Storage(e.to_string()))?;
            tx.execute(
                "INSERT INTO products (
                   id, company_id, position, name, headline, description,
                   industry, sub_industry, solution_area, record_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    Uuid::now_v7().to_string(),
                    company_id.as_str(),
                    position as i64,
                    product.name.as_deref(),
                    product.headline.as_deref(),
                    product.description.as_deref(),
                    product.industry.as_deref(),
                    product.sub_industry.as_deref(),
                    product.solution_area.as_deref(),
                    product_json.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        tracing::debug!(%url, company_id = %company_id, "company upserted");
        Ok(company_id)
    }

    /// Delete a company with its services, products and processing log.
    /// Returns whether a company row was removed.
    pub async fn delete_company(&self, company_id: &str) -> Result<bool> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;

        let tx = self.conn.transaction().await.map_err(db_err)?;
        for sql in [
            "DELETE FROM services WHERE company_id = ?1",
            "DELETE FROM products WHERE company_id = ?1",
            "DELETE FROM processing_results WHERE company_id = ?1",
        ] {
            tx.execute(sql, params![company_id]).await.map_err(db_err)?;
        }
        let removed = tx
            .execute("DELETE FROM companies WHERE id = ?1", params![company_id])
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        Ok(removed > 0)
    }

    // -----------------------------------------------------------------------
    // Processing log
    // -----------------------------------------------------------------------

    /// Append one processing run to the log. Returns the log entry id.
    pub async fn append_processing_result(
        &self,
        result: &ProcessingResult,
        company_id: Option<&str>,
    ) -> Result<String> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;

        let id = Uuid::now_v7().to_string();
        let summary_json = result
            .crawl_summary()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| FirmScopeError::Storage(e.to_string()))?;
        let validation_json = result
            .record()
            .and_then(|r| r.validation.as_ref())
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| FirmScopeError::Storage(e.to_string()))?;
        let timestamp = result
            .timestamp()
            .to_rfc3339_opts(SecondsFormat::Micros, true);

        self.conn
            .execute(
                "INSERT INTO processing_results (
                   id, company_id, url, success, pages_crawled, processing_time,
                   error_message, crawl_summary, validation, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id.as_str(),
                    company_id,
                    result.url(),
                    i64::from(result.is_success()),
                    result.pages_crawled() as i64,
                    result.processing_time_secs(),
                    result.error(),
                    summary_json.as_deref(),
                    validation_json.as_deref(),
                    timestamp.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;

        Ok(id)
    }

    /// Most recent processing runs, newest first.
    pub async fn get_processing_results(&self, limit: usize) -> Result<Vec<ProcessingLogEntry>> {
        let sql = format!("{LOG_ENTRY_SELECT} ORDER BY pr.timestamp DESC LIMIT ?1");
        let mut rows = self
            .conn
            .query(&sql, params![limit as i64])
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_log_entry(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Company reads
    // -----------------------------------------------------------------------

    /// All companies, most recently updated first.
    pub async fn list_companies(&self) -> Result<Vec<CompanySummary>> {
        let sql = format!("{COMPANY_SUMMARY_SELECT} ORDER BY c.updated_at DESC");
        self.query_companies(&sql, None).await
    }

    /// Companies whose name, industry, description or headline contains
    /// `query` (case-insensitive).
    pub async fn search_companies(&self, query: &str) -> Result<Vec<CompanySummary>> {
        let sql = format!(
            "{COMPANY_SUMMARY_SELECT}
             WHERE LOWER(COALESCE(c.name, '')) LIKE ?1
                OR LOWER(COALESCE(c.industry, '')) LIKE ?1
                OR LOWER(COALESCE(c.description, '')) LIKE ?1
                OR LOWER(COALESCE(c.headline, '')) LIKE ?1
             ORDER BY c.updated_at DESC"
        );
        let pattern = format!("%{}%", query.trim().to_lowercase());
        self.query_companies(&sql, Some(&pattern)).await
    }

    async fn query_companies(&self, sql: &str, arg: Option<&str>) -> Result<Vec<CompanySummary>> {
        let mut rows = match arg {
            Some(arg) => self.conn.query(sql, params![arg]).await,
            None => self.conn.query(sql, params![]).await,
        }
        .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_company_summary(&row)?);
        }
        Ok(results)
    }

    /// A company's stored record and its processing history.
    pub async fn get_company_details(&self, company_id: &str) -> Result<Option<CompanyDetails>> {
        let sql = format!("{COMPANY_SUMMARY_SELECT} WHERE c.id = ?1");
        let Some(company) = self
            .query_companies(&sql, Some(company_id))
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };

        let mut rows = self
            .conn
            .query(
                "SELECT record_json FROM companies WHERE id = ?1",
                params![company_id],
            )
            .await
            .map_err(db_err)?;
        let record = match rows.next().await.map_err(db_err)? {
            Some(row) => {
                let json: String = row.get(0).map_err(db_err)?;
                serde_json::from_str(&json).map_err(|e| FirmScopeError::Storage(e.to_string()))?
            }
            None => StructuredRecord::default(),
        };

        let sql =
            format!("{LOG_ENTRY_SELECT} WHERE pr.company_id = ?1 ORDER BY pr.timestamp DESC");
        let mut rows = self
            .conn
            .query(&sql, params![company_id])
            .await
            .map_err(db_err)?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_log_entry(&row)?);
        }

        Ok(Some(CompanyDetails {
            company,
            record,
            results,
        }))
    }

    // -----------------------------------------------------------------------
    // Statistics
    // -----------------------------------------------------------------------

    /// Counts, top-10 industries and per-day activity for the last 30 days.
    pub async fn statistics(&self) -> Result<Statistics> {
        let total_companies = self.count("SELECT COUNT(*) FROM companies").await?;
        let total_results = self.count("SELECT COUNT(*) FROM processing_results").await?;
        let successful_results = self
            .count("SELECT COUNT(*) FROM processing_results WHERE success = 1")
            .await?;

        let top_industries = self
            .counts(
                "SELECT industry, COUNT(*) AS n FROM companies
                 WHERE industry IS NOT NULL AND industry != ''
                 GROUP BY industry ORDER BY n DESC, industry ASC LIMIT 10",
                None,
            )
            .await?;

        let cutoff = (Utc::now() - chrono::Duration::days(30))
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        let recent_activity = self
            .counts(
                "SELECT substr(timestamp, 1, 10) AS day, COUNT(*) FROM processing_results
                 WHERE timestamp >= ?1
                 GROUP BY day ORDER BY day DESC",
                Some(&cutoff),
            )
            .await?;

        Ok(Statistics {
            total_companies,
            total_results,
            successful_results,
            failed_results: total_results.saturating_sub(successful_results),
            top_industries,
            recent_activity,
        })
    }

    async fn count(&self, sql: &str) -> Result<u64> {
        let mut rows = self.conn.query(sql, params![]).await.map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)?.max(0) as u64),
            None => Ok(0),
        }
    }

    async fn counts(&self, sql: &str, arg: Option<&str>) -> Result<Vec<Count>> {
        let mut rows = match arg {
            Some(arg) => self.conn.query(sql, params![arg]).await,
            None => self.conn.query(sql, params![]).await,
        }
        .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(Count {
                label: row.get::<String>(0).map_err(db_err)?,
                count: row.get::<i64>(1).map_err(db_err)?.max(0) as u64,
            });
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn db_err(e: libsql::Error) -> FirmScopeError {
    FirmScopeError::Storage(e.to_string())
}

/// Fixed-width UTC timestamp, so text ordering matches time ordering.
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_company_summary(row: &libsql::Row) -> Result<CompanySummary> {
    Ok(CompanySummary {
        id: row.get::<String>(0).map_err(db_err)?,
        url: row.get::<String>(1).map_err(db_err)?,
        name: row.get::<Option<String>>(2).map_err(db_err)?,
        headline: row.get::<Option<String>>(3).map_err(db_err)?,
        industry: row.get::<Option<String>>(4).map_err(db_err)?,
        description: row.get::<Option<String>>(5).map_err(db_err)?,
        updated_at: row.get::<String>(6).map_err(db_err)?,
        service_count: row.get::<i64>(7).map_err(db_err)?.max(0) as u64,
        product_count: row.get::<i64>(8).map_err(db_err)?.max(0) as u64,
        last_analyzed: row.get::<Option<String>>(9).map_err(db_err)?,
    })
}

fn row_to_log_entry(row: &libsql::Row) -> Result<ProcessingLogEntry> {
    let crawl_summary = row
        .get::<Option<String>>(8)
        .map_err(db_err)?
        .and_then(|json| serde_json::from_str(&json).ok());

    Ok(ProcessingLogEntry {
        id: row.get::<String>(0).map_err(db_err)?,
        url: row.get::<String>(1).map_err(db_err)?,
        company_id: row.get::<Option<String>>(2).map_err(db_err)?,
        company_name: row.get::<Option<String>>(3).map_err(db_err)?,
        success: row.get::<i64>(4).map_err(db_err)? != 0,
        pages_crawled: row.get::<i64>(5).map_err(db_err)?.max(0) as u64,
        processing_time_secs: row.get::<f64>(6).map_err(db_err)?,
        error: row.get::<Option<String>>(7).map_err(db_err)?,
        crawl_summary,
        timestamp: row.get::<String>(9).map_err(db_err)?,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use firmscope_shared::{CompanyInfo, CrawlSummary, Product, Service, ValidationReport};

    use super::*;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("fs_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn record(name: &str, industry: &str, services: usize) -> StructuredRecord {
        StructuredRecord {
            company_info: CompanyInfo {
                name: Some(name.into()),
                headline: Some(format!("{name} makes things")),
                industry: Some(industry.into()),
                ..CompanyInfo::default()
            },
            services: (0..services)
                .map(|i| Service {
                    name: Some(format!("Service {i}")),
                    description: None,
                })
                .collect(),
            products: vec![Product {
                name: Some("Ledger".into()),
                industry: Some(industry.into()),
                ..Product::default()
            }],
            validation: Some(ValidationReport::new()),
        }
    }

    fn success(url: &str, record: StructuredRecord) -> ProcessingResult {
        ProcessingResult::succeeded(
            url,
            record,
            CrawlSummary {
                total_pages: 3,
                ..CrawlSummary::default()
            },
            Duration::from_millis(2500),
        )
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("fs_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn upsert_keeps_id_and_replaces_children() {
        let storage = test_storage().await;
        let url = "https://acme.example";

        let first = storage
            .upsert_company(url, &record("Acme", "Finance", 2))
            .await
            .expect("insert");
        let second = storage
            .upsert_company(url, &record("Acme Corp", "Finance", 1))
            .await
            .expect("update");
        assert_eq!(first, second);

        let companies = storage.list_companies().await.expect("list");
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].name.as_deref(), Some("Acme Corp"));
        assert_eq!(companies[0].service_count, 1);
        assert_eq!(companies[0].product_count, 1);
    }

    #[tokio::test]
    async fn processing_log_joins_company_name() {
        let storage = test_storage().await;
        let url = "https://acme.example";
        let rec = record("Acme", "Finance", 1);
        let company_id = storage.upsert_company(url, &rec).await.unwrap();

        storage
            .append_processing_result(&success(url, rec), Some(&company_id))
            .await
            .unwrap();
        let failed = ProcessingResult::failed(
            "https://down.example",
            "Error processing https://down.example: empty content",
            None,
            Duration::from_millis(10),
        );
        storage.append_processing_result(&failed, None).await.unwrap();

        let log = storage.get_processing_results(10).await.unwrap();
        assert_eq!(log.len(), 2);
        // Newest first.
        assert_eq!(log[0].url, "https://down.example");
        assert!(!log[0].success);
        assert!(log[0].company_name.is_none());
        assert_eq!(log[1].company_name.as_deref(), Some("Acme"));
        assert_eq!(log[1].pages_crawled, 3);
        assert_eq!(log[1].crawl_summary.as_ref().map(|s| s.total_pages), Some(3));

        let limited = storage.get_processing_results(1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn company_details_roundtrip_record() {
        let storage = test_storage().await;
        let rec = record("Acme", "Finance", 2);
        let id = storage.upsert_company("https://acme.example", &rec).await.unwrap();
        storage
            .append_processing_result(&success("https://acme.example", rec.clone()), Some(&id))
            .await
            .unwrap();

        let details = storage
            .get_company_details(&id)
            .await
            .unwrap()
            .expect("company exists");
        assert_eq!(details.record, rec);
        assert_eq!(details.results.len(), 1);
        assert!(details.company.last_analyzed.is_some());

        assert!(storage.get_company_details("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_matches_name_industry_and_headline() {
        let storage = test_storage().await;
        storage
            .upsert_company("https://acme.example", &record("Acme", "Finance", 0))
            .await
            .unwrap();
        storage
            .upsert_company("https://medi.example", &record("Medi", "Healthcare", 0))
            .await
            .unwrap();

        assert_eq!(storage.search_companies("FINANCE").await.unwrap().len(), 1);
        assert_eq!(storage.search_companies("medi makes").await.unwrap().len(), 1);
        assert_eq!(storage.search_companies("e").await.unwrap().len(), 2);
        assert!(storage.search_companies("zzz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn statistics_counts() {
        let storage = test_storage().await;
        for (url, name, industry) in [
            ("https://a.example", "A", "Finance"),
            ("https://b.example", "B", "Finance"),
            ("https://c.example", "C", "Healthcare"),
        ] {
            let rec = record(name, industry, 0);
            let id = storage.upsert_company(url, &rec).await.unwrap();
            storage
                .append_processing_result(&success(url, rec), Some(&id))
                .await
                .unwrap();
        }
        let failed =
            ProcessingResult::failed("https://d.example", "boom", None, Duration::ZERO);
        storage.append_processing_result(&failed, None).await.unwrap();

        let stats = storage.statistics().await.unwrap();
        assert_eq!(stats.total_companies, 3);
        assert_eq!(stats.total_results, 4);
        assert_eq!(stats.successful_results, 3);
        assert_eq!(stats.failed_results, 1);
        assert_eq!(
            stats.top_industries[0],
            Count {
                label: "Finance".into(),
                count: 2
            }
        );
        assert_eq!(stats.recent_activity.len(), 1);
        assert_eq!(stats.recent_activity[0].count, 4);
    }

    #[tokio::test]
    async fn delete_company_removes_related_rows() {
        let storage = test_storage().await;
        let rec = record("Acme", "Finance", 2);
        let id = storage.upsert_company("https://acme.example", &rec).await.unwrap();
        storage
            .append_processing_result(&success("https://acme.example", rec), Some(&id))
            .await
            .unwrap();

        assert!(storage.delete_company(&id).await.unwrap());
        assert!(storage.list_companies().await.unwrap().is_empty());
        assert!(storage.get_processing_results(10).await.unwrap().is_empty());
        assert!(!storage.delete_company(&id).await.unwrap());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("fs_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.upsert_company("https://acme.example", &record("Acme", "Finance", 0))
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.list_companies().await.unwrap().len(), 1);
        let result = ro
            .upsert_company("https://other.example", &record("Other", "Finance", 0))
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }
}
