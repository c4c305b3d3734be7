//! SQL migration definitions for the FirmScope database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements.

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
        description: "Initial schema: companies, services, products, processing_results",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per company website, keyed by URL
CREATE TABLE IF NOT EXISTS companies (
    id                  TEXT PRIMARY KEY,
    url                 TEXT NOT NULL UNIQUE,
    name                TEXT,
    headline            TEXT,
    description         TEXT,
    company_type        TEXT,
    industry            TEXT,
    sub_industry        TEXT,
    solution_area       TEXT,
    business_model      TEXT,
    headquarter         TEXT,
    city                TEXT,
    founded_year        TEXT,
    employee_count      TEXT,
    active_customers    TEXT,
    available_countries TEXT,
    record_json         TEXT NOT NULL,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_companies_name ON companies(name);

CREATE TABLE IF NOT EXISTS services (
    id          TEXT PRIMARY KEY,
    company_id  TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    position    INTEGER NOT NULL,
    name        TEXT,
    description TEXT
);

CREATE INDEX IF NOT EXISTS idx_services_company_id ON services(company_id);

CREATE TABLE IF NOT EXISTS products (
    id            TEXT PRIMARY KEY,
    company_id    TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    position      INTEGER NOT NULL,
    name          TEXT,
    headline      TEXT,
    description   TEXT,
    industry      TEXT,
    sub_industry  TEXT,
    solution_area TEXT,
    record_json   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_company_id ON products(company_id);

-- Append-only processing log
CREATE TABLE IF NOT EXISTS processing_results (
    id              TEXT PRIMARY KEY,
    company_id      TEXT REFERENCES companies(id) ON DELETE SET NULL,
    url             TEXT NOT NULL,
    success         INTEGER NOT NULL,
    pages_crawled   INTEGER NOT NULL,
    processing_time REAL NOT NULL,
    error_message   TEXT,
    crawl_summary   TEXT,
    validation      TEXT,
    timestamp       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_processing_results_url ON processing_results(url);
CREATE INDEX IF NOT EXISTS idx_processing_results_timestamp ON processing_results(timestamp);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
