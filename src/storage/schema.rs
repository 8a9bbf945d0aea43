//! Database schema definitions
//!
//! All SQL schema for the webx database lives here. Creation is
//! idempotent; `schema_meta.db_schema_version` records the version for
//! later additive migrations.

/// Current schema version recorded in `schema_meta`.
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Schema version and health metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Structured page snapshots; page_json holds the full serialized page
CREATE TABLE IF NOT EXISTS pages (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    canonical_url TEXT,
    title TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    content_hash TEXT,
    extractor_version TEXT NOT NULL,
    mode TEXT NOT NULL,
    source TEXT NOT NULL,
    page_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(url);
CREATE INDEX IF NOT EXISTS idx_pages_fetched_at ON pages(fetched_at DESC);

-- Outgoing links per page snapshot
CREATE TABLE IF NOT EXISTS links (
    from_page_id TEXT NOT NULL REFERENCES pages(id),
    to_url TEXT NOT NULL,
    text TEXT NOT NULL,
    rel TEXT,
    is_internal INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (from_page_id, to_url)
);

-- Crawl jobs with their seed and option snapshots
CREATE TABLE IF NOT EXISTS crawl_jobs (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    seed_url_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    finished_at TEXT,
    options_json TEXT NOT NULL
);

-- Per-job fetch queue
CREATE TABLE IF NOT EXISTS crawl_queue (
    id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL REFERENCES crawl_jobs(id),
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    priority INTEGER NOT NULL,
    next_fetch_at INTEGER NOT NULL,
    domain TEXT NOT NULL,
    status TEXT NOT NULL,
    retries INTEGER NOT NULL DEFAULT 0,
    last_error TEXT
);

CREATE INDEX IF NOT EXISTS idx_crawl_queue_claim ON crawl_queue(job_id, status, next_fetch_at);
CREATE UNIQUE INDEX IF NOT EXISTS idx_crawl_queue_job_url ON crawl_queue(job_id, url);

-- Browser session metadata (owned by the browser collaborator)
CREATE TABLE IF NOT EXISTS sessions (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    storage_state_path TEXT NOT NULL,
    notes TEXT,
    headed INTEGER NOT NULL DEFAULT 0
);

-- Log of executed actions
CREATE TABLE IF NOT EXISTS actions_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_name TEXT NOT NULL,
    url TEXT NOT NULL,
    action_json TEXT NOT NULL,
    result_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// Initializes the database schema and records the schema version.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT INTO schema_meta (key, value) VALUES ('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}
