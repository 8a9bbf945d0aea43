//! SQLite store implementation
//!
//! One `Store` wraps one rusqlite connection. Writes are short statements
//! or small transactions; WAL journaling lets concurrent readers proceed.

use crate::config::CrawlOptions;
use crate::extract::Page;
use crate::ids::sha256_16;
use crate::storage::{
    initialize_schema, ActionLogRecord, CrawlJobRecord, CrawlJobStatus, JobStatus,
    QueueItemRecord, QueueItemStatus, QueueStats, SearchHit, SessionRecord,
    DEFAULT_RETRY_DELAY_MS, MAX_ITEM_RETRIES,
};
use crate::{Result, WebxError};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;

/// Durable storage backend for pages, jobs, queues, and sessions.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (or creates) the database at `path` and runs migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Creates an in-memory database, used by tests and collaborators
    /// that want throwaway state.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Idempotent schema creation; records `db_schema_version`.
    pub fn migrate(&self) -> Result<()> {
        initialize_schema(&self.conn)?;
        Ok(())
    }

    // ===== Schema metadata =====

    pub fn set_meta(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO schema_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM schema_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Stamps `last_success_{op}` with the current time.
    pub fn record_last_success(&mut self, op: &str) -> Result<()> {
        let key = format!("last_success_{}", op);
        let now = Utc::now().to_rfc3339();
        self.set_meta(&key, &now)
    }

    // ===== Pages and links =====

    /// Upserts a page and its link set in one transaction.
    pub fn save_page(&mut self, page: &Page) -> Result<()> {
        let page_json = serde_json::to_string(page)?;
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT OR REPLACE INTO pages
             (id, url, canonical_url, title, fetched_at, content_hash, extractor_version, mode, source, page_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                page.id,
                page.url,
                page.canonical_url,
                page.title,
                page.fetched_at,
                page.content_hash,
                page.extractor_version,
                page.mode.to_db_string(),
                page.source.to_db_string(),
                page_json,
            ],
        )?;

        for link in &page.links {
            tx.execute(
                "INSERT OR REPLACE INTO links (from_page_id, to_url, text, rel, is_internal)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![page.id, link.url, link.text, link.rel, link.is_internal as i64],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get_page_by_id(&self, id: &str) -> Result<Option<Page>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT page_json FROM pages WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        parse_page(json)
    }

    /// The most recently fetched page snapshot for a URL.
    pub fn get_latest_page_by_url(&self, url: &str) -> Result<Option<Page>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT page_json FROM pages WHERE url = ?1 ORDER BY fetched_at DESC LIMIT 1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        parse_page(json)
    }

    /// Substring search over titles and full page JSON, newest first.
    ///
    /// The score decays linearly with rank: `max(0, 1 - 0.05 * rank)`.
    pub fn query_pages(&self, text: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let pattern = format!("%{}%", text);
        let mut stmt = self.conn.prepare(
            "SELECT page_json FROM pages WHERE title LIKE ?1 OR page_json LIKE ?1
             ORDER BY fetched_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, limit as i64], |row| {
            row.get::<_, String>(0)
        })?;

        let mut hits = Vec::new();
        for (rank, row) in rows.enumerate() {
            let page: Page = serde_json::from_str(&row?)?;
            let score = (1.0 - 0.05 * rank as f64).max(0.0);
            hits.push(SearchHit { page, score });
        }
        Ok(hits)
    }

    // ===== Crawl jobs =====

    /// Creates a crawl job in `pending` state and returns its id.
    pub fn create_crawl_job(
        &mut self,
        seed_urls: &[String],
        options: &CrawlOptions,
    ) -> Result<String> {
        let now = Utc::now().to_rfc3339();
        let id = sha256_16(&format!("{}:{}", seed_urls.join("|"), now));

        self.conn.execute(
            "INSERT INTO crawl_jobs (id, status, seed_url_json, created_at, options_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                JobStatus::Pending.to_db_string(),
                serde_json::to_string(seed_urls)?,
                now,
                serde_json::to_string(options)?,
            ],
        )?;
        Ok(id)
    }

    pub fn get_crawl_job(&self, id: &str) -> Result<Option<CrawlJobRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, status, seed_url_json, created_at, finished_at, options_json
             FROM crawl_jobs WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .optional()?;

        match row {
            Some((id, status, seeds, created_at, finished_at, options)) => {
                Ok(Some(CrawlJobRecord {
                    id,
                    status: JobStatus::from_db_string(&status).unwrap_or(JobStatus::Failed),
                    seed_urls: serde_json::from_str(&seeds)?,
                    options: serde_json::from_str(&options)?,
                    created_at,
                    finished_at,
                }))
            }
            None => Ok(None),
        }
    }

    /// Updates a job's status, stamping `finished_at` on terminal states.
    pub fn set_crawl_job_status(&mut self, id: &str, status: JobStatus) -> Result<()> {
        if status.is_terminal() {
            let now = Utc::now().to_rfc3339();
            self.conn.execute(
                "UPDATE crawl_jobs SET status = ?1, finished_at = ?2 WHERE id = ?3",
                params![status.to_db_string(), now, id],
            )?;
        } else {
            self.conn.execute(
                "UPDATE crawl_jobs SET status = ?1 WHERE id = ?2",
                params![status.to_db_string(), id],
            )?;
        }
        Ok(())
    }

    /// Jobs the worker should tick, oldest first.
    pub fn list_active_crawl_jobs(&self) -> Result<Vec<CrawlJobRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM crawl_jobs WHERE status IN ('pending', 'running')
             ORDER BY created_at ASC",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut jobs = Vec::new();
        for id in ids {
            if let Some(job) = self.get_crawl_job(&id)? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    /// Job status with aggregated queue counts; errors on unknown jobs.
    pub fn get_crawl_job_status(&self, id: &str) -> Result<CrawlJobStatus> {
        let job = self
            .get_crawl_job(id)?
            .ok_or_else(|| WebxError::UnknownJob(id.to_string()))?;

        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM crawl_queue WHERE job_id = ?1 GROUP BY status",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = QueueStats::default();
        for row in rows {
            let (status, count) = row?;
            match QueueItemStatus::from_db_string(&status) {
                Some(QueueItemStatus::Pending) => stats.pending = count as u64,
                Some(QueueItemStatus::Processing) => stats.processing = count as u64,
                Some(QueueItemStatus::Done) => stats.done = count as u64,
                Some(QueueItemStatus::Failed) => stats.failed = count as u64,
                None => {}
            }
        }

        Ok(CrawlJobStatus {
            id: job.id,
            status: job.status,
            created_at: job.created_at,
            finished_at: job.finished_at,
            stats,
        })
    }

    // ===== Crawl queue =====

    /// Enqueues a URL for a job. Re-enqueueing the same `(job, url)` pair
    /// is a no-op; the unique index makes insert-or-ignore the success
    /// path.
    pub fn enqueue_url(&mut self, job_id: &str, url: &str, depth: u32, priority: i32) -> Result<()> {
        let id = sha256_16(&format!("{}:{}", job_id, url));
        let domain = crate::url::host_of(url).unwrap_or_default();
        let now_ms = Utc::now().timestamp_millis();

        self.conn.execute(
            "INSERT OR IGNORE INTO crawl_queue
             (id, job_id, url, depth, priority, next_fetch_at, domain, status, retries)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
            params![
                id,
                job_id,
                url,
                depth,
                priority,
                now_ms,
                domain,
                QueueItemStatus::Pending.to_db_string(),
            ],
        )?;
        Ok(())
    }

    /// Claims the next eligible queue item for a job
    ///
    /// Selects one `pending` row whose `next_fetch_at` has passed,
    /// ordered by `priority DESC, depth ASC, next_fetch_at ASC` (rowid
    /// breaks remaining ties), and flips it to `processing`. Selection
    /// and update run in one immediate transaction, so two claimers on
    /// the same store never receive the same row.
    pub fn claim_next_queue_item(&mut self, job_id: &str) -> Result<Option<QueueItemRecord>> {
        let now_ms = Utc::now().timestamp_millis();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let item = tx
            .query_row(
                "SELECT id, job_id, url, depth, priority, next_fetch_at, domain, status, retries, last_error
                 FROM crawl_queue
                 WHERE job_id = ?1 AND status = 'pending' AND next_fetch_at <= ?2
                 ORDER BY priority DESC, depth ASC, next_fetch_at ASC, rowid ASC
                 LIMIT 1",
                params![job_id, now_ms],
                map_queue_row,
            )
            .optional()?;

        let item = match item {
            Some(mut item) => {
                tx.execute(
                    "UPDATE crawl_queue SET status = 'processing' WHERE id = ?1",
                    params![item.id],
                )?;
                item.status = QueueItemStatus::Processing;
                Some(item)
            }
            None => None,
        };

        tx.commit()?;
        Ok(item)
    }

    /// Marks a processing item as done.
    pub fn complete_queue_item(&mut self, id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE crawl_queue SET status = 'done' WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Records a failure with the default linear backoff.
    pub fn fail_queue_item(&mut self, id: &str, error: &str) -> Result<()> {
        self.fail_queue_item_with_delay(id, error, DEFAULT_RETRY_DELAY_MS)
    }

    /// Records a failure; the item retries with linear backoff until its
    /// third failure, after which it is marked failed for good.
    pub fn fail_queue_item_with_delay(
        &mut self,
        id: &str,
        error: &str,
        retry_delay_ms: i64,
    ) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let retries: Option<u32> = tx
            .query_row(
                "SELECT retries FROM crawl_queue WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(retries) = retries else {
            tx.commit()?;
            return Ok(());
        };

        let retries = retries + 1;
        if retries >= MAX_ITEM_RETRIES {
            tx.execute(
                "UPDATE crawl_queue SET status = 'failed', retries = ?1, last_error = ?2 WHERE id = ?3",
                params![retries, error, id],
            )?;
        } else {
            let next_fetch_at = Utc::now().timestamp_millis() + retries as i64 * retry_delay_ms;
            tx.execute(
                "UPDATE crawl_queue SET status = 'pending', retries = ?1, last_error = ?2, next_fetch_at = ?3
                 WHERE id = ?4",
                params![retries, error, next_fetch_at, id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Pages fetched by a job's completed queue items, newest first.
    pub fn get_crawl_pages(&self, job_id: &str, limit: usize) -> Result<Vec<Page>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.page_json FROM crawl_queue q
             JOIN pages p ON p.url = q.url
             WHERE q.job_id = ?1 AND q.status = 'done'
             ORDER BY p.fetched_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![job_id, limit as i64], |row| {
            row.get::<_, String>(0)
        })?;

        let mut pages = Vec::new();
        for row in rows {
            pages.push(serde_json::from_str(&row?)?);
        }
        Ok(pages)
    }

    // ===== Sessions and action log (browser collaborator boundary) =====

    pub fn upsert_session(
        &mut self,
        name: &str,
        storage_state_path: &str,
        notes: Option<&str>,
        headed: bool,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO sessions (name, created_at, updated_at, storage_state_path, notes, headed)
             VALUES (?1, ?2, ?2, ?3, ?4, ?5)
             ON CONFLICT(name) DO UPDATE SET
                updated_at = excluded.updated_at,
                storage_state_path = excluded.storage_state_path,
                notes = excluded.notes,
                headed = excluded.headed",
            params![name, now, storage_state_path, notes, headed as i64],
        )?;
        Ok(())
    }

    pub fn get_session(&self, name: &str) -> Result<Option<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, created_at, updated_at, storage_state_path, notes, headed
             FROM sessions WHERE name = ?1",
        )?;
        let session = stmt
            .query_row(params![name], |row| {
                Ok(SessionRecord {
                    name: row.get(0)?,
                    created_at: row.get(1)?,
                    updated_at: row.get(2)?,
                    storage_state_path: row.get(3)?,
                    notes: row.get(4)?,
                    headed: row.get::<_, i64>(5)? != 0,
                })
            })
            .optional()?;
        Ok(session)
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, created_at, updated_at, storage_state_path, notes, headed
             FROM sessions ORDER BY name ASC",
        )?;
        let sessions = stmt
            .query_map([], |row| {
                Ok(SessionRecord {
                    name: row.get(0)?,
                    created_at: row.get(1)?,
                    updated_at: row.get(2)?,
                    storage_state_path: row.get(3)?,
                    notes: row.get(4)?,
                    headed: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    pub fn log_action(
        &mut self,
        session_name: &str,
        url: &str,
        action: &serde_json::Value,
        result: &serde_json::Value,
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO actions_log (session_name, url, action_json, result_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_name,
                url,
                serde_json::to_string(action)?,
                serde_json::to_string(result)?,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_action_log(&self, session_name: &str, limit: usize) -> Result<Vec<ActionLogRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_name, url, action_json, result_json, created_at
             FROM actions_log WHERE session_name = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![session_name, limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, session_name, url, action_json, result_json, created_at) = row?;
            records.push(ActionLogRecord {
                id,
                session_name,
                url,
                action_json: serde_json::from_str(&action_json)?,
                result_json: serde_json::from_str(&result_json)?,
                created_at,
            });
        }
        Ok(records)
    }
}

fn parse_page(json: Option<String>) -> Result<Option<Page>> {
    match json {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

fn map_queue_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueItemRecord> {
    Ok(QueueItemRecord {
        id: row.get(0)?,
        job_id: row.get(1)?,
        url: row.get(2)?,
        depth: row.get(3)?,
        priority: row.get(4)?,
        next_fetch_at: row.get(5)?,
        domain: row.get(6)?,
        status: QueueItemStatus::from_db_string(&row.get::<_, String>(7)?)
            .unwrap_or(QueueItemStatus::Failed),
        retries: row.get(8)?,
        last_error: row.get(9)?,
    })
}
