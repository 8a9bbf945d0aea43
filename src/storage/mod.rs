//! Durable storage for pages, links, jobs, and the crawl queue
//!
//! All durable state lives in one SQLite database with WAL journaling:
//! page snapshots (with their link sets), crawl jobs and their queues,
//! browser session metadata, the action log, and schema metadata.

mod schema;
mod sqlite;

pub use schema::{initialize_schema, SCHEMA_VERSION};
pub use sqlite::Store;

use crate::config::CrawlOptions;

/// Default backoff step applied by `fail_queue_item`, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: i64 = 1500;

/// Retries at which a queue item is abandoned.
pub const MAX_ITEM_RETRIES: u32 = 3;

/// Status of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "finished" => Some(Self::Finished),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states get a `finished_at` stamp.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// Active jobs are picked up by the worker tick.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

/// Status of a crawl queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueItemStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl QueueItemStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A crawl job row
#[derive(Debug, Clone)]
pub struct CrawlJobRecord {
    pub id: String,
    pub status: JobStatus,
    pub seed_urls: Vec<String>,
    pub options: CrawlOptions,
    pub created_at: String,
    pub finished_at: Option<String>,
}

/// A crawl queue row
#[derive(Debug, Clone)]
pub struct QueueItemRecord {
    pub id: String,
    pub job_id: String,
    pub url: String,
    pub depth: u32,
    pub priority: i32,
    /// Epoch milliseconds before which the item must not be claimed.
    pub next_fetch_at: i64,
    pub domain: String,
    pub status: QueueItemStatus,
    pub retries: u32,
    pub last_error: Option<String>,
}

/// Aggregated queue counts for one job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub done: u64,
    pub failed: u64,
}

/// Job status surfaced at the engine boundary
#[derive(Debug, Clone)]
pub struct CrawlJobStatus {
    pub id: String,
    pub status: JobStatus,
    pub created_at: String,
    pub finished_at: Option<String>,
    pub stats: QueueStats,
}

/// A browser session row (semantics owned by the browser collaborator)
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub storage_state_path: String,
    pub notes: Option<String>,
    pub headed: bool,
}

/// One executed-action log row
#[derive(Debug, Clone)]
pub struct ActionLogRecord {
    pub id: i64,
    pub session_name: String,
    pub url: String,
    pub action_json: serde_json::Value,
    pub result_json: serde_json::Value,
    pub created_at: String,
}

/// A page matched by a text query, with its relevance score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub page: crate::extract::Page,
    pub score: f64,
}
