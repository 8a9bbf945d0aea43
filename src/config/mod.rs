//! Crawl configuration
//!
//! Runtime options for a crawl job. Options are snapshotted into the job
//! row at creation time, so a job keeps the settings it started with even
//! if later jobs use different ones.

mod options;

pub use options::{CrawlOptions, PageMode};

/// Environment variable controlling the worker tick period in milliseconds.
pub const CRAWLER_POLL_MS_VAR: &str = "CRAWLER_POLL_MS";

/// Default worker tick period when `CRAWLER_POLL_MS` is unset or invalid.
pub const DEFAULT_POLL_MS: u64 = 1000;

/// Reads the worker tick period from the environment.
pub fn poll_interval_ms() -> u64 {
    std::env::var(CRAWLER_POLL_MS_VAR)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_POLL_MS)
}
