//! In-memory crawl engine state
//!
//! Per-process caches the engine consults between ticks: last-fetch
//! timestamps and latency averages per domain. Nothing here is persisted;
//! a restarted worker simply starts polite.

mod domain_state;

pub use domain_state::{DomainPerformance, DomainTracker};
