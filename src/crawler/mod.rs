//! Crawl loop: fetching and job processing
//!
//! This module contains the static HTTP fetcher and the crawl engine
//! that drives jobs through claim, politeness wait, fetch, extract,
//! persist, and link discovery.

mod engine;
mod fetcher;

pub use engine::{should_queue, CrawlEngine};
pub use fetcher::{build_http_client, fetch_static, open_static, FetchedPage, DEFAULT_USER_AGENT};
