//! Webx: a local web-automation backend for agents
//!
//! This crate implements the crawl engine and page-extraction pipeline:
//! a durable per-job priority queue, a per-domain politeness scheduler,
//! robots.txt and sitemap handling, and an HTML-to-structured-page
//! extractor with stable action identifiers.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod ids;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for webx operations
#[derive(Debug, Error)]
pub enum WebxError {
    #[error("No valid seed URLs after normalization")]
    NoValidSeeds,

    #[error("Unknown crawl job: {0}")]
    UnknownJob(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Fetch failed for {url}: {status} {status_text}")]
    Fetch {
        url: String,
        status: u16,
        status_text: String,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for webx operations
pub type Result<T> = std::result::Result<T, WebxError>;

// Re-export commonly used types
pub use config::{CrawlOptions, PageMode};
pub use crawler::CrawlEngine;
pub use extract::{extract_page_from_html, ExtractInput, Page, PageSource};
pub use storage::Store;
pub use url::normalize;
