//! URL handling for the crawl engine
//!
//! This module provides URL normalization, crawlability and nuisance
//! classification, and scoring of discovered links against the seed set.

mod normalize;
mod score;

pub use normalize::normalize;
pub use score::{extract_seed_keywords, score_discovered_url};

use url::Url;

/// Path extensions that mark a URL as binary or asset content.
const SKIP_EXTENSIONS: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "bmp", "avif", "tiff",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "7z", "rar",
    // media
    "mp3", "mp4", "m4a", "m4v", "avi", "mov", "wmv", "flv", "mkv", "webm", "wav", "ogg",
    // stylesheets / scripts / fonts
    "css", "js", "mjs", "woff", "woff2", "ttf", "eot",
    // documents and feeds
    "pdf", "json", "xml", "rss", "atom",
];

/// Path substrings that mark a URL as machinery rather than content.
const NUISANCE_FRAGMENTS: &[&str] = &[
    "/wp-json/", "/api/", "/graphql", "/cdn-cgi/", "/cart", "/checkout", "/login", "/signin",
    "/account", "/admin",
];

/// Returns true when the URL is http(s) and does not point at a known
/// binary or asset extension.
pub fn is_likely_crawlable(url: &str) -> bool {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => return false,
    };
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }
    let path = parsed.path().to_lowercase();
    match path.rsplit_once('.') {
        Some((_, ext)) => !SKIP_EXTENSIONS.contains(&ext),
        None => true,
    }
}

/// Returns true when the URL is crawler machinery, commerce/auth plumbing,
/// or cannot be parsed at all.
pub fn is_nuisance(url: &str) -> bool {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => return true,
    };
    let path = parsed.path();
    if path == "/robots.txt" || path == "/sitemap.xml" || path == "/ads.txt" {
        return true;
    }
    NUISANCE_FRAGMENTS.iter().any(|frag| path.contains(frag))
}

/// Extracts the lowercase host of a URL, if it has one.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Extracts the origin (`scheme://host[:port]`) of a URL.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !parsed.has_host() {
        return None;
    }
    Some(parsed.origin().ascii_serialization())
}
