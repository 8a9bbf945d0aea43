//! Robots.txt handling and sitemap discovery
//!
//! This module parses robots.txt into explicit allow/disallow path rules,
//! answers crawl-permission queries with longest-match semantics, derives
//! the per-domain politeness delay, and expands sitemap indexes into page
//! URLs. Fetched rulesets are cached per origin with a six-hour TTL.

mod cache;
mod parser;
mod sitemap;

pub use cache::RobotsCache;
pub use parser::parse_robots;
pub use sitemap::{discover_sitemap_urls, parse_sitemap_locs, SitemapCache};

/// Parsed robots.txt rules relevant to the crawler's user agent
///
/// An empty ruleset (no rules collected, or robots.txt unavailable) is
/// fully permissive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    /// Allow paths from active groups, each with a leading `/`.
    pub allow: Vec<String>,
    /// Disallow paths from active groups, each with a leading `/`.
    pub disallow: Vec<String>,
    /// Crawl-delay from active groups, converted to milliseconds.
    pub crawl_delay_ms: Option<u64>,
    /// Normalized sitemap URLs, collected document-wide.
    pub sitemaps: Vec<String>,
}

/// Checks whether a URL may be crawled under the given rules
///
/// The longest matching allow path is compared with the longest matching
/// disallow path; if neither matches the URL is allowed, and ties go to
/// allow. The bare `/` rule (the normalized form of an empty directive)
/// is ignored.
pub fn can_crawl(url: &str, rules: &RobotsRules) -> bool {
    let path = match ::url::Url::parse(url) {
        Ok(u) => u.path().to_string(),
        Err(_) => return false,
    };

    let allow_len = longest_match(&path, &rules.allow);
    let disallow_len = longest_match(&path, &rules.disallow);

    if allow_len == 0 && disallow_len == 0 {
        return true;
    }
    allow_len >= disallow_len
}

fn longest_match(path: &str, rules: &[String]) -> usize {
    rules
        .iter()
        .filter(|rule| rule.as_str() != "/")
        .filter(|rule| path.starts_with(rule.as_str()))
        .map(|rule| rule.len())
        .max()
        .unwrap_or(0)
}

/// Computes the effective inter-fetch delay for a domain
///
/// Takes the maximum of the configured base delay, the robots crawl-delay,
/// and (when adaptive mode is on) 1.4x the observed average latency.
pub fn suggested_delay(
    base_ms: u64,
    rules: &RobotsRules,
    avg_latency_ms: Option<u64>,
    adaptive: bool,
) -> u64 {
    let robots_ms = rules.crawl_delay_ms.unwrap_or(0);
    let adaptive_ms = if adaptive {
        avg_latency_ms
            .filter(|avg| *avg > 0)
            .map(|avg| (avg as f64 * 1.4).round() as u64)
            .unwrap_or(0)
    } else {
        0
    };
    base_ms.max(robots_ms).max(adaptive_ms)
}
