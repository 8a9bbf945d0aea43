//! Sitemap discovery
//!
//! Expands an origin's sitemaps into page URLs. Sitemap indexes are
//! followed breadth-first with a bounded number of fetches, and results
//! are cached per origin with the same TTL as robots rules.

use crate::robots::RobotsRules;
use chrono::{DateTime, Duration, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use std::collections::{HashMap, VecDeque};

const SITEMAP_TTL_HOURS: i64 = 6;
const SITEMAP_FETCH_TIMEOUT_SECS: u64 = 10;
/// Maximum number of sitemap documents fetched per discovery run.
const MAX_EXPANSIONS: usize = 12;
/// Maximum number of pending sitemap-index URLs.
const MAX_PENDING_INDEXES: usize = 30;

/// Extracts every `<loc>` value from a sitemap document.
pub fn parse_sitemap_locs(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut locs = Vec::new();
    let mut buf = Vec::new();
    let mut in_loc = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                in_loc = e.local_name().as_ref() == b"loc";
            }
            Ok(Event::Text(text)) => {
                if in_loc {
                    if let Ok(value) = text.unescape() {
                        let value = value.trim().to_string();
                        if !value.is_empty() {
                            locs.push(value);
                        }
                    }
                }
            }
            Ok(Event::End(_)) => {
                in_loc = false;
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    locs
}

/// Discovers page URLs from an origin's sitemaps
///
/// The fetch queue starts from the robots `Sitemap:` directives, falling
/// back to `{origin}/sitemap.xml`. A fetched document's `<loc>` entries
/// are treated as further indexes when the document is a `<sitemapindex`
/// or the entry URL itself mentions `sitemap`; everything else is a page
/// URL. At most [`MAX_EXPANSIONS`] documents are fetched and at most
/// `limit` page URLs are returned.
pub async fn discover_sitemap_urls(
    client: &Client,
    rules: &RobotsRules,
    origin: &str,
    limit: usize,
) -> Vec<String> {
    let mut queue: VecDeque<String> = if rules.sitemaps.is_empty() {
        VecDeque::from([format!("{}/sitemap.xml", origin)])
    } else {
        rules.sitemaps.iter().cloned().collect()
    };

    let mut pages = Vec::new();
    let mut expansions = 0;

    while let Some(sitemap_url) = queue.pop_front() {
        if expansions >= MAX_EXPANSIONS || pages.len() >= limit {
            break;
        }
        expansions += 1;

        let body = match fetch_sitemap(client, &sitemap_url).await {
            Some(body) => body,
            None => continue,
        };

        let is_index = body.contains("<sitemapindex");
        for loc in parse_sitemap_locs(&body) {
            if is_index || loc.contains("sitemap") {
                if queue.len() < MAX_PENDING_INDEXES {
                    queue.push_back(loc);
                }
            } else {
                pages.push(loc);
                if pages.len() >= limit {
                    return pages;
                }
            }
        }
    }

    pages
}

async fn fetch_sitemap(client: &Client, url: &str) -> Option<String> {
    let response = client
        .get(url)
        .timeout(std::time::Duration::from_secs(SITEMAP_FETCH_TIMEOUT_SECS))
        .send()
        .await;

    match response {
        Ok(resp) if resp.status().is_success() => resp.text().await.ok(),
        Ok(resp) => {
            tracing::debug!("Sitemap {} returned {}", url, resp.status());
            None
        }
        Err(e) => {
            tracing::debug!("Failed to fetch sitemap {}: {}", url, e);
            None
        }
    }
}

/// Caches discovered sitemap URLs per origin.
#[derive(Debug, Default)]
pub struct SitemapCache {
    entries: HashMap<String, (Vec<String>, DateTime<Utc>)>,
}

impl SitemapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the discovered URLs for an origin, running discovery when
    /// the cache entry is missing or older than the TTL.
    pub async fn get(
        &mut self,
        client: &Client,
        rules: &RobotsRules,
        origin: &str,
        limit: usize,
    ) -> Vec<String> {
        if let Some((urls, fetched_at)) = self.entries.get(origin) {
            if Utc::now() - *fetched_at <= Duration::hours(SITEMAP_TTL_HOURS) {
                return urls.clone();
            }
        }

        let urls = discover_sitemap_urls(client, rules, origin, limit).await;
        self.entries
            .insert(origin.to_string(), (urls.clone(), Utc::now()));
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_urlset_locs() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                <url><loc>https://example.com/a</loc><lastmod>2024-01-01</lastmod></url>
                <url><loc>https://example.com/b</loc></url>
            </urlset>"#;
        assert_eq!(
            parse_sitemap_locs(xml),
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }

    #[test]
    fn test_parse_sitemapindex_locs() {
        let xml = r#"<sitemapindex>
                <sitemap><loc>https://example.com/sitemap-1.xml</loc></sitemap>
                <sitemap><loc>https://example.com/sitemap-2.xml</loc></sitemap>
            </sitemapindex>"#;
        assert_eq!(
            parse_sitemap_locs(xml),
            vec![
                "https://example.com/sitemap-1.xml",
                "https://example.com/sitemap-2.xml"
            ]
        );
    }

    #[test]
    fn test_parse_ignores_other_tags() {
        let xml = "<urlset><url><lastmod>2024-01-01</lastmod><priority>0.5</priority></url></urlset>";
        assert!(parse_sitemap_locs(xml).is_empty());
    }

    #[test]
    fn test_parse_unescapes_entities() {
        let xml = "<urlset><url><loc>https://example.com/a?x=1&amp;y=2</loc></url></urlset>";
        assert_eq!(parse_sitemap_locs(xml), vec!["https://example.com/a?x=1&y=2"]);
    }

    #[test]
    fn test_parse_garbage_returns_empty() {
        assert!(parse_sitemap_locs("this is not xml <<<").is_empty());
        assert!(parse_sitemap_locs("").is_empty());
    }
}
