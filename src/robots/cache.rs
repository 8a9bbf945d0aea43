//! Per-origin robots.txt cache
//!
//! Fetched rulesets expire after six hours. A robots.txt that cannot be
//! fetched (transport error or non-2xx) yields an empty, permissive
//! ruleset, which is cached like any other result.

use crate::robots::{parse_robots, RobotsRules};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::collections::HashMap;

const ROBOTS_TTL_HOURS: i64 = 6;
const ROBOTS_FETCH_TIMEOUT_SECS: u64 = 8;

#[derive(Debug, Clone)]
struct CachedRules {
    rules: RobotsRules,
    fetched_at: DateTime<Utc>,
}

impl CachedRules {
    fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(ROBOTS_TTL_HOURS)
    }
}

/// Caches parsed robots.txt rules per origin.
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: HashMap<String, CachedRules>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rules for an origin, fetching `{origin}/robots.txt`
    /// when the cache entry is missing or stale.
    pub async fn get(&mut self, client: &Client, origin: &str, user_agent: &str) -> RobotsRules {
        if let Some(cached) = self.entries.get(origin) {
            if !cached.is_stale() {
                return cached.rules.clone();
            }
        }

        let rules = fetch_rules(client, origin, user_agent).await;
        self.entries.insert(
            origin.to_string(),
            CachedRules {
                rules: rules.clone(),
                fetched_at: Utc::now(),
            },
        );
        rules
    }

    /// Inserts rules directly, bypassing the fetch. Used by tests.
    #[cfg(test)]
    pub fn insert(&mut self, origin: &str, rules: RobotsRules) {
        self.entries.insert(
            origin.to_string(),
            CachedRules {
                rules,
                fetched_at: Utc::now(),
            },
        );
    }
}

async fn fetch_rules(client: &Client, origin: &str, user_agent: &str) -> RobotsRules {
    let url = format!("{}/robots.txt", origin);
    let response = client
        .get(&url)
        .timeout(std::time::Duration::from_secs(ROBOTS_FETCH_TIMEOUT_SECS))
        .send()
        .await;

    match response {
        Ok(resp) if resp.status().is_success() => match resp.text().await {
            Ok(body) => parse_robots(&body, user_agent),
            Err(e) => {
                tracing::debug!("Failed to read robots.txt body from {}: {}", url, e);
                RobotsRules::default()
            }
        },
        Ok(resp) => {
            tracing::debug!("robots.txt at {} returned {}", url, resp.status());
            RobotsRules::default()
        }
        Err(e) => {
            tracing::debug!("Failed to fetch robots.txt from {}: {}", url, e);
            RobotsRules::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_entry_not_stale() {
        let cached = CachedRules {
            rules: RobotsRules::default(),
            fetched_at: Utc::now(),
        };
        assert!(!cached.is_stale());
    }

    #[test]
    fn test_entry_stale_after_ttl() {
        let cached = CachedRules {
            rules: RobotsRules::default(),
            fetched_at: Utc::now() - Duration::hours(7),
        };
        assert!(cached.is_stale());
    }

    #[test]
    fn test_entry_fresh_just_under_ttl() {
        let cached = CachedRules {
            rules: RobotsRules::default(),
            fetched_at: Utc::now() - Duration::hours(5),
        };
        assert!(!cached.is_stale());
    }

    #[tokio::test]
    async fn test_inserted_rules_returned_without_fetch() {
        let mut cache = RobotsCache::new();
        let rules = RobotsRules {
            disallow: vec!["/private".to_string()],
            ..Default::default()
        };
        cache.insert("https://example.invalid", rules.clone());

        let client = Client::new();
        let got = cache.get(&client, "https://example.invalid", "webx").await;
        assert_eq!(got, rules);
    }
}
