//! Robots.txt parser
//!
//! Parses robots.txt content into a [`RobotsRules`] for one user agent.
//! Rules are grouped by `User-Agent`; a group is active when one of its
//! agents is `*` or equals the crawler's user agent. Consecutive
//! `User-Agent` lines belong to the same group, and directives appearing
//! before any `User-Agent` line belong to no group.

use crate::robots::RobotsRules;
use crate::url::normalize;

/// Parses robots.txt content for the given user agent.
pub fn parse_robots(content: &str, user_agent: &str) -> RobotsRules {
    let mut rules = RobotsRules::default();
    let ua_lower = user_agent.to_lowercase();

    let mut group_agents: Vec<String> = Vec::new();
    let mut in_group_header = false;
    let mut seen_any_group = false;

    for line in content.lines() {
        // Strip inline comments, then whitespace.
        let line = line.split('#').next().unwrap_or("");
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        if key == "user-agent" {
            if !in_group_header {
                group_agents.clear();
            }
            group_agents.push(value.to_lowercase());
            in_group_header = true;
            seen_any_group = true;
            continue;
        }
        in_group_header = false;

        // Sitemap directives apply to the whole document, not a group.
        if key == "sitemap" {
            if let Some(url) = normalize(value, None) {
                rules.sitemaps.push(url);
            }
            continue;
        }

        let active = seen_any_group
            && group_agents
                .iter()
                .any(|agent| agent == "*" || agent == &ua_lower);
        if !active {
            continue;
        }

        match key.as_str() {
            "allow" => rules.allow.push(with_leading_slash(value)),
            "disallow" => rules.disallow.push(with_leading_slash(value)),
            "crawl-delay" => {
                if let Ok(seconds) = value.parse::<f64>() {
                    if seconds.is_finite() && seconds >= 0.0 {
                        rules.crawl_delay_ms = Some((seconds * 1000.0).round() as u64);
                    }
                }
            }
            _ => {}
        }
    }

    rules
}

fn with_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
