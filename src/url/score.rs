use std::collections::HashSet;
use url::Url;

/// Tokens too generic to be useful as seed keywords.
const KEYWORD_STOPWORDS: &[&str] = &["www", "http", "https", "index", "html", "php"];

/// Path words that mark documentation-ish content worth prioritizing.
const CONTENT_HINTS: &[&str] = &[
    "docs", "guide", "blog", "article", "help", "support", "reference",
];

const KEYWORD_CAP: usize = 30;

/// Derives a keyword set from the seed URLs
///
/// Host and path are tokenized on non-alphanumeric characters; tokens
/// shorter than three characters and generic stopwords are dropped. The
/// result preserves first-seen order and is capped at 30 entries.
pub fn extract_seed_keywords(seed_urls: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    for seed in seed_urls {
        let parsed = match Url::parse(seed) {
            Ok(u) => u,
            Err(_) => continue,
        };
        let haystack = format!("{} {}", parsed.host_str().unwrap_or(""), parsed.path());
        for token in haystack
            .split(|c: char| !c.is_alphanumeric())
            .map(|t| t.to_lowercase())
        {
            if token.len() < 3 || KEYWORD_STOPWORDS.contains(&token.as_str()) {
                continue;
            }
            if seen.insert(token.clone()) {
                keywords.push(token);
                if keywords.len() >= KEYWORD_CAP {
                    return keywords;
                }
            }
        }
    }

    keywords
}

/// Scores a discovered URL for queue priority
///
/// Starts at 100 and adjusts for host distance from the seed, path depth,
/// crawl depth, query presence, keyword overlap, and documentation-style
/// paths. The result is always in `[1, 150]`.
pub fn score_discovered_url(
    url: &str,
    next_depth: u32,
    seed_host: &str,
    seed_keywords: &[String],
) -> i32 {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => return 1,
    };

    let mut score: i32 = 100;

    let host = parsed.host_str().unwrap_or("").to_lowercase();
    if host != seed_host.to_lowercase() {
        score -= 25;
    }

    let path = parsed.path();
    let segments = path.split('/').filter(|s| !s.is_empty()).count() as i32;
    score -= 3 * segments;

    score -= 7 * next_depth as i32;

    if parsed.query().is_some() {
        score -= 8;
    }

    let haystack = format!("{}{}", host, path).to_lowercase();
    let mut keyword_bonus = 0;
    for keyword in seed_keywords {
        if haystack.contains(keyword.as_str()) {
            keyword_bonus += 4;
            if keyword_bonus >= 20 {
                keyword_bonus = 20;
                break;
            }
        }
    }
    score += keyword_bonus;

    let path_lower = path.to_lowercase();
    if CONTENT_HINTS.iter().any(|hint| path_lower.contains(hint)) {
        score += 6;
    }

    score.clamp(1, 150)
}
