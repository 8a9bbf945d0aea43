use serde::{Deserialize, Serialize};

/// Extraction size profile for a page
///
/// Compact mode caps heading/link/paragraph counts aggressively to keep
/// the downstream token cost low; full mode raises the caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageMode {
    #[default]
    Compact,
    Full,
}

impl PageMode {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Full => "full",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "compact" => Some(Self::Compact),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// Runtime options for a crawl job
///
/// All fields have defaults, so `CrawlOptions::default()` is a valid
/// configuration. Numeric fields are clamped into their documented bounds
/// by [`CrawlOptions::clamped`]; the engine snapshots the clamped form
/// into the job row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrawlOptions {
    /// Maximum number of pages fetched before the job finishes. [1, 10000]
    pub max_pages: u32,

    /// Maximum link depth from the seeds. [0, 10]
    pub max_depth: u32,

    /// Extraction profile applied to every page in the job.
    pub mode: PageMode,

    /// Hosts allowed for discovered links. Defaults to the seed hosts.
    pub allow_domains: Option<Vec<String>>,

    /// Hosts never enqueued, even when allowed.
    pub deny_domains: Option<Vec<String>>,

    /// Whether robots.txt rules gate fetching.
    pub respect_robots: bool,

    /// Minimum delay between fetches to the same host, in milliseconds.
    pub per_domain_delay_ms: u64,

    /// Whether seed origins are expanded through their sitemaps.
    pub seed_from_sitemaps: bool,

    /// Upper bound on URLs taken from sitemap expansion per origin.
    pub max_sitemap_urls: usize,

    /// Whether observed latency widens the per-domain delay.
    pub adaptive_delay: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_pages: 100,
            max_depth: 2,
            mode: PageMode::Compact,
            allow_domains: None,
            deny_domains: None,
            respect_robots: true,
            per_domain_delay_ms: 500,
            seed_from_sitemaps: true,
            max_sitemap_urls: 200,
            adaptive_delay: true,
        }
    }
}

impl CrawlOptions {
    /// Returns a copy with every numeric field forced into its bounds.
    pub fn clamped(&self) -> Self {
        let mut out = self.clone();
        out.max_pages = out.max_pages.clamp(1, 10_000);
        out.max_depth = out.max_depth.min(10);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = CrawlOptions::default();
        assert_eq!(opts.max_pages, 100);
        assert_eq!(opts.max_depth, 2);
        assert_eq!(opts.mode, PageMode::Compact);
        assert!(opts.respect_robots);
        assert_eq!(opts.per_domain_delay_ms, 500);
        assert!(opts.seed_from_sitemaps);
        assert_eq!(opts.max_sitemap_urls, 200);
        assert!(opts.adaptive_delay);
        assert!(opts.allow_domains.is_none());
        assert!(opts.deny_domains.is_none());
    }

    #[test]
    fn test_mode_defaults_to_compact_when_missing() {
        let opts: CrawlOptions = serde_json::from_str(r#"{"maxPages": 5}"#).unwrap();
        assert_eq!(opts.mode, PageMode::Compact);
        assert_eq!(opts.max_pages, 5);
    }

    #[test]
    fn test_clamped_bounds() {
        let opts = CrawlOptions {
            max_pages: 0,
            max_depth: 99,
            ..Default::default()
        };
        let clamped = opts.clamped();
        assert_eq!(clamped.max_pages, 1);
        assert_eq!(clamped.max_depth, 10);

        let opts = CrawlOptions {
            max_pages: 1_000_000,
            ..Default::default()
        };
        assert_eq!(opts.clamped().max_pages, 10_000);
    }

    #[test]
    fn test_options_roundtrip_json() {
        let opts = CrawlOptions {
            allow_domains: Some(vec!["example.com".to_string()]),
            mode: PageMode::Full,
            ..Default::default()
        };
        let json = serde_json::to_string(&opts).unwrap();
        let back: CrawlOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.mode, PageMode::Full);
        assert_eq!(back.allow_domains, Some(vec!["example.com".to_string()]));
    }

    #[test]
    fn test_page_mode_db_roundtrip() {
        for mode in [PageMode::Compact, PageMode::Full] {
            assert_eq!(PageMode::from_db_string(mode.to_db_string()), Some(mode));
        }
        assert_eq!(PageMode::from_db_string("bogus"), None);
    }
}
