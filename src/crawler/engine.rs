//! Crawl engine
//!
//! The engine owns the per-tick state machine: claim the next eligible
//! queue item, wait out the domain's politeness delay, fetch, extract,
//! persist (unless the content hash is unchanged), and enqueue scored
//! discoveries. Jobs progress one item per tick; a host loop calls
//! [`CrawlEngine::process_active_jobs_once`] periodically.

use crate::config::CrawlOptions;
use crate::crawler::fetcher::{build_http_client, fetch_static, DEFAULT_USER_AGENT};
use crate::extract::{extract_page_from_html, ExtractInput, Page, PageSource};
use crate::robots::{can_crawl, suggested_delay, RobotsCache, RobotsRules, SitemapCache};
use crate::state::DomainTracker;
use crate::storage::{CrawlJobRecord, CrawlJobStatus, JobStatus, QueueItemRecord, Store};
use crate::url::{
    extract_seed_keywords, host_of, is_likely_crawlable, is_nuisance, normalize, origin_of,
    score_discovered_url,
};
use crate::{Result, WebxError};
use chrono::Utc;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;

/// Seeds are enqueued at `140 - index`, so earlier seeds win ties.
const SEED_BASE_PRIORITY: i32 = 140;
/// URLs discovered through sitemaps sit between seeds and scored links.
const SITEMAP_SEED_PRIORITY: i32 = 120;
/// Sitemap seeding covers at most this many unique seed origins.
const SITEMAP_SEED_ORIGINS: usize = 6;
/// A job fails once more than this many items failed with zero successes.
const JOB_FAILURE_THRESHOLD: u64 = 25;

/// The crawl engine: durable queue plus per-process scheduler caches.
pub struct CrawlEngine {
    store: Store,
    client: Client,
    user_agent: String,
    robots: RobotsCache,
    sitemaps: SitemapCache,
    domains: DomainTracker,
    initialized_jobs: HashSet<String>,
}

impl CrawlEngine {
    pub fn new(store: Store) -> Result<Self> {
        Self::with_user_agent(store, DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(store: Store, user_agent: &str) -> Result<Self> {
        Ok(Self {
            store,
            client: build_http_client(user_agent)?,
            user_agent: user_agent.to_string(),
            robots: RobotsCache::new(),
            sitemaps: SitemapCache::new(),
            domains: DomainTracker::new(),
            initialized_jobs: HashSet::new(),
        })
    }

    /// Access to the underlying store, for the tool-surface collaborator.
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Creates a crawl job from the seed URLs and flips it to running
    ///
    /// Seeds are normalized and deduplicated; anything that is not
    /// http(s) or fails normalization is dropped. At least one valid
    /// seed must remain. Seed `i` enters the queue at depth 0 with
    /// priority `140 - i`.
    pub fn start(&mut self, seed_urls: &[String], options: Option<CrawlOptions>) -> Result<String> {
        let options = options.unwrap_or_default().clamped();

        let mut seeds = Vec::new();
        let mut seen = HashSet::new();
        for raw in seed_urls {
            if let Some(url) = normalize(raw, None) {
                if seen.insert(url.clone()) {
                    seeds.push(url);
                }
            }
        }
        if seeds.is_empty() {
            return Err(WebxError::NoValidSeeds);
        }

        let job_id = self.store.create_crawl_job(&seeds, &options)?;
        for (index, seed) in seeds.iter().enumerate() {
            self.store
                .enqueue_url(&job_id, seed, 0, SEED_BASE_PRIORITY - index as i32)?;
        }
        self.store.set_crawl_job_status(&job_id, JobStatus::Running)?;

        tracing::info!("Started crawl job {} with {} seed(s)", job_id, seeds.len());
        Ok(job_id)
    }

    /// Job status with aggregated queue counts.
    pub fn status(&self, job_id: &str) -> Result<CrawlJobStatus> {
        self.store.get_crawl_job_status(job_id)
    }

    /// Pages fetched so far by a job, newest first.
    pub fn next(&self, job_id: &str, limit: usize) -> Result<Vec<Page>> {
        self.store.get_crawl_pages(job_id, limit)
    }

    /// Runs one `process_job_once` for every active job.
    pub async fn process_active_jobs_once(&mut self) -> Result<()> {
        let jobs = self.store.list_active_crawl_jobs()?;
        for job in jobs {
            if let Err(e) = self.process_job_once(&job).await {
                tracing::warn!("Tick for job {} errored: {}", job.id, e);
            }
        }
        Ok(())
    }

    /// Advances one job by at most one queue item.
    async fn process_job_once(&mut self, job: &CrawlJobRecord) -> Result<()> {
        let options = job.options.clamped();

        let status = self.store.get_crawl_job_status(&job.id)?;
        if status.stats.done >= options.max_pages as u64 {
            tracing::info!("Job {} reached max_pages, finishing", job.id);
            self.store.set_crawl_job_status(&job.id, JobStatus::Finished)?;
            return Ok(());
        }

        if options.seed_from_sitemaps && !self.initialized_jobs.contains(&job.id) {
            self.initialized_jobs.insert(job.id.clone());
            self.seed_from_sitemaps(job, &options).await;
        }

        let Some(item) = self.store.claim_next_queue_item(&job.id)? else {
            let status = self.store.get_crawl_job_status(&job.id)?;
            if status.stats.pending == 0 && status.stats.processing == 0 {
                tracing::info!("Job {} queue drained, finishing", job.id);
                self.store.set_crawl_job_status(&job.id, JobStatus::Finished)?;
            }
            return Ok(());
        };

        if item.depth > options.max_depth {
            self.store.complete_queue_item(&item.id)?;
            return Ok(());
        }

        if let Err(e) = self.process_claimed_item(job, &options, &item).await {
            tracing::debug!("Queue item {} failed: {}", item.url, e);
            self.store.fail_queue_item(&item.id, &e.to_string())?;

            let status = self.store.get_crawl_job_status(&job.id)?;
            if status.stats.failed > JOB_FAILURE_THRESHOLD && status.stats.done == 0 {
                tracing::warn!("Job {} failed: {} items failed before any success", job.id, status.stats.failed);
                self.store.set_crawl_job_status(&job.id, JobStatus::Failed)?;
            }
        }
        Ok(())
    }

    /// Fetch, extract, persist, and discover for one claimed item.
    async fn process_claimed_item(
        &mut self,
        job: &CrawlJobRecord,
        options: &CrawlOptions,
        item: &QueueItemRecord,
    ) -> Result<()> {
        // The queue may hold URLs enqueued under older rules; re-check.
        let Some(url) = normalize(&item.url, None) else {
            self.store.complete_queue_item(&item.id)?;
            return Ok(());
        };
        if !should_queue(&url, options, &job.seed_urls) {
            self.store.complete_queue_item(&item.id)?;
            return Ok(());
        }

        let rules = if options.respect_robots {
            match origin_of(&url) {
                Some(origin) => self.robots.get(&self.client, &origin, &self.user_agent).await,
                None => RobotsRules::default(),
            }
        } else {
            RobotsRules::default()
        };
        if options.respect_robots && !can_crawl(&url, &rules) {
            // Robots denial is not an error; the item just completes.
            tracing::debug!("Robots disallow {}", url);
            self.store.complete_queue_item(&item.id)?;
            return Ok(());
        }

        let domain = host_of(&url).unwrap_or_default();
        let delay_ms = suggested_delay(
            options.per_domain_delay_ms,
            &rules,
            self.domains.avg_latency_ms(&domain),
            options.adaptive_delay,
        );
        let wait_ms = match self.domains.last_fetch_ms(&domain) {
            Some(last) => {
                let elapsed = Utc::now().timestamp_millis() - last;
                (delay_ms as i64 - elapsed).max(0) as u64
            }
            None => 0,
        };
        if wait_ms > 0 {
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }

        let started = std::time::Instant::now();
        let fetched = fetch_static(&self.client, &url).await?;
        let latency_ms = started.elapsed().as_millis() as u64;
        self.domains.record_latency(&domain, latency_ms);

        let page = extract_page_from_html(ExtractInput {
            url: &fetched.final_url,
            html: &fetched.body,
            mode: options.mode,
            source: PageSource::Static,
        });

        let previous = match self.store.get_latest_page_by_url(&fetched.final_url)? {
            Some(p) => Some(p),
            None if fetched.final_url != url => self.store.get_latest_page_by_url(&url)?,
            None => None,
        };
        let unchanged = previous
            .map(|p| p.content_hash == page.content_hash)
            .unwrap_or(false);
        if unchanged {
            tracing::debug!("Content unchanged for {}, skipping persistence", url);
        } else {
            self.store.save_page(&page)?;
            self.store.record_last_success("crawl")?;
        }

        self.store.complete_queue_item(&item.id)?;
        self.domains.mark_fetched(&domain, Utc::now().timestamp_millis());

        // Discovery happens only after the page is persisted (or skipped
        // as unchanged), and never past max_depth.
        let next_depth = item.depth + 1;
        if next_depth <= options.max_depth {
            let seed_host = job
                .seed_urls
                .first()
                .and_then(|s| host_of(s))
                .unwrap_or_default();
            let seed_keywords = extract_seed_keywords(&job.seed_urls);

            for link in &page.links {
                let Some(discovered) = normalize(&link.url, Some(&page.url)) else {
                    continue;
                };
                if should_queue(&discovered, options, &job.seed_urls) {
                    let priority =
                        score_discovered_url(&discovered, next_depth, &seed_host, &seed_keywords);
                    self.store
                        .enqueue_url(&job.id, &discovered, next_depth, priority)?;
                }
            }
        }

        Ok(())
    }

    /// Expands the first few seed origins through their sitemaps.
    ///
    /// Runs once per job per process; every failure is swallowed so a
    /// broken sitemap never blocks the crawl itself.
    async fn seed_from_sitemaps(&mut self, job: &CrawlJobRecord, options: &CrawlOptions) {
        let mut origins = Vec::new();
        let mut seen = HashSet::new();
        for seed in &job.seed_urls {
            if let Some(origin) = origin_of(seed) {
                if seen.insert(origin.clone()) {
                    origins.push(origin);
                    if origins.len() >= SITEMAP_SEED_ORIGINS {
                        break;
                    }
                }
            }
        }

        for origin in origins {
            let rules = if options.respect_robots {
                self.robots.get(&self.client, &origin, &self.user_agent).await
            } else {
                RobotsRules::default()
            };

            let urls = self
                .sitemaps
                .get(&self.client, &rules, &origin, options.max_sitemap_urls)
                .await;
            tracing::debug!("Sitemap seeding for {} found {} URL(s)", origin, urls.len());

            for url in urls {
                let Some(normalized) = normalize(&url, None) else {
                    continue;
                };
                if !should_queue(&normalized, options, &job.seed_urls) {
                    continue;
                }
                if let Err(e) = self
                    .store
                    .enqueue_url(&job.id, &normalized, 0, SITEMAP_SEED_PRIORITY)
                {
                    tracing::debug!("Could not enqueue sitemap URL {}: {}", normalized, e);
                }
            }
        }
    }
}

/// Decides whether a URL belongs in a job's queue
///
/// The URL must look crawlable and not be nuisance machinery; its host
/// must be in `allow_domains` when that list is present (the seed hosts
/// otherwise), and must not be in `deny_domains`.
pub fn should_queue(url: &str, options: &CrawlOptions, seed_urls: &[String]) -> bool {
    if !is_likely_crawlable(url) || is_nuisance(url) {
        return false;
    }
    let Some(host) = host_of(url) else {
        return false;
    };

    let allowed = match &options.allow_domains {
        Some(allow) => allow.iter().any(|d| d.eq_ignore_ascii_case(&host)),
        None => seed_urls
            .iter()
            .filter_map(|seed| host_of(seed))
            .any(|seed_host| seed_host == host),
    };
    if !allowed {
        return false;
    }

    if let Some(deny) = &options.deny_domains {
        if deny.iter().any(|d| d.eq_ignore_ascii_case(&host)) {
            return false;
        }
    }
    true
}
