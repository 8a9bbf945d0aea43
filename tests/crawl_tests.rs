//! End-to-end crawl tests
//!
//! These tests run the crawl engine against wiremock servers and assert
//! on job status, queue accounting, and persisted pages.

use std::time::Duration;
use webx::config::CrawlOptions;
use webx::crawler::{fetch_static, open_static, build_http_client, DEFAULT_USER_AGENT};
use webx::config::PageMode;
use webx::storage::{CrawlJobStatus, JobStatus, Store};
use webx::{CrawlEngine, WebxError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BODY: &str =
    "A paragraph with enough words in it to clear the extractor's minimum length filter.";

/// Options tuned for tests: no politeness delay, no sitemap seeding.
fn fast_options() -> CrawlOptions {
    CrawlOptions {
        per_domain_delay_ms: 0,
        adaptive_delay: false,
        seed_from_sitemaps: false,
        respect_robots: false,
        ..Default::default()
    }
}

fn html_page(title: &str, body: &str, links: &[String]) -> String {
    let anchors: String = links
        .iter()
        .enumerate()
        .map(|(i, url)| format!(r#"<a href="{}">Link {}</a>"#, url, i))
        .collect();
    format!(
        r#"<html><head><title>{}</title></head><body><h1>{}</h1><p>{}</p>{}</body></html>"#,
        title, title, body, anchors
    )
}

async fn mount_page(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Ticks the engine until the job leaves the active states.
async fn run_to_completion(
    engine: &mut CrawlEngine,
    job_id: &str,
    max_ticks: usize,
) -> CrawlJobStatus {
    for _ in 0..max_ticks {
        engine.process_active_jobs_once().await.expect("tick failed");
        let status = engine.status(job_id).expect("status failed");
        if !status.status.is_active() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {} did not finish within {} ticks", job_id, max_ticks);
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html_page(
            "Home",
            BODY,
            &[format!("{}/page1", base), format!("{}/page2", base)],
        ),
    )
    .await;
    mount_page(&server, "/page1", html_page("Page 1", BODY, &[])).await;
    mount_page(&server, "/page2", html_page("Page 2", BODY, &[])).await;

    let mut engine = CrawlEngine::new(Store::open_in_memory().unwrap()).unwrap();
    let job_id = engine
        .start(&[format!("{}/", base)], Some(fast_options()))
        .unwrap();

    let status = run_to_completion(&mut engine, &job_id, 200).await;
    assert_eq!(status.status, JobStatus::Finished);
    assert_eq!(status.stats.done, 3);
    assert_eq!(status.stats.failed, 0);
    assert!(status.finished_at.is_some());

    let pages = engine.next(&job_id, 10).unwrap();
    assert_eq!(pages.len(), 3);
    let titles: Vec<&str> = pages.iter().map(|p| p.title.as_str()).collect();
    assert!(titles.contains(&"Home"));
    assert!(titles.contains(&"Page 1"));
    assert!(titles.contains(&"Page 2"));

    // Every page got a content hash and at least the home page has links.
    assert!(pages.iter().all(|p| p.content_hash.len() == 16));
    let home = pages.iter().find(|p| p.title == "Home").unwrap();
    assert_eq!(home.links.len(), 2);
}

#[tokio::test]
async fn test_robots_disallow_completes_silently() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
        )
        .mount(&server)
        .await;

    mount_page(
        &server,
        "/",
        html_page(
            "Home",
            BODY,
            &[format!("{}/allowed", base), format!("{}/private", base)],
        ),
    )
    .await;
    mount_page(&server, "/allowed", html_page("Allowed", BODY, &[])).await;

    // The disallowed page must never be fetched.
    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .expect(0)
        .mount(&server)
        .await;

    let options = CrawlOptions {
        respect_robots: true,
        ..fast_options()
    };
    let mut engine = CrawlEngine::new(Store::open_in_memory().unwrap()).unwrap();
    let job_id = engine.start(&[format!("{}/", base)], Some(options)).unwrap();

    let status = run_to_completion(&mut engine, &job_id, 200).await;
    assert_eq!(status.status, JobStatus::Finished);
    // The robots-blocked item completes without surfacing a failure.
    assert_eq!(status.stats.failed, 0);
    assert_eq!(status.stats.done, 3);

    let pages = engine.next(&job_id, 10).unwrap();
    assert!(pages.iter().all(|p| !p.url.contains("/private")));
}

#[tokio::test]
async fn test_depth_limit_stops_discovery() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html_page("Root", BODY, &[format!("{}/level1", base)]),
    )
    .await;
    mount_page(
        &server,
        "/level1",
        html_page("Level 1", BODY, &[format!("{}/level2", base)]),
    )
    .await;
    mount_page(
        &server,
        "/level2",
        html_page("Level 2", BODY, &[format!("{}/level3", base)]),
    )
    .await;

    // Depth 3 is past max_depth=2 and must never be enqueued.
    Mock::given(method("GET"))
        .and(path("/level3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("too deep"))
        .expect(0)
        .mount(&server)
        .await;

    let options = CrawlOptions {
        max_depth: 2,
        ..fast_options()
    };
    let mut engine = CrawlEngine::new(Store::open_in_memory().unwrap()).unwrap();
    let job_id = engine.start(&[format!("{}/", base)], Some(options)).unwrap();

    let status = run_to_completion(&mut engine, &job_id, 200).await;
    assert_eq!(status.status, JobStatus::Finished);
    assert_eq!(status.stats.done, 3);
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut engine = CrawlEngine::new(Store::open_in_memory().unwrap()).unwrap();
    let job_id = engine
        .start(&[format!("{}/", base)], Some(fast_options()))
        .unwrap();

    // Linear backoff puts ~4.5s between first attempt and exhaustion.
    let status = run_to_completion(&mut engine, &job_id, 600).await;
    assert_eq!(status.stats.failed, 1);
    assert_eq!(status.stats.done, 0);
    // One failed item is far below the job-failure threshold.
    assert_eq!(status.status, JobStatus::Finished);
}

#[tokio::test]
async fn test_unchanged_content_not_persisted_twice() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", html_page("Stable", BODY, &[])).await;

    let mut engine = CrawlEngine::new(Store::open_in_memory().unwrap()).unwrap();

    let first_job = engine
        .start(&[format!("{}/", base)], Some(fast_options()))
        .unwrap();
    run_to_completion(&mut engine, &first_job, 200).await;
    let first_pages = engine.next(&first_job, 10).unwrap();
    assert_eq!(first_pages.len(), 1);

    // Same URL again: identical content hash, so no new page row.
    let second_job = engine
        .start(&[format!("{}/", base)], Some(fast_options()))
        .unwrap();
    run_to_completion(&mut engine, &second_job, 200).await;
    let second_pages = engine.next(&second_job, 10).unwrap();
    assert_eq!(second_pages.len(), 1);
    assert_eq!(second_pages[0].id, first_pages[0].id);
}

#[tokio::test]
async fn test_changed_content_persists_new_snapshot() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", html_page("Before", BODY, &[])).await;

    let mut engine = CrawlEngine::new(Store::open_in_memory().unwrap()).unwrap();
    let first_job = engine
        .start(&[format!("{}/", base)], Some(fast_options()))
        .unwrap();
    run_to_completion(&mut engine, &first_job, 200).await;
    let first = engine.next(&first_job, 10).unwrap().remove(0);

    // Replace the page content and crawl again.
    server.reset().await;
    mount_page(&server, "/", html_page("After", BODY, &[])).await;

    let second_job = engine
        .start(&[format!("{}/", base)], Some(fast_options()))
        .unwrap();
    run_to_completion(&mut engine, &second_job, 200).await;
    let second = engine.next(&second_job, 10).unwrap().remove(0);

    assert_ne!(first.content_hash, second.content_hash);
    assert_ne!(first.id, second.id);
    assert_eq!(second.title, "After");
}

#[tokio::test]
async fn test_sitemap_seeding_enqueues_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "User-agent: *\nAllow: /\nSitemap: {}/sitemap.xml",
            base
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<?xml version="1.0"?><urlset>
                <url><loc>{}/catalog-a</loc></url>
                <url><loc>{}/catalog-b</loc></url>
            </urlset>"#,
            base, base
        )))
        .mount(&server)
        .await;

    mount_page(&server, "/", html_page("Home", BODY, &[])).await;
    mount_page(&server, "/catalog-a", html_page("Sitemap A", BODY, &[])).await;
    mount_page(&server, "/catalog-b", html_page("Sitemap B", BODY, &[])).await;

    let options = CrawlOptions {
        respect_robots: true,
        seed_from_sitemaps: true,
        ..fast_options()
    };
    let mut engine = CrawlEngine::new(Store::open_in_memory().unwrap()).unwrap();
    let job_id = engine.start(&[format!("{}/", base)], Some(options)).unwrap();

    let status = run_to_completion(&mut engine, &job_id, 200).await;
    assert_eq!(status.status, JobStatus::Finished);
    assert_eq!(status.stats.done, 3);

    let titles: Vec<String> = engine
        .next(&job_id, 10)
        .unwrap()
        .into_iter()
        .map(|p| p.title)
        .collect();
    assert!(titles.contains(&"Sitemap A".to_string()));
    assert!(titles.contains(&"Sitemap B".to_string()));
}

#[tokio::test]
async fn test_max_pages_finishes_job_early() {
    let server = MockServer::start().await;
    let base = server.uri();

    let links: Vec<String> = (0..10).map(|i| format!("{}/p{}", base, i)).collect();
    mount_page(&server, "/", html_page("Hub", BODY, &links)).await;
    for i in 0..10 {
        mount_page(
            &server,
            &format!("/p{}", i),
            html_page(&format!("P{}", i), BODY, &[]),
        )
        .await;
    }

    let options = CrawlOptions {
        max_pages: 3,
        ..fast_options()
    };
    let mut engine = CrawlEngine::new(Store::open_in_memory().unwrap()).unwrap();
    let job_id = engine.start(&[format!("{}/", base)], Some(options)).unwrap();

    let status = run_to_completion(&mut engine, &job_id, 200).await;
    assert_eq!(status.status, JobStatus::Finished);
    assert_eq!(status.stats.done, 3);
}

#[tokio::test]
async fn test_crawl_survives_worker_restart() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html_page(
            "Home",
            BODY,
            &[format!("{}/a", base), format!("{}/b", base)],
        ),
    )
    .await;
    mount_page(&server, "/a", html_page("A", BODY, &[])).await;
    mount_page(&server, "/b", html_page("B", BODY, &[])).await;

    let db_path = std::env::temp_dir().join(format!("webx_restart_{}.db", std::process::id()));
    let _ = std::fs::remove_file(&db_path);

    let job_id = {
        let mut engine = CrawlEngine::new(Store::open(&db_path).unwrap()).unwrap();
        let job_id = engine
            .start(&[format!("{}/", base)], Some(fast_options()))
            .unwrap();
        // Process only the seed, then drop the engine mid-job.
        engine.process_active_jobs_once().await.unwrap();
        let status = engine.status(&job_id).unwrap();
        assert_eq!(status.stats.done, 1);
        assert_eq!(status.status, JobStatus::Running);
        job_id
    };

    // A fresh engine over the same database picks the job back up.
    let mut engine = CrawlEngine::new(Store::open(&db_path).unwrap()).unwrap();
    let status = run_to_completion(&mut engine, &job_id, 200).await;
    assert_eq!(status.status, JobStatus::Finished);
    assert_eq!(status.stats.done, 3);

    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_open_static_extracts_page() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/doc",
        html_page("Open Me", BODY, &[format!("{}/other", base)]),
    )
    .await;

    let client = build_http_client(DEFAULT_USER_AGENT).unwrap();
    let page = open_static(&client, &format!("{}/doc", base), PageMode::Compact)
        .await
        .unwrap();

    assert_eq!(page.title, "Open Me");
    assert_eq!(page.key_paragraphs.len(), 1);
    assert_eq!(page.links.len(), 1);
    assert_eq!(page.extractor_version, "v1");
}

#[tokio::test]
async fn test_fetch_static_fails_on_404() {
    let server = MockServer::start().await;
    let client = build_http_client(DEFAULT_USER_AGENT).unwrap();

    let err = fetch_static(&client, &format!("{}/missing", server.uri()))
        .await
        .unwrap_err();
    match err {
        WebxError::Fetch { status, .. } => assert_eq!(status, 404),
        other => panic!("expected fetch error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_static_follows_redirects() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/new", base)),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/new", html_page("Moved", BODY, &[])).await;

    let client = build_http_client(DEFAULT_USER_AGENT).unwrap();
    let fetched = fetch_static(&client, &format!("{}/old", base)).await.unwrap();
    assert!(fetched.final_url.ends_with("/new"));
    assert!(fetched.body.contains("Moved"));
}
