//! Static HTTP fetcher
//!
//! Plain GET with an identifying user agent and redirect follow. This is
//! the only fetch path in the crawl loop; JavaScript rendering belongs to
//! the browser collaborator.

use crate::config::PageMode;
use crate::extract::{extract_page_from_html, ExtractInput, Page, PageSource};
use crate::{Result, WebxError};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Identifying user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "webx/0.1 (+https://github.com/webx-agent/webx)";

const MAX_REDIRECTS: usize = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// A successfully fetched page body.
#[derive(Debug)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

/// Builds the HTTP client used by the crawl engine
///
/// Redirects are followed (up to 10 hops), responses are decompressed,
/// and every request carries the crawler's user agent.
pub fn build_http_client(user_agent: &str) -> Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()?;
    Ok(client)
}

/// Fetches a URL, failing on any non-2xx response.
pub async fn fetch_static(client: &Client, url: &str) -> Result<FetchedPage> {
    let response = client.get(url).send().await?;
    let status = response.status();
    let final_url = response.url().to_string();

    if !status.is_success() {
        return Err(WebxError::Fetch {
            url: url.to_string(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("unknown").to_string(),
        });
    }

    let body = response.text().await?;
    Ok(FetchedPage {
        final_url,
        status: status.as_u16(),
        body,
    })
}

/// Fetches a URL statically and extracts a structured page from it.
pub async fn open_static(client: &Client, url: &str, mode: PageMode) -> Result<Page> {
    let fetched = fetch_static(client, url).await?;
    Ok(extract_page_from_html(ExtractInput {
        url: &fetched.final_url,
        html: &fetched.body,
        mode,
        source: PageSource::Static,
    }))
}
