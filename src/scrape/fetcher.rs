//! Page fetching with identity rotation and a rendering-capable fallback
//!
//! The pipeline is polymorphic over [`PageFetcher`] implementations. The
//! lightweight [`HttpFetcher`] covers most pages; when a response looks
//! blocked (error status, challenge interstitial, or an implausibly small
//! body), [`FallbackFetcher`] escalates to a heavier fetcher through the same
//! trait. Swapping in a real browser-backed fetcher is a constructor change,
//! not a pipeline change.

use crate::config::FetchConfig;
use crate::{Result, ScrapeError};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Browser identities rotated across requests
const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:132.0) Gecko/20100101 Firefox/132.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
];

/// Body substrings that identify an anti-bot challenge page
const CHALLENGE_SIGNATURES: [&str; 4] = ["cloudflare", "ddos", "just a moment", "captcha"];

/// Result of one page fetch
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,

    /// Response body
    pub body: String,

    /// Final URL after redirects
    pub final_url: String,
}

/// Classifies a fetched page as blocked
///
/// A page is blocked when the status is non-success, the body carries a known
/// challenge signature, or the body is implausibly small for a content page.
pub fn looks_blocked(page: &FetchedPage, min_plausible_body: usize) -> bool {
    if !(200..300).contains(&page.status) {
        return true;
    }
    let lower = page.body.to_ascii_lowercase();
    if CHALLENGE_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
        return true;
    }
    page.body.len() < min_plausible_body
}

/// One network retrieval: headers, redirects, and timeout included
///
/// Implementations must classify timeouts as [`ScrapeError::Timeout`] so the
/// retry orchestrator can report the right failure reason.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches a URL, optionally presenting a referer for the request context
    async fn fetch(&self, url: &str, referer: Option<&str>) -> Result<FetchedPage>;
}

/// Lightweight HTTP fetcher
///
/// Rotates a browser User-Agent per request and accepts any status: status
/// handling is the blocked-predicate's job, not the transport's.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(config.max_redirects as usize))
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }
}

/// Builds the rotating browser-identity headers for one request
fn browser_headers(referer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let user_agent = USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0]);

    headers.insert(USER_AGENT, HeaderValue::from_static(user_agent));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    if let Some(referer) = referer {
        if let Ok(value) = HeaderValue::from_str(referer) {
            headers.insert(REFERER, value);
        }
    }
    headers
}

async fn send(client: &Client, url: &str, referer: Option<&str>) -> Result<FetchedPage> {
    let response = client
        .get(url)
        .headers(browser_headers(referer))
        .send()
        .await
        .map_err(|e| classify_error(url, e))?;

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let body = response.text().await.map_err(|e| classify_error(url, e))?;

    Ok(FetchedPage {
        status,
        body,
        final_url,
    })
}

fn classify_error(url: &str, error: reqwest::Error) -> ScrapeError {
    if error.is_timeout() {
        ScrapeError::Timeout {
            url: url.to_string(),
        }
    } else {
        ScrapeError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, referer: Option<&str>) -> Result<FetchedPage> {
        tracing::trace!(url, "lightweight fetch");
        send(&self.client, url, referer).await
    }
}

/// Heavier rendering-capable fetch path
///
/// Stands in for a browser-backed capability: a generous timeout, a fresh
/// request, and a fixed settle delay after navigation so challenge scripts
/// and late-loading content have time to resolve. A chromium-backed
/// implementation replaces this struct behind the same trait.
pub struct RenderedFetcher {
    client: Client,
    settle: Duration,
}

impl RenderedFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .redirect(Policy::limited(config.max_redirects as usize))
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self {
            client,
            settle: Duration::from_secs(config.render_settle_secs),
        })
    }
}

#[async_trait]
impl PageFetcher for RenderedFetcher {
    async fn fetch(&self, url: &str, referer: Option<&str>) -> Result<FetchedPage> {
        tracing::debug!(url, "rendered fetch");
        let page = send(&self.client, url, referer).await?;
        tokio::time::sleep(self.settle).await;
        Ok(page)
    }
}

/// Escalating fetcher: lightweight first, heavy when blocked
///
/// The escalation is a strategy swap selected by [`looks_blocked`], never a
/// source-specific branch. When the heavy path also fails, the best available
/// result is returned so extraction can still have a go at it.
pub struct FallbackFetcher {
    primary: Box<dyn PageFetcher>,
    heavy: Box<dyn PageFetcher>,
    min_plausible_body: usize,
}

impl FallbackFetcher {
    pub fn new(
        primary: Box<dyn PageFetcher>,
        heavy: Box<dyn PageFetcher>,
        min_plausible_body: usize,
    ) -> Self {
        Self {
            primary,
            heavy,
            min_plausible_body,
        }
    }

    /// Builds the default pair from config
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        Ok(Self::new(
            Box::new(HttpFetcher::new(config)?),
            Box::new(RenderedFetcher::new(config)?),
            config.min_plausible_body,
        ))
    }
}

#[async_trait]
impl PageFetcher for FallbackFetcher {
    async fn fetch(&self, url: &str, referer: Option<&str>) -> Result<FetchedPage> {
        let primary = self.primary.fetch(url, referer).await;

        match &primary {
            Ok(page) if !looks_blocked(page, self.min_plausible_body) => return primary,
            Ok(page) => {
                tracing::debug!(url, status = page.status, body_len = page.body.len(),
                    "fetch looks blocked; escalating to rendered path");
            }
            Err(err) => {
                tracing::debug!(url, %err, "fetch failed; escalating to rendered path");
            }
        }

        match self.heavy.fetch(url, referer).await {
            Ok(page) => Ok(page),
            // Prefer whatever the lightweight path got over a heavy error.
            Err(heavy_err) => primary.or(Err(heavy_err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(status: u16, body: &str) -> FetchedPage {
        FetchedPage {
            status,
            body: body.to_string(),
            final_url: "https://example.com/".to_string(),
        }
    }

    #[test]
    fn test_blocked_on_error_status() {
        assert!(looks_blocked(&page(403, &"x".repeat(9000)), 5000));
        assert!(looks_blocked(&page(503, &"x".repeat(9000)), 5000));
    }

    #[test]
    fn test_blocked_on_challenge_signature() {
        let body = format!("{}Checking your browser - Cloudflare{}", "x".repeat(4000), "y".repeat(4000));
        assert!(looks_blocked(&page(200, &body), 5000));
    }

    #[test]
    fn test_blocked_on_tiny_body() {
        assert!(looks_blocked(&page(200, "<html>stub</html>"), 5000));
    }

    #[test]
    fn test_plausible_page_not_blocked() {
        assert!(!looks_blocked(&page(200, &"content ".repeat(1000)), 5000));
    }

    #[test]
    fn test_browser_headers_carry_identity_and_referer() {
        let headers = browser_headers(Some("https://example.com/novel/x"));
        assert!(headers.contains_key(USER_AGENT));
        assert!(headers.contains_key(ACCEPT));
        assert_eq!(
            headers.get(REFERER).unwrap().to_str().unwrap(),
            "https://example.com/novel/x"
        );

        let no_referer = browser_headers(None);
        assert!(!no_referer.contains_key(REFERER));
    }

    #[test]
    fn test_user_agents_are_valid_header_values() {
        for ua in USER_AGENTS {
            assert!(HeaderValue::from_static(ua).to_str().is_ok());
        }
    }
}
