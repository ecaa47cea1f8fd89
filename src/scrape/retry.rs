//! Per-chapter retry orchestration
//!
//! Owns the attempt loop for a single chapter: acquire a rate-limiter
//! permit, fetch, extract, and on failure back off exponentially before the
//! next attempt. Every terminal outcome is a [`ChapterContent`], success or
//! placeholder, so the caller never sees a chapter vanish.

use crate::model::{ChapterContent, ChapterRef, FailureReason};
use crate::scrape::extract::extract_chapter;
use crate::scrape::fetcher::{looks_blocked, PageFetcher};
use crate::scrape::limiter::RateLimiter;
use crate::ScrapeError;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Base delay before the second attempt
const BACKOFF_BASE_MS: u64 = 1000;

/// Multiplier applied per additional failed attempt
const BACKOFF_FACTOR: f64 = 1.5;

/// Backoff never grows beyond this
const BACKOFF_CAP_MS: u64 = 10_000;

/// Random extra delay added to every backoff, milliseconds
const JITTER_MAX_MS: u64 = 500;

/// Backoff before attempt `attempt + 1`, without jitter
fn backoff_delay(attempt: u32) -> Duration {
    let exp = (attempt.saturating_sub(2)).min(16);
    let ms = (BACKOFF_BASE_MS as f64 * BACKOFF_FACTOR.powi(exp as i32)) as u64;
    Duration::from_millis(ms.min(BACKOFF_CAP_MS))
}

/// Maps a fetch error to the failure reason recorded on the chapter
fn classify_failure(error: &ScrapeError) -> FailureReason {
    match error {
        ScrapeError::Timeout { .. } => FailureReason::Timeout,
        _ => FailureReason::Blocked,
    }
}

/// Prefers the title found on the chapter page over a generic discovered one
fn better_title(chapter: &ChapterRef, extracted: Option<String>) -> String {
    match extracted {
        Some(title) if chapter.title.starts_with("Chapter ") || chapter.title.is_empty() => title,
        _ => chapter.title.clone(),
    }
}

/// Runs the attempt loop for chapters, one call per chapter per pass
///
/// Cheap to clone; every worker task holds its own handle while the fetcher
/// and limiter stay shared across the job.
#[derive(Clone)]
pub struct RetryOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    limiter: RateLimiter,
    min_plausible_body: usize,
    referer: String,
}

impl RetryOrchestrator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        limiter: RateLimiter,
        min_plausible_body: usize,
        referer: String,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            min_plausible_body,
            referer,
        }
    }

    /// Fetches and extracts one chapter within an attempt budget
    ///
    /// `prior_attempts` carries the count from an earlier pass so the
    /// recorded total spans all passes. The budget is exact: exactly
    /// `budget` fetches happen unless one succeeds first.
    pub async fn fetch_chapter(
        &self,
        chapter: &ChapterRef,
        budget: u32,
        prior_attempts: u32,
    ) -> ChapterContent {
        let mut last_failure = FailureReason::Blocked;

        for attempt in 1..=budget {
            if attempt > 1 {
                let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_MS);
                tokio::time::sleep(backoff_delay(attempt) + Duration::from_millis(jitter)).await;
            }

            let outcome = {
                let _permit = self.limiter.acquire().await;
                self.fetcher.fetch(&chapter.url, Some(&self.referer)).await
            };

            match outcome {
                Ok(page) => {
                    if looks_blocked(&page, self.min_plausible_body) {
                        last_failure = FailureReason::Blocked;
                        tracing::debug!(
                            index = chapter.index,
                            attempt,
                            status = page.status,
                            "chapter fetch blocked"
                        );
                        continue;
                    }
                    match extract_chapter(&page.body) {
                        Some(extracted) => {
                            let mut chapter = chapter.clone();
                            chapter.title = better_title(&chapter, extracted.title);
                            tracing::debug!(
                                index = chapter.index,
                                attempt,
                                strategy = extracted.strategy,
                                "chapter extracted"
                            );
                            return ChapterContent::success(
                                chapter,
                                extracted.body,
                                prior_attempts + attempt,
                            );
                        }
                        None => {
                            last_failure = FailureReason::ExtractionEmpty;
                            tracing::debug!(
                                index = chapter.index,
                                attempt,
                                "page fetched but no strategy produced text"
                            );
                        }
                    }
                }
                Err(error) => {
                    last_failure = classify_failure(&error);
                    tracing::debug!(index = chapter.index, attempt, %error, "chapter fetch failed");
                }
            }
        }

        ChapterContent::placeholder(chapter.clone(), last_failure, prior_attempts + budget)
    }
}
