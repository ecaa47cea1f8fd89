//! Job coordination
//!
//! One [`Coordinator`] run is one job: fetch the listing, discover the
//! chapter list, run the first pass in batches, optionally run the bounded
//! recovery pass over the failures, and assemble the document. The
//! coordinator owns the job-scoped collaborators (fetcher, rate limiter,
//! cancel flag) and hands clones to the workers.

use crate::config::{validate_chapter_limit, Config, RetryConfig};
use crate::model::{ChapterContent, ChapterRef, Document, JobSummary};
use crate::output::assembler::{assemble, DocumentMeta};
use crate::output::progress::ProgressReporter;
use crate::scrape::discover::discover_chapters;
use crate::scrape::extract::extract_work_title;
use crate::scrape::fetcher::{FallbackFetcher, PageFetcher};
use crate::scrape::limiter::RateLimiter;
use crate::scrape::retry::RetryOrchestrator;
use crate::scrape::scheduler::{BatchScheduler, CancelFlag};
use crate::url::normalize_url;
use crate::{ConfigError, Result, ScrapeError};
use rand::Rng;
use scraper::Html;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Delay range before the recovery pass starts, milliseconds
const PASS2_DELAY_MS: std::ops::RangeInclusive<u64> = 2000..=5000;

/// Collaborator-supplied progress observer, invoked with (completed, total)
///
/// Ticks arrive already throttled: intermediate updates inside the throttle
/// window are dropped, the terminal update always arrives.
pub type ProgressFn = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// Caller-facing parameters of one job
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Listing page URL of the work
    pub url: String,

    /// Chapter limit; the configured default applies when None
    pub limit: Option<u32>,

    /// Overrides the title extracted from the listing
    pub title_override: Option<String>,
}

/// What a completed job hands back
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub document: Document,
    pub summary: JobSummary,
}

/// One run in flight
///
/// Owns the ordered chapter refs, the pre-assigned result slot per ref,
/// the retry budgets, and the cancel flag. Workers write only their own
/// slot; the job is the single place run state lives between passes.
struct ScrapeJob {
    refs: Vec<ChapterRef>,
    slots: Vec<Option<ChapterContent>>,
    pass1_budget: u32,
    pass2_budget: u32,
    second_pass_ceiling: usize,
    cancel: CancelFlag,
}

impl ScrapeJob {
    fn new(refs: Vec<ChapterRef>, retry: &RetryConfig, cancel: CancelFlag) -> Self {
        let slots = vec![None; refs.len()];
        Self {
            refs,
            slots,
            pass1_budget: retry.pass1_attempts,
            pass2_budget: retry.pass2_attempts,
            second_pass_ceiling: retry.second_pass_ceiling as usize,
            cancel,
        }
    }

    /// Every chapter paired with its slot, for the first pass
    fn all_work(&self) -> Vec<(usize, ChapterRef)> {
        self.refs.iter().cloned().enumerate().collect()
    }

    /// Chapters whose slot holds a failure, for the recovery pass
    fn failed_work(&self) -> Vec<(usize, ChapterRef)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let content = slot.as_ref()?;
                (!content.is_success()).then(|| (i, content.chapter.clone()))
            })
            .collect()
    }

    /// Attempts already spent per failed chapter, keyed by chapter index
    fn prior_attempts(&self) -> HashMap<u32, u32> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref())
            .filter(|content| !content.is_success())
            .map(|content| (content.chapter.index, content.attempts))
            .collect()
    }
}

/// Runs scraping jobs end to end
pub struct Coordinator {
    config: Config,
    fetcher: Arc<dyn PageFetcher>,
    cancel: CancelFlag,
    progress: Option<ProgressFn>,
}

impl Coordinator {
    /// Builds a coordinator with the default escalating fetcher
    pub fn new(config: Config) -> Result<Self> {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(FallbackFetcher::from_config(&config.fetch)?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Builds a coordinator around a caller-supplied fetcher
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            config,
            fetcher,
            cancel: CancelFlag::new(),
            progress: None,
        }
    }

    /// Registers a callback observing the job's throttled progress ticks
    pub fn with_progress(mut self, callback: impl Fn(u32, u32) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Handle for requesting cancellation from another task
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Runs one job to completion
    ///
    /// # Errors
    ///
    /// * [`ScrapeError::DiscoveryEmpty`] when the listing yields no chapters
    /// * [`ScrapeError::Cancelled`] when cancellation was observed; partial
    ///   results are discarded and no document is produced
    /// * Config, parse, and listing-fetch errors pass through
    pub async fn run(&self, options: JobOptions) -> Result<JobOutcome> {
        let limit = options.limit.unwrap_or(self.config.scrape.max_chapters);
        validate_chapter_limit(limit)?;

        let base = parse_listing_url(&options.url)?;
        tracing::info!(url = %base, limit, "starting job");

        if self.cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }

        let listing = self.fetcher.fetch(base.as_str(), None).await?;
        let meta = listing_meta(&listing.body, options.title_override);
        tracing::info!(title = %meta.title, "listing fetched");

        let refs = discover_chapters(
            &listing.body,
            &base,
            self.fetcher.as_ref(),
            &self.config.scrape,
            limit,
        )
        .await?;
        tracing::info!(chapters = refs.len(), "chapter list discovered");

        let mut job = ScrapeJob::new(refs, &self.config.retry, self.cancel.clone());
        let orchestrator = RetryOrchestrator::new(
            Arc::clone(&self.fetcher),
            RateLimiter::new(&self.config.fetch),
            self.config.fetch.min_plausible_body,
            base.to_string(),
        );
        let scheduler = BatchScheduler::new(
            self.config.scrape.batch_size,
            self.config.scrape.batch_pause_ms,
            self.cancel.clone(),
        );

        let mut progress = ProgressReporter::new(self.config.output.progress_interval_secs);
        let total = job.refs.len() as u32;
        let mut completed = 0u32;

        // Pass one: every chapter, first-pass budget.
        let pass1_work = job.all_work();
        let pass1_budget = job.pass1_budget;
        let pass1_orch = orchestrator.clone();
        scheduler
            .run_pass(
                pass1_work,
                move |chapter| {
                    let orch = pass1_orch.clone();
                    async move { orch.fetch_chapter(&chapter, pass1_budget, 0).await }
                },
                |slot, content| {
                    completed += 1;
                    self.emit_progress(&mut progress, completed, total);
                    job.slots[slot] = Some(content);
                },
            )
            .await?;

        self.recovery_pass(&scheduler, &orchestrator, &mut job, &mut progress)
            .await?;

        let (document, summary) = assemble(meta, &job.refs, job.slots);
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "job finished"
        );
        Ok(JobOutcome { document, summary })
    }

    /// Emits one throttled progress update, to the log and to the callback
    fn emit_progress(&self, progress: &mut ProgressReporter, completed: u32, total: u32) {
        if let Some(line) = progress.update(completed, total) {
            tracing::info!("{line}");
            if let Some(notify) = &self.progress {
                notify(completed, total);
            }
        }
    }

    /// The bounded second pass over permanent first-pass failures
    ///
    /// Skipped entirely when nothing failed, and when more chapters failed
    /// than the ceiling allows: that level of failure means the source is
    /// blocking systematically and more attempts only make it worse.
    /// Progress ticks resume from the pre-recovery success count and run
    /// back up to the job total as retried chapters go terminal again.
    async fn recovery_pass(
        &self,
        scheduler: &BatchScheduler,
        orchestrator: &RetryOrchestrator,
        job: &mut ScrapeJob,
        progress: &mut ProgressReporter,
    ) -> Result<()> {
        let failed = job.failed_work();
        if failed.is_empty() {
            return Ok(());
        }
        if failed.len() > job.second_pass_ceiling {
            tracing::warn!(
                failed = failed.len(),
                ceiling = job.second_pass_ceiling,
                "too many failures for a recovery pass; the source is likely blocking"
            );
            return Ok(());
        }
        if job.cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }

        let delay = rand::thread_rng().gen_range(PASS2_DELAY_MS);
        tracing::info!(failed = failed.len(), delay_ms = delay, "starting recovery pass");
        tokio::time::sleep(Duration::from_millis(delay)).await;

        let total = job.refs.len() as u32;
        let done_base = total - failed.len() as u32;
        let mut processed = 0u32;

        let prior = Arc::new(job.prior_attempts());
        let slots = &mut job.slots;
        let budget = job.pass2_budget;
        let orch = orchestrator.clone();
        scheduler
            .run_pass(
                failed,
                move |chapter| {
                    let orch = orch.clone();
                    let prior = Arc::clone(&prior);
                    async move {
                        let prior_attempts = prior.get(&chapter.index).copied().unwrap_or(0);
                        orch.fetch_chapter(&chapter, budget, prior_attempts).await
                    }
                },
                |slot, content| {
                    if content.is_success() {
                        tracing::info!(index = content.chapter.index, "chapter recovered");
                    }
                    processed += 1;
                    self.emit_progress(progress, done_base + processed, total);
                    slots[slot] = Some(content);
                },
            )
            .await
    }
}

fn parse_listing_url(input: &str) -> Result<Url> {
    let parsed = Url::parse(input.trim())?;
    normalize_url(parsed.as_str()).ok_or_else(|| {
        ScrapeError::Config(ConfigError::Validation(format!(
            "listing URL must be http or https, got {}",
            parsed.scheme()
        )))
    })
}

/// Pulls the work title out of the listing markup
///
/// Author and cover stay at their placeholder defaults; filling them is the
/// metadata collaborator's job, not this pipeline's.
fn listing_meta(html: &str, title_override: Option<String>) -> DocumentMeta {
    let doc = Html::parse_document(html);
    let mut meta = DocumentMeta::default();
    if let Some(title) = extract_work_title(&doc) {
        meta.title = title;
    }
    if let Some(title) = title_override {
        meta.title = title;
    }
    meta
}
