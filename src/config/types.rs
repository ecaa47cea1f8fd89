use serde::Deserialize;

/// Main configuration structure for webtome
///
/// Every table is optional in the TOML file; omitted tables take the
/// defaults below, which match the behavior of the sources this was tuned
/// against.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Discovery and batching behavior
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    /// Default chapter limit when the caller does not pass one (1-200)
    #[serde(rename = "max-chapters")]
    pub max_chapters: u32,

    /// Chapters fetched concurrently per batch (1-16)
    #[serde(rename = "batch-size")]
    pub batch_size: u32,

    /// Pause between batches, milliseconds
    #[serde(rename = "batch-pause-ms")]
    pub batch_pause_ms: u64,

    /// A discovery rule that finds at least this many links short-circuits
    /// the remaining rules
    #[serde(rename = "min-chapter-links")]
    pub min_chapter_links: u32,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_chapters: 25,
            batch_size: 8,
            batch_pause_ms: 1000,
            min_chapter_links: 5,
        }
    }
}

/// Network behavior shared by all fetches of a job
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout, seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Maximum redirect hops before a fetch is abandoned
    #[serde(rename = "max-redirects")]
    pub max_redirects: u32,

    /// Job-wide cap on simultaneously in-flight fetches
    #[serde(rename = "max-in-flight")]
    pub max_in_flight: u32,

    /// Minimum spacing between fetch dispatches, milliseconds
    #[serde(rename = "min-dispatch-interval-ms")]
    pub min_dispatch_interval_ms: u64,

    /// Bodies shorter than this are treated as blocked for full content
    /// pages (interstitials and challenge pages are tiny)
    #[serde(rename = "min-plausible-body")]
    pub min_plausible_body: usize,

    /// Settle delay after navigation on the rendering-capable fallback
    /// path, seconds
    #[serde(rename = "render-settle-secs")]
    pub render_settle_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_redirects: 5,
            max_in_flight: 12,
            min_dispatch_interval_ms: 50,
            min_plausible_body: 5000,
            render_settle_secs: 8,
        }
    }
}

/// Retry budgets for the two passes
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts per chapter during the first pass
    #[serde(rename = "pass1-attempts")]
    pub pass1_attempts: u32,

    /// Attempts per chapter during the recovery pass
    #[serde(rename = "pass2-attempts")]
    pub pass2_attempts: u32,

    /// Skip the recovery pass entirely when more than this many chapters
    /// failed pass one; a systemic block is not worth hammering
    #[serde(rename = "second-pass-ceiling")]
    pub second_pass_ceiling: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            pass1_attempts: 3,
            pass2_attempts: 10,
            second_pass_ceiling: 50,
        }
    }
}

/// Output and reporting behavior
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory the raw assembled document is written into
    #[serde(rename = "document-dir")]
    pub document_dir: String,

    /// Minimum interval between externally visible progress updates,
    /// seconds
    #[serde(rename = "progress-interval-secs")]
    pub progress_interval_secs: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            document_dir: "./books".to_string(),
            progress_interval_secs: 2,
        }
    }
}
