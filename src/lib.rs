//! Webtome: a web-serial scraper and assembler
//!
//! This crate downloads a multi-chapter serialized work from loosely-structured
//! HTML sources: it discovers the chapter list, fetches and extracts every
//! chapter concurrently with retries, and assembles the results into one
//! ordered in-memory document plus a job summary. Packaging the document into
//! a distributable container is left to the caller.

pub mod config;
pub mod model;
pub mod output;
pub mod scrape;
pub mod url;

use thiserror::Error;

/// Main error type for webtome operations
///
/// Per-chapter failures (timeouts, blocked fetches, empty extractions) are
/// *not* errors: they are retried and, when unrecoverable, reported as
/// placeholder chapters in the final document. Only job-level conditions
/// surface here.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No chapters discovered at {url}")]
    DiscoveryEmpty { url: String },

    #[error("Job cancelled")]
    Cancelled,

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for webtome operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{ChapterContent, ChapterRef, ChapterStatus, Document, FailureReason, JobSummary};
pub use scrape::{CancelFlag, Coordinator};
