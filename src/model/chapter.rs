//! Chapter references and per-chapter results

use serde::Serialize;

/// Where a chapter reference came from
///
/// Listing pages on some sources only render a sample of the chapter list;
/// the rest is extrapolated from the numeric pattern in the known URLs.
/// Extrapolated refs are speculative, so a miss on an `Inferred` chapter is
/// expected noise while a miss on an `Observed` one is anomalous. The flag
/// keeps the two distinguishable all the way into the job summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RefOrigin {
    /// The URL was found on a listing page
    Observed,
    /// The URL was synthesized by sparse-sample extrapolation
    Inferred,
}

/// A single discovered (or inferred) chapter: position, title, and URL
///
/// Immutable once created. `index` is 1-based and stable: it is assigned at
/// discovery time and decides the chapter's slot in the final document no
/// matter when its fetch completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterRef {
    /// 1-based position within the work
    pub index: u32,

    /// Chapter title as discovered; may be a generic fallback
    pub title: String,

    /// Normalized chapter URL (uniqueness key)
    pub url: String,

    /// Whether this ref was observed or extrapolated
    pub origin: RefOrigin,
}

impl ChapterRef {
    pub fn new(index: u32, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            url: url.into(),
            origin: RefOrigin::Observed,
        }
    }

    pub fn inferred(index: u32, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            url: url.into(),
            origin: RefOrigin::Inferred,
        }
    }
}

/// Terminal status of a chapter within one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChapterStatus {
    Success,
    Failed,
}

/// Why a chapter could not be retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// The fetch timed out on every attempt
    Timeout,

    /// Every fetch was refused or served an anti-bot interstitial
    Blocked,

    /// Pages were fetched but no strategy produced usable text
    ExtractionEmpty,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::Blocked => write!(f, "blocked"),
            FailureReason::ExtractionEmpty => write!(f, "extraction empty"),
        }
    }
}

/// The outcome of fetching and extracting one chapter
///
/// Created by the worker that owns the chapter's slot and written there
/// exactly once per pass; a `Failed` content may be replaced by a `Success`
/// during the bounded second retry pass, never after.
#[derive(Debug, Clone)]
pub struct ChapterContent {
    pub chapter: ChapterRef,

    /// Extracted chapter markup, or a placeholder when `status` is `Failed`
    pub body: String,

    pub status: ChapterStatus,

    /// Total fetch attempts spent on this chapter (all passes)
    pub attempts: u32,

    pub failure: Option<FailureReason>,
}

impl ChapterContent {
    /// A successfully extracted chapter
    pub fn success(chapter: ChapterRef, body: String, attempts: u32) -> Self {
        Self {
            chapter,
            body,
            status: ChapterStatus::Success,
            attempts,
            failure: None,
        }
    }

    /// A permanent failure, with a placeholder body that keeps the chapter's
    /// position (and its URL, so the reader can follow up manually)
    pub fn placeholder(chapter: ChapterRef, reason: FailureReason, attempts: u32) -> Self {
        let body = format!(
            "<h2>{}</h2><p><em>This chapter could not be retrieved after {} attempts ({}). \
             It may be behind a paywall, protected by anti-automation defenses, or \
             temporarily unavailable.</em></p><p>Source: {}</p>",
            chapter.title, attempts, reason, chapter.url
        );
        Self {
            chapter,
            body,
            status: ChapterStatus::Failed,
            attempts,
            failure: Some(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ChapterStatus::Success
    }
}
