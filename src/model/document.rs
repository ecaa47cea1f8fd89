//! The assembled document and its job summary

use crate::model::{ChapterContent, ChapterStatus, FailureReason, RefOrigin};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The final in-memory document handed to packaging
///
/// Chapters are in strict discovery order: `chapters[i].chapter.index == i+1`
/// always holds, regardless of the order concurrent fetches completed in.
/// Failed chapters occupy their slots as placeholders. Title comes from the
/// listing page (or a caller override); author and cover are filled by the
/// metadata collaborator and default to placeholders here.
#[derive(Debug, Clone)]
pub struct Document {
    pub title: String,
    pub author: String,
    pub cover_url: Option<String>,
    pub chapters: Vec<ChapterContent>,
}

impl Document {
    /// Number of successfully retrieved chapters
    pub fn succeeded(&self) -> usize {
        self.chapters.iter().filter(|c| c.is_success()).count()
    }
}

/// One permanently failed chapter, as reported in the summary
#[derive(Debug, Clone, Serialize)]
pub struct FailedChapter {
    pub index: u32,
    pub title: String,
    pub url: String,
    pub reason: FailureReason,
    /// True when the chapter URL was extrapolated rather than observed;
    /// misses on inferred chapters are expected, not anomalous
    pub inferred: bool,
}

/// Outcome counts for a completed job
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failed_chapters: Vec<FailedChapter>,
    pub finished_at: DateTime<Utc>,
}

impl JobSummary {
    /// Builds the summary from terminal chapter slots
    pub fn from_chapters(chapters: &[ChapterContent]) -> Self {
        let failed_chapters: Vec<FailedChapter> = chapters
            .iter()
            .filter(|c| c.status == ChapterStatus::Failed)
            .map(|c| FailedChapter {
                index: c.chapter.index,
                title: c.chapter.title.clone(),
                url: c.chapter.url.clone(),
                reason: c.failure.unwrap_or(FailureReason::ExtractionEmpty),
                inferred: c.chapter.origin == RefOrigin::Inferred,
            })
            .collect();

        Self {
            requested: chapters.len(),
            succeeded: chapters.len() - failed_chapters.len(),
            failed: failed_chapters.len(),
            failed_chapters,
            finished_at: Utc::now(),
        }
    }
}
