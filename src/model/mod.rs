//! Core data model for a scrape job
//!
//! A job turns an ordered list of [`ChapterRef`]s into one [`ChapterContent`]
//! per slot and finally a [`Document`]. The types here carry no behavior
//! beyond their own state transitions; all scraping logic lives in
//! [`crate::scrape`].

mod chapter;
mod document;

pub use chapter::{ChapterContent, ChapterRef, ChapterStatus, FailureReason, RefOrigin};
pub use document::{Document, FailedChapter, JobSummary};
