//! The scraping pipeline
//!
//! [`Coordinator`] wires the stages together: discovery finds the chapter
//! list, the scheduler dispatches batched workers, each worker runs the
//! retry orchestrator's fetch-and-extract loop through the shared rate
//! limiter, and failures get one bounded recovery pass before assembly.

pub mod coordinator;
pub mod discover;
pub mod extract;
pub mod fetcher;
pub mod limiter;
pub mod retry;
pub mod scheduler;

pub use coordinator::{Coordinator, JobOptions, JobOutcome, ProgressFn};
pub use fetcher::{FallbackFetcher, FetchedPage, HttpFetcher, PageFetcher, RenderedFetcher};
pub use scheduler::CancelFlag;
