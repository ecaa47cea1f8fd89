//! Batched dispatch with cooperative cancellation
//!
//! A pass over the chapter list runs in fixed-size batches: every chapter of
//! a batch is spawned concurrently, the whole batch is awaited as a barrier,
//! and a pause separates consecutive batches. Each work item carries the slot
//! it will be written to, so completion order never affects document order.
//!
//! Cancellation is checked once per batch boundary. In-flight fetches of the
//! current batch run to completion; no further batch is dispatched.

use crate::model::{ChapterContent, ChapterRef, FailureReason};
use crate::{Result, ScrapeError};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared cancellation signal for one job
///
/// Flipped once by the owner, observed by the scheduler at batch boundaries.
/// Never reset.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs one pass of chapter work in batches
pub struct BatchScheduler {
    batch_size: usize,
    batch_pause: Duration,
    cancel: CancelFlag,
}

impl BatchScheduler {
    pub fn new(batch_size: u32, batch_pause_ms: u64, cancel: CancelFlag) -> Self {
        Self {
            batch_size: (batch_size as usize).max(1),
            batch_pause: Duration::from_millis(batch_pause_ms),
            cancel,
        }
    }

    /// Dispatches `work` in batches and reports each completion
    ///
    /// Every item pairs a chapter with the document slot its result belongs
    /// to; `on_complete` fires once per finished chapter with that slot.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::Cancelled`] when the cancel flag is observed at a
    /// batch boundary. Results from earlier batches have already been
    /// reported through `on_complete` by then.
    pub async fn run_pass<W, Fut>(
        &self,
        work: Vec<(usize, ChapterRef)>,
        worker: W,
        mut on_complete: impl FnMut(usize, ChapterContent),
    ) -> Result<()>
    where
        W: Fn(ChapterRef) -> Fut,
        Fut: Future<Output = ChapterContent> + Send + 'static,
    {
        let total_batches = work.len().div_ceil(self.batch_size);

        for (batch_index, batch) in work.chunks(self.batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!(
                    completed_batches = batch_index,
                    total_batches,
                    "cancellation observed; stopping dispatch"
                );
                return Err(ScrapeError::Cancelled);
            }

            tracing::debug!(
                batch = batch_index + 1,
                total_batches,
                size = batch.len(),
                "dispatching batch"
            );

            let handles: Vec<(usize, ChapterRef, tokio::task::JoinHandle<ChapterContent>)> = batch
                .iter()
                .map(|(slot, chapter)| {
                    (*slot, chapter.clone(), tokio::spawn(worker(chapter.clone())))
                })
                .collect();

            // Whole-batch barrier.
            for (slot, chapter, handle) in handles {
                let content = match handle.await {
                    Ok(content) => content,
                    Err(join_error) => {
                        tracing::warn!(index = chapter.index, %join_error, "chapter task aborted");
                        ChapterContent::placeholder(chapter, FailureReason::Blocked, 0)
                    }
                };
                on_complete(slot, content);
            }

            if batch_index + 1 < total_batches {
                tokio::time::sleep(self.batch_pause).await;
            }
        }

        Ok(())
    }
}
