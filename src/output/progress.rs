//! Throttled progress reporting
//!
//! Completion events arrive in bursts (one per chapter, a batch at a time),
//! so the reporter rate-limits what becomes externally visible. The terminal
//! update is exempt from throttling: the final state is always emitted.

use tokio::time::Instant;

/// Cells in the rendered progress bar
const BAR_WIDTH: usize = 15;

/// ETAs under this read as "almost done"
const ALMOST_DONE_SECS: u64 = 5;

/// Tracks job progress and decides which updates are worth emitting
pub struct ProgressReporter {
    interval_secs: u64,
    started: Instant,
    last_emit: Option<Instant>,
}

impl ProgressReporter {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval_secs,
            started: Instant::now(),
            last_emit: None,
        }
    }

    /// Records a progress state and returns the rendered line when the
    /// update is externally visible
    ///
    /// Intermediate updates inside the throttle window return None and are
    /// dropped, not queued. The terminal update (`completed == total`)
    /// always renders.
    pub fn update(&mut self, completed: u32, total: u32) -> Option<String> {
        let now = Instant::now();
        let terminal = completed >= total;

        if !terminal {
            if let Some(last) = self.last_emit {
                if now.duration_since(last).as_secs() < self.interval_secs {
                    return None;
                }
            }
        }

        self.last_emit = Some(now);
        let elapsed = now.duration_since(self.started).as_secs_f64();
        Some(render_line(completed, total, elapsed))
    }
}

/// Renders one progress line: bar, percentage, counts, and ETA
fn render_line(completed: u32, total: u32, elapsed_secs: f64) -> String {
    format!(
        "[{}] {:>3}% ({}/{}) ETA {}",
        render_bar(completed, total),
        percent(completed, total),
        completed,
        total,
        eta(completed, total, elapsed_secs)
    )
}

fn percent(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 100;
    }
    completed * 100 / total
}

/// Fixed-width bar of filled and empty cells
fn render_bar(completed: u32, total: u32) -> String {
    let filled = if total == 0 {
        BAR_WIDTH
    } else {
        (completed as usize * BAR_WIDTH) / total as usize
    };
    let filled = filled.min(BAR_WIDTH);
    format!("{}{}", "■".repeat(filled), "□".repeat(BAR_WIDTH - filled))
}

/// Estimated time remaining from the observed completion rate
///
/// With nothing completed yet there is no rate to project from, so the ETA
/// reads "calculating" rather than a made-up number.
fn eta(completed: u32, total: u32, elapsed_secs: f64) -> String {
    if completed >= total {
        return "done".to_string();
    }
    if completed == 0 || elapsed_secs <= 0.0 {
        return "calculating".to_string();
    }

    let rate = f64::from(completed) / elapsed_secs;
    let remaining = (f64::from(total - completed) / rate).round() as u64;

    if remaining < ALMOST_DONE_SECS {
        "almost done".to_string()
    } else if remaining < 60 {
        format!("~{remaining}s")
    } else {
        format!("~{}m {}s", remaining / 60, remaining % 60)
    }
}
