use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SessionState;

/// Progress snapshot for the surrounding application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Items still in the queue
    pub remaining: usize,
    /// Items in the ledger
    pub processed: usize,
    pub total: usize,
    pub swiped_today: u32,
    /// Time to finish the queue at the pace since the last build
    pub eta: Option<Duration>,
}

impl SessionStats {
    pub fn compute(state: &SessionState, now: DateTime<Utc>) -> Self {
        let remaining = state.queue.len();
        let processed = state.ledger.len();
        let total = match state.progress.built_total {
            0 => processed + remaining,
            built => built,
        };

        Self {
            remaining,
            processed,
            total,
            swiped_today: state.counter.on(now.date_naive()),
            eta: eta(state, now),
        }
    }

    /// Fraction of `total` already processed, in `[0, 1]`.
    pub fn fraction_done(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.processed as f64 / self.total as f64).min(1.0)
        }
    }
}

fn eta(state: &SessionState, now: DateTime<Utc>) -> Option<Duration> {
    let decided = state.progress.decided_since_build;
    let built_at = state.progress.built_at?;
    if decided == 0 {
        return None;
    }
    let elapsed = (now - built_at).to_std().ok()?.max(Duration::from_secs(1));
    let pace = elapsed / decided as u32;
    Some(pace * state.queue.len() as u32)
}

/// `~3m 20s`
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    format!("~{}m {}s", secs / 60, secs % 60)
}
