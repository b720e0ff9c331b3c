use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::info;

use crate::state::{SharedState, puzzle_pool::PruneReport};

/// Periodically remove completed puzzles and orphaned assets.
///
/// The first sweep runs one full period after startup.
pub async fn run_puzzle_sweeper(state: SharedState) {
    let period = state.config().prune_interval();
    info!(period_secs = period.as_secs(), "puzzle sweeper started");
    let mut ticker = ticker(period);
    loop {
        ticker.tick().await;
        sweep_puzzles(&state).await;
    }
}

/// Periodically drop user counters that point at vanished puzzles.
pub async fn run_user_sweeper(state: SharedState) {
    let period = state.config().prune_interval();
    info!(period_secs = period.as_secs(), "user sweeper started");
    let mut ticker = ticker(period);
    loop {
        ticker.tick().await;
        sweep_users(&state);
    }
}

/// One puzzle sweep.
pub async fn sweep_puzzles(state: &SharedState) -> PruneReport {
    state.puzzles().prune().await
}

/// One user sweep. Returns the number of counters removed.
pub fn sweep_users(state: &SharedState) -> usize {
    state.users().prune(state.puzzles())
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
