//! Timed rounds: a countdown in the status line and a winner announcement

use crate::store::StateStore;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub fn countdown_status(remaining_secs: u64) -> String {
    format!("Time remaining: {} seconds", remaining_secs)
}

pub fn game_over_status(leader: Option<(String, u32)>) -> String {
    match leader {
        Some((identity, collected)) => format!(
            "GAME OVER! Winner: {} with {} collectibles",
            identity, collected
        ),
        None => "GAME OVER! No players joined".to_string(),
    }
}

/// Runs a round of `length` on the store's status line.
///
/// Updates are still accepted after the round ends; only the status changes.
pub async fn run_round(store: Arc<StateStore>, length: Duration, tick: Duration) {
    let total = length.as_secs();
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    for remaining in (1..=total).rev() {
        ticker.tick().await;
        store.set_status(countdown_status(remaining)).await;
    }
    ticker.tick().await;

    let status = game_over_status(store.leader().await);
    info!("{}", status);
    store.set_status(status).await;
}

/// Spawns [`run_round`] with a one second tick
pub fn spawn_round(store: Arc<StateStore>, length: Duration) -> JoinHandle<()> {
    tokio::spawn(run_round(store, length, Duration::from_secs(1)))
}
