//! Background task that evicts idle sessions on a fixed cadence.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::store::SessionStore;

/// Shortest sweep period, whatever the TTL.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Sweep period for a given idle TTL: half the TTL, at least one second.
pub fn sweep_interval(idle_ttl: Duration) -> Duration {
    (idle_ttl / 2).max(MIN_SWEEP_INTERVAL)
}

/// Spawn a task calling [`SessionStore::evict_idle`] every `period` until
/// `shutdown` fires.
pub fn spawn_idle_sweeper(
    store: SessionStore,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let removed = store.evict_idle();
                    if removed > 0 {
                        info!(removed, remaining = store.len(), "Idle sessions swept");
                    }
                }
            }
        }
    })
}
