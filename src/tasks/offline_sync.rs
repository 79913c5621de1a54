//! Offline Sync Task
//!
//! Background task that replays the offline queue when the connectivity
//! signal goes online, and polls periodically while online.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::manager::{CacheManager, SyncOutcome};
use crate::offline::Connectivity;

/// Spawns a background task that keeps the offline queue draining.
///
/// A replay pass starts whenever `connectivity` transitions to online, and
/// every `interval` while online with a non-empty queue. Overlapping
/// triggers are absorbed by the manager's in-flight flag.
///
/// # Returns
/// A JoinHandle for the spawned task; abort it to stop polling.
///
/// # Example
/// ```ignore
/// let connectivity = Connectivity::new(false);
/// let handle = spawn_offline_sync_task(manager.clone(), connectivity.clone(), Duration::from_secs(30));
/// connectivity.set_online(true); // triggers a replay pass
/// handle.abort();
/// ```
pub fn spawn_offline_sync_task(
    manager: CacheManager,
    connectivity: Connectivity,
    interval: Duration,
) -> JoinHandle<()> {
    // Subscribe before spawning so no transition is missed
    let mut online_rx = connectivity.subscribe();

    tokio::spawn(async move {
        info!("Starting offline sync task with interval of {:?}", interval);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if connectivity.is_online() && manager.offline_queue_size() > 0 {
                        report(manager.sync_offline_queue().await);
                    }
                }
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *online_rx.borrow_and_update();
                    if online {
                        info!("Back online, replaying offline queue");
                        report(manager.sync_offline_queue().await);
                    }
                }
            }
        }
    })
}

fn report(outcome: SyncOutcome) {
    match outcome {
        SyncOutcome::Completed { processed } => {
            debug!("Offline sync task: replayed {} actions", processed.len())
        }
        SyncOutcome::Halted { processed, .. } => {
            debug!("Offline sync task: halted after {} actions", processed.len())
        }
        SyncOutcome::AlreadyRunning | SyncOutcome::Empty => {
            debug!("Offline sync task: nothing to do")
        }
    }
}
