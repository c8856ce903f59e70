//! Background refresh loop for the update collector.
//!
//! ```text
//! Polling ──publish/clear──► IdleWaiting ──interval elapsed──► Polling
//!                                 │
//!                                 └──shutdown signal/disconnect──► ShuttingDown
//! ```
//!
//! A search already running cannot be interrupted; shutdown only prevents the
//! next cycle.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use tracing::{debug, error, info};

use super::cache::SnapshotCache;
use super::walker::fetch_updates;
use crate::com::traits::UpdateSession;

/// Runs one refresh cycle and publishes its outcome.
///
/// On failure the cache is cleared so scrapes do not serve stale data.
pub fn refresh<S: UpdateSession>(session: &S, cache: &SnapshotCache) -> bool {
    match fetch_updates(session) {
        Ok(snapshot) => {
            info!(
                pending = snapshot.pending,
                duration_ms = snapshot.query_duration.as_millis() as u64,
                "pending updates refreshed"
            );
            cache.publish(snapshot);
            true
        }
        Err(e) => {
            error!(error = %e, "pending update refresh failed");
            cache.clear();
            false
        }
    }
}

/// Refreshes `cache` every `interval` until `shutdown` fires or is dropped.
///
/// Returns the number of cycles run.
pub fn poll_loop<S: UpdateSession>(
    session: &S,
    cache: &SnapshotCache,
    interval: Duration,
    shutdown: &Receiver<()>,
) -> u64 {
    let mut cycles = 0;
    loop {
        refresh(session, cache);
        cycles += 1;

        match shutdown.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                debug!(cycles, "update poll interval elapsed");
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!(cycles, "update poll loop shutting down");
                return cycles;
            }
        }
    }
}
