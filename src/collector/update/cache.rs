//! Last-good update snapshot shared between the poll loop and scrapes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::collector::sample::Sample;

/// Result of one successful update search, ready to be replayed on scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSnapshot {
    /// Pending-update samples followed by the query duration and timestamp samples.
    pub samples: Vec<Sample>,
    /// Number of pending updates that made it into `samples`.
    pub pending: usize,
    pub query_duration: Duration,
    pub scrape_timestamp: DateTime<Utc>,
}

/// Snapshot holder with atomic replacement.
///
/// The writer builds a complete snapshot before taking the lock and only
/// swaps a pointer under it; readers clone the pointer and drop the lock
/// straight away. A reader therefore sees either the previous snapshot or
/// the new one, never a mix.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    current: RwLock<Option<Arc<UpdateSnapshot>>>,
    generation: AtomicU64,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current snapshot.
    pub fn publish(&self, snapshot: UpdateSnapshot) {
        let snapshot = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Drops the current snapshot so scrapes report "no data" instead of stale values.
    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Current snapshot, if the last cycle succeeded.
    pub fn load(&self) -> Option<Arc<UpdateSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of publish/clear operations so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
