//! In-memory COM backends for testing collectors without Windows.
//!
//! The mocks behave like the real object graphs where it matters to the
//! collectors: objects are handed out one at a time, Task Scheduler paths are
//! built the way the service builds them, and every failure point the walkers
//! care about can be injected. A shared [`MockProbe`] records how the graph was
//! used (live object count, calling threads, concurrent calls), so tests can
//! check release discipline and thread affinity.

mod scenarios;
mod task_scheduler;
mod update_agent;

pub use task_scheduler::{MockFolder, MockTask, MockTaskScheduler, MockTaskService};
pub use update_agent::{MockCategory, MockUpdate, MockUpdateAgent, MockUpdateSession};

use std::collections::HashSet;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use super::ComError;
use super::apartment::{ComRuntime, InitOutcome, S_OK};

/// Counters shared between a [`MockRuntime`] and the test observing it.
#[derive(Debug, Clone, Default)]
pub struct RuntimeStats {
    initialized: Arc<AtomicUsize>,
    uninitialized: Arc<AtomicUsize>,
}

impl RuntimeStats {
    /// Number of successful initializations.
    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn uninitialized(&self) -> usize {
        self.uninitialized.load(Ordering::SeqCst)
    }
}

/// COM runtime returning a fixed HRESULT from initialize.
#[derive(Debug, Clone)]
pub struct MockRuntime {
    hresult: i32,
    stats: RuntimeStats,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::with_hresult(S_OK)
    }

    pub fn with_hresult(hresult: i32) -> Self {
        Self {
            hresult,
            stats: RuntimeStats::default(),
        }
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats.clone()
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ComRuntime for MockRuntime {
    fn initialize(&self) -> Result<InitOutcome, ComError> {
        let outcome = InitOutcome::from_hresult(self.hresult)?;
        self.stats.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(outcome)
    }

    fn uninitialize(&self) {
        self.stats.uninitialized.fetch_add(1, Ordering::SeqCst);
    }
}

/// Usage recorder shared by all objects of one mock graph.
#[derive(Debug, Default)]
pub struct MockProbe {
    live: AtomicIsize,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    threads: Mutex<HashSet<ThreadId>>,
}

impl MockProbe {
    /// Objects currently alive (created and not yet dropped).
    pub fn live_objects(&self) -> isize {
        self.live.load(Ordering::SeqCst)
    }

    /// Total number of calls made into the graph.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Distinct threads that called into the graph.
    pub fn threads(&self) -> HashSet<ThreadId> {
        self.threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn enter(self: &Arc<Self>) -> CallGuard {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(thread::current().id());
        CallGuard(self.clone())
    }
}

struct CallGuard(Arc<MockProbe>);

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Reference held by every mock object; counts as one live object.
#[derive(Debug)]
struct Tracked(Arc<MockProbe>);

impl Tracked {
    fn new(probe: &Arc<MockProbe>) -> Self {
        probe.live.fetch_add(1, Ordering::SeqCst);
        Self(probe.clone())
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::SeqCst);
    }
}
