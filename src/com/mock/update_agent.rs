//! Mock Windows Update Agent object graph.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{MockProbe, MockRuntime, Tracked};
use crate::com::ComError;
use crate::com::traits::{
    ComCollection, UpdateAgentBackend, UpdateCategory, UpdateEntry, UpdateSession,
};

/// Category attached to a mock update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCategory {
    pub name: String,
    pub order: i32,
}

impl MockCategory {
    pub fn new(name: impl Into<String>, order: i32) -> Self {
        Self {
            name: name.into(),
            order,
        }
    }
}

/// Pending update returned by the mock searcher.
#[derive(Debug, Clone, Default)]
pub struct MockUpdate {
    pub title: String,
    pub severity: String,
    pub categories: Vec<MockCategory>,
    /// Property reads on this update fail.
    pub broken: bool,
}

impl MockUpdate {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = severity.into();
        self
    }

    pub fn category(mut self, name: impl Into<String>, order: i32) -> Self {
        self.categories.push(MockCategory::new(name, order));
        self
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }
}

/// Backend handing out sessions over a shared list of pending updates.
#[derive(Debug, Clone)]
pub struct MockUpdateAgent {
    updates: Arc<Mutex<Vec<MockUpdate>>>,
    runtime: MockRuntime,
    probe: Arc<MockProbe>,
    fail_search: Arc<AtomicBool>,
    searches: Arc<AtomicUsize>,
    online: Arc<Mutex<Option<bool>>>,
    fail_connect: bool,
}

impl MockUpdateAgent {
    pub fn new(updates: Vec<MockUpdate>) -> Self {
        Self {
            updates: Arc::new(Mutex::new(updates)),
            runtime: MockRuntime::new(),
            probe: Arc::new(MockProbe::default()),
            fail_search: Arc::new(AtomicBool::new(false)),
            searches: Arc::new(AtomicUsize::new(0)),
            online: Arc::new(Mutex::new(None)),
            fail_connect: false,
        }
    }

    pub fn with_runtime(mut self, runtime: MockRuntime) -> Self {
        self.runtime = runtime;
        self
    }

    /// Makes `connect` fail, as when the update session class is missing.
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn set_updates(&self, updates: Vec<MockUpdate>) {
        *self.updates.lock().unwrap_or_else(PoisonError::into_inner) = updates;
    }

    /// Makes subsequent `Search` calls fail (or succeed again).
    pub fn set_search_failure(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }

    /// Number of `Search` calls made so far.
    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    /// `online` flag passed to the last `connect`.
    pub fn online(&self) -> Option<bool> {
        *self.online.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn probe(&self) -> Arc<MockProbe> {
        self.probe.clone()
    }

    pub fn runtime_stats(&self) -> super::RuntimeStats {
        self.runtime.stats()
    }
}

impl UpdateAgentBackend for MockUpdateAgent {
    type Runtime = MockRuntime;
    type Session = MockUpdateSession;

    fn runtime(&self) -> MockRuntime {
        self.runtime.clone()
    }

    fn connect(&self, online: bool) -> Result<MockUpdateSession, ComError> {
        *self.online.lock().unwrap_or_else(PoisonError::into_inner) = Some(online);
        if self.fail_connect {
            return Err(ComError::new(
                "CoCreateInstance(UpdateSession)",
                "class not registered",
            ));
        }
        Ok(MockUpdateSession {
            agent: self.clone(),
            _tracked: Tracked::new(&self.probe),
            _not_send: PhantomData,
        })
    }
}

/// Mock session. Not `Send`, like the COM object it stands for.
pub struct MockUpdateSession {
    agent: MockUpdateAgent,
    _tracked: Tracked,
    _not_send: PhantomData<*const ()>,
}

impl UpdateSession for MockUpdateSession {
    type Update = MockUpdateHandle;
    type Updates = MockUpdateCollection;

    fn search(&self, criteria: &str) -> Result<MockUpdateCollection, ComError> {
        let probe = &self.agent.probe;
        let _call = probe.enter();
        self.agent.searches.fetch_add(1, Ordering::SeqCst);
        if self.agent.fail_search.load(Ordering::SeqCst) {
            return Err(ComError::new(
                "IUpdateSearcher::Search",
                format!("search failed for criteria '{criteria}': WU_E_PT_HTTP_STATUS_SERVICE_UNAVAIL"),
            ));
        }
        let updates = self
            .agent
            .updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(MockUpdateCollection {
            updates,
            probe: probe.clone(),
            _tracked: Tracked::new(probe),
        })
    }
}

pub struct MockUpdateCollection {
    updates: Vec<MockUpdate>,
    probe: Arc<MockProbe>,
    _tracked: Tracked,
}

impl ComCollection for MockUpdateCollection {
    type Item = MockUpdateHandle;

    fn count(&self) -> Result<usize, ComError> {
        let _call = self.probe.enter();
        Ok(self.updates.len())
    }

    fn item(&self, index: usize) -> Result<MockUpdateHandle, ComError> {
        let _call = self.probe.enter();
        let update = self.updates.get(index).cloned().ok_or_else(|| {
            ComError::new("IUpdateCollection::Item", format!("index {index} out of range"))
        })?;
        Ok(MockUpdateHandle {
            update,
            probe: self.probe.clone(),
            _tracked: Tracked::new(&self.probe),
        })
    }
}

pub struct MockUpdateHandle {
    update: MockUpdate,
    probe: Arc<MockProbe>,
    _tracked: Tracked,
}

impl MockUpdateHandle {
    fn read<T>(&self, op: &'static str, value: T) -> Result<T, ComError> {
        let _call = self.probe.enter();
        if self.update.broken {
            return Err(ComError::new(op, format!("update unavailable: {}", self.update.title)));
        }
        Ok(value)
    }
}

impl UpdateEntry for MockUpdateHandle {
    type Category = MockCategoryHandle;
    type Categories = MockCategoryCollection;

    fn title(&self) -> Result<String, ComError> {
        self.read("IUpdate::Title", self.update.title.clone())
    }

    fn severity(&self) -> Result<String, ComError> {
        self.read("IUpdate::MsrcSeverity", self.update.severity.clone())
    }

    fn categories(&self) -> Result<MockCategoryCollection, ComError> {
        let categories = self.read("IUpdate::Categories", self.update.categories.clone())?;
        Ok(MockCategoryCollection {
            categories,
            probe: self.probe.clone(),
            _tracked: Tracked::new(&self.probe),
        })
    }
}

pub struct MockCategoryCollection {
    categories: Vec<MockCategory>,
    probe: Arc<MockProbe>,
    _tracked: Tracked,
}

impl ComCollection for MockCategoryCollection {
    type Item = MockCategoryHandle;

    fn count(&self) -> Result<usize, ComError> {
        let _call = self.probe.enter();
        Ok(self.categories.len())
    }

    fn item(&self, index: usize) -> Result<MockCategoryHandle, ComError> {
        let _call = self.probe.enter();
        let category = self.categories.get(index).cloned().ok_or_else(|| {
            ComError::new("ICategoryCollection::Item", format!("index {index} out of range"))
        })?;
        Ok(MockCategoryHandle {
            category,
            probe: self.probe.clone(),
            _tracked: Tracked::new(&self.probe),
        })
    }
}

pub struct MockCategoryHandle {
    category: MockCategory,
    probe: Arc<MockProbe>,
    _tracked: Tracked,
}

impl UpdateCategory for MockCategoryHandle {
    fn name(&self) -> Result<String, ComError> {
        let _call = self.probe.enter();
        Ok(self.category.name.clone())
    }

    fn order(&self) -> Result<i32, ComError> {
        let _call = self.probe.enter();
        Ok(self.category.order)
    }
}
