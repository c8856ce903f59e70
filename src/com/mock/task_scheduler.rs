//! Mock Task Scheduler object graph.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{MockProbe, MockRuntime, Tracked};
use crate::collector::scheduled_task::{TaskResult, TaskState};
use crate::com::ComError;
use crate::com::traits::{
    ComCollection, RegisteredTask, TaskFolder, TaskSchedulerBackend, TaskService,
};

/// A registered task in the mock tree.
#[derive(Debug, Clone)]
pub struct MockTask {
    pub name: String,
    pub enabled: bool,
    pub state: i32,
    pub missed_runs: i32,
    pub last_result: i32,
    /// Property reads on this task fail.
    pub broken: bool,
}

impl MockTask {
    /// Creates an enabled, ready task that last ran successfully.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            state: TaskState::Ready.code(),
            missed_runs: 0,
            last_result: TaskResult::Success.code(),
            broken: false,
        }
    }

    pub fn state(mut self, state: TaskState) -> Self {
        self.state = state.code();
        self.enabled = state != TaskState::Disabled;
        self
    }

    pub fn last_result(mut self, result: TaskResult) -> Self {
        self.last_result = result.code();
        self
    }

    pub fn missed_runs(mut self, missed: i32) -> Self {
        self.missed_runs = missed;
        self
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }
}

/// A folder in the mock tree.
#[derive(Debug, Clone, Default)]
pub struct MockFolder {
    pub name: String,
    pub tasks: Vec<MockTask>,
    pub folders: Vec<MockFolder>,
    /// `GetTasks` on this folder fails.
    pub fail_tasks: bool,
    /// `GetFolders` on this folder fails.
    pub fail_folders: bool,
}

impl MockFolder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The root folder (`\`).
    pub fn root() -> Self {
        Self::new("")
    }

    pub fn with_task(mut self, task: MockTask) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_folder(mut self, folder: MockFolder) -> Self {
        self.folders.push(folder);
        self
    }

    pub fn failing_tasks(mut self) -> Self {
        self.fail_tasks = true;
        self
    }

    pub fn failing_folders(mut self) -> Self {
        self.fail_folders = true;
        self
    }

    /// Total number of tasks in this folder and below.
    pub fn task_count(&self) -> usize {
        self.tasks.len() + self.folders.iter().map(MockFolder::task_count).sum::<usize>()
    }

    /// Total number of folders below this one.
    pub fn folder_count(&self) -> usize {
        self.folders.len()
            + self
                .folders
                .iter()
                .map(MockFolder::folder_count)
                .sum::<usize>()
    }
}

/// Backend handing out connections to a shared mock tree.
///
/// The tree can be replaced between traversals with [`MockTaskScheduler::set_root`];
/// each traversal sees the tree as it was when it opened the root folder.
#[derive(Debug, Clone)]
pub struct MockTaskScheduler {
    root: Arc<Mutex<MockFolder>>,
    runtime: MockRuntime,
    probe: Arc<MockProbe>,
    connects: Arc<AtomicUsize>,
    fail_connect: bool,
}

impl MockTaskScheduler {
    pub fn new(root: MockFolder) -> Self {
        Self {
            root: Arc::new(Mutex::new(root)),
            runtime: MockRuntime::new(),
            probe: Arc::new(MockProbe::default()),
            connects: Arc::new(AtomicUsize::new(0)),
            fail_connect: false,
        }
    }

    pub fn with_runtime(mut self, runtime: MockRuntime) -> Self {
        self.runtime = runtime;
        self
    }

    /// Makes `connect` fail, as when the Schedule service is unavailable.
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn set_root(&self, root: MockFolder) {
        *self.root.lock().unwrap_or_else(PoisonError::into_inner) = root;
    }

    pub fn probe(&self) -> Arc<MockProbe> {
        self.probe.clone()
    }

    pub fn runtime_stats(&self) -> super::RuntimeStats {
        self.runtime.stats()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl TaskSchedulerBackend for MockTaskScheduler {
    type Runtime = MockRuntime;
    type Service = MockTaskService;

    fn runtime(&self) -> MockRuntime {
        self.runtime.clone()
    }

    fn connect(&self) -> Result<MockTaskService, ComError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(ComError::new(
                "ITaskService::Connect",
                "the Task Scheduler service is not running",
            ));
        }
        Ok(MockTaskService {
            root: self.root.clone(),
            _tracked: Tracked::new(&self.probe),
            probe: self.probe.clone(),
            _not_send: PhantomData,
        })
    }
}

/// Connected mock service. Not `Send`, like the COM object it stands for.
pub struct MockTaskService {
    root: Arc<Mutex<MockFolder>>,
    probe: Arc<MockProbe>,
    _tracked: Tracked,
    _not_send: PhantomData<*const ()>,
}

impl TaskService for MockTaskService {
    type Folder = MockFolderHandle;

    fn folder(&self, path: &str) -> Result<MockFolderHandle, ComError> {
        let _call = self.probe.enter();
        let root = self
            .root
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut node = root;
        for part in path.split('\\').filter(|p| !p.is_empty()) {
            node = node
                .folders
                .iter()
                .find(|f| f.name == part)
                .cloned()
                .ok_or_else(|| {
                    ComError::new("ITaskService::GetFolder", format!("folder not found: {path}"))
                })?;
        }
        let path = if path.is_empty() { "\\" } else { path };
        Ok(MockFolderHandle::new(Arc::new(node), path.to_string(), &self.probe))
    }
}

/// Open folder handle.
pub struct MockFolderHandle {
    node: Arc<MockFolder>,
    path: String,
    probe: Arc<MockProbe>,
    _tracked: Tracked,
}

impl MockFolderHandle {
    fn new(node: Arc<MockFolder>, path: String, probe: &Arc<MockProbe>) -> Self {
        Self {
            node,
            path,
            probe: probe.clone(),
            _tracked: Tracked::new(probe),
        }
    }

    fn child_path(&self, name: &str) -> String {
        if self.path.ends_with('\\') {
            format!("{}{}", self.path, name)
        } else {
            format!("{}\\{}", self.path, name)
        }
    }
}

impl TaskFolder for MockFolderHandle {
    type Task = MockTaskHandle;
    type Tasks = MockTaskCollection;
    type Folders = MockFolderCollection;

    fn tasks(&self) -> Result<MockTaskCollection, ComError> {
        let _call = self.probe.enter();
        if self.node.fail_tasks {
            return Err(ComError::new(
                "ITaskFolder::GetTasks",
                format!("access denied: {}", self.path),
            ));
        }
        Ok(MockTaskCollection {
            tasks: self
                .node
                .tasks
                .iter()
                .map(|t| (t.clone(), self.child_path(&t.name)))
                .collect(),
            probe: self.probe.clone(),
            _tracked: Tracked::new(&self.probe),
        })
    }

    fn folders(&self) -> Result<MockFolderCollection, ComError> {
        let _call = self.probe.enter();
        if self.node.fail_folders {
            return Err(ComError::new(
                "ITaskFolder::GetFolders",
                format!("access denied: {}", self.path),
            ));
        }
        Ok(MockFolderCollection {
            parent: self.node.clone(),
            parent_path: self.path.clone(),
            probe: self.probe.clone(),
            _tracked: Tracked::new(&self.probe),
        })
    }
}

pub struct MockTaskCollection {
    tasks: Vec<(MockTask, String)>,
    probe: Arc<MockProbe>,
    _tracked: Tracked,
}

impl ComCollection for MockTaskCollection {
    type Item = MockTaskHandle;

    fn count(&self) -> Result<usize, ComError> {
        let _call = self.probe.enter();
        Ok(self.tasks.len())
    }

    fn item(&self, index: usize) -> Result<MockTaskHandle, ComError> {
        let _call = self.probe.enter();
        let (task, path) = self.tasks.get(index).cloned().ok_or_else(|| {
            ComError::new("IRegisteredTaskCollection::Item", format!("index {index} out of range"))
        })?;
        Ok(MockTaskHandle {
            task,
            path,
            probe: self.probe.clone(),
            _tracked: Tracked::new(&self.probe),
        })
    }
}

pub struct MockFolderCollection {
    parent: Arc<MockFolder>,
    parent_path: String,
    probe: Arc<MockProbe>,
    _tracked: Tracked,
}

impl ComCollection for MockFolderCollection {
    type Item = MockFolderHandle;

    fn count(&self) -> Result<usize, ComError> {
        let _call = self.probe.enter();
        Ok(self.parent.folders.len())
    }

    fn item(&self, index: usize) -> Result<MockFolderHandle, ComError> {
        let _call = self.probe.enter();
        let node = self.parent.folders.get(index).cloned().ok_or_else(|| {
            ComError::new("ITaskFolderCollection::Item", format!("index {index} out of range"))
        })?;
        let path = if self.parent_path.ends_with('\\') {
            format!("{}{}", self.parent_path, node.name)
        } else {
            format!("{}\\{}", self.parent_path, node.name)
        };
        Ok(MockFolderHandle::new(Arc::new(node), path, &self.probe))
    }
}

pub struct MockTaskHandle {
    task: MockTask,
    path: String,
    probe: Arc<MockProbe>,
    _tracked: Tracked,
}

impl MockTaskHandle {
    fn read<T>(&self, op: &'static str, value: T) -> Result<T, ComError> {
        let _call = self.probe.enter();
        if self.task.broken {
            return Err(ComError::new(op, format!("RPC server unavailable: {}", self.task.name)));
        }
        Ok(value)
    }
}

impl RegisteredTask for MockTaskHandle {
    fn name(&self) -> Result<String, ComError> {
        self.read("IRegisteredTask::Name", self.task.name.clone())
    }

    fn path(&self) -> Result<String, ComError> {
        self.read("IRegisteredTask::Path", self.path.clone())
    }

    fn enabled(&self) -> Result<bool, ComError> {
        self.read("IRegisteredTask::Enabled", self.task.enabled)
    }

    fn state(&self) -> Result<i32, ComError> {
        self.read("IRegisteredTask::State", self.task.state)
    }

    fn missed_runs(&self) -> Result<i32, ComError> {
        self.read("IRegisteredTask::NumberOfMissedRuns", self.task.missed_runs)
    }

    fn last_result(&self) -> Result<i32, ComError> {
        self.read("IRegisteredTask::LastTaskResult", self.task.last_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> MockFolder {
        MockFolder::root()
            .with_task(MockTask::new("A"))
            .with_folder(
                MockFolder::new("Sub")
                    .with_task(MockTask::new("B"))
                    .with_folder(MockFolder::new("Deep").with_task(MockTask::new("C"))),
            )
    }

    #[test]
    fn test_paths_follow_folder_nesting() {
        let backend = MockTaskScheduler::new(tree());
        let service = backend.connect().unwrap();
        let root = service.folder("\\").unwrap();

        let tasks = root.tasks().unwrap();
        assert_eq!(tasks.item(0).unwrap().path().unwrap(), "\\A");

        let folders = root.folders().unwrap();
        let sub = folders.item(0).unwrap();
        assert_eq!(sub.tasks().unwrap().item(0).unwrap().path().unwrap(), "\\Sub\\B");

        let deep = service.folder("\\Sub\\Deep").unwrap();
        assert_eq!(deep.tasks().unwrap().item(0).unwrap().path().unwrap(), "\\Sub\\Deep\\C");
    }

    #[test]
    fn test_objects_are_released_on_drop() {
        let backend = MockTaskScheduler::new(tree());
        let probe = backend.probe();
        {
            let service = backend.connect().unwrap();
            let root = service.folder("\\").unwrap();
            let _task = root.tasks().unwrap().item(0).unwrap();
            assert_eq!(probe.live_objects(), 3);
        }
        assert_eq!(probe.live_objects(), 0);
    }

    #[test]
    fn test_failure_injection() {
        let backend = MockTaskScheduler::new(
            MockFolder::root()
                .failing_folders()
                .with_task(MockTask::new("Bad").broken()),
        );
        let service = backend.connect().unwrap();
        let root = service.folder("\\").unwrap();
        assert!(root.folders().is_err());
        let task = root.tasks().unwrap().item(0).unwrap();
        assert_eq!(task.name().unwrap_err().op, "IRegisteredTask::Name");
        assert!(service.folder("\\Missing").is_err());
    }

    #[test]
    fn test_counts() {
        let tree = tree();
        assert_eq!(tree.task_count(), 3);
        assert_eq!(tree.folder_count(), 2);
    }
}
