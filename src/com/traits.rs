//! Abstractions over the COM automation object graphs.
//!
//! Each trait mirrors the slice of a Windows automation interface the
//! collectors use. Implementations own native references and release them on
//! `Drop`, so every intermediate object obtained through these traits is
//! released at the end of the scope that fetched it.
//!
//! None of the object traits require `Send`: objects are created and used on
//! the apartment thread only. Backends (the factories) are `Send` so they can
//! be moved onto that thread.

use super::ComError;
use super::apartment::ComRuntime;

/// Indexed collection (`Count` + `Item`).
///
/// Indexes are zero-based here; backends translate to the native convention
/// (Task Scheduler collections are one-based).
pub trait ComCollection {
    type Item;

    /// Number of items in the collection.
    fn count(&self) -> Result<usize, ComError>;

    /// Fetches one item. The returned object is released when dropped.
    fn item(&self, index: usize) -> Result<Self::Item, ComError>;
}

/// Connected Task Scheduler service (`ITaskService`).
pub trait TaskService {
    type Folder: TaskFolder;

    /// Opens a folder by its backslash-separated path.
    fn folder(&self, path: &str) -> Result<Self::Folder, ComError>;
}

/// Task folder (`ITaskFolder`).
pub trait TaskFolder: Sized {
    type Task: RegisteredTask;
    type Tasks: ComCollection<Item = Self::Task>;
    type Folders: ComCollection<Item = Self>;

    /// Tasks registered directly in this folder, hidden ones included.
    fn tasks(&self) -> Result<Self::Tasks, ComError>;

    /// Direct sub-folders.
    fn folders(&self) -> Result<Self::Folders, ComError>;
}

/// Registered task (`IRegisteredTask`).
///
/// Raw values are returned as the API reports them; decoding into
/// `TaskState`/`TaskResult` happens in the collector.
pub trait RegisteredTask {
    fn name(&self) -> Result<String, ComError>;
    fn path(&self) -> Result<String, ComError>;
    fn enabled(&self) -> Result<bool, ComError>;
    /// `TASK_STATE` value.
    fn state(&self) -> Result<i32, ComError>;
    fn missed_runs(&self) -> Result<i32, ComError>;
    /// `LastTaskResult` HRESULT.
    fn last_result(&self) -> Result<i32, ComError>;
}

/// Update session with a configured searcher (`IUpdateSession` + `IUpdateSearcher`).
pub trait UpdateSession {
    type Update: UpdateEntry;
    type Updates: ComCollection<Item = Self::Update>;

    /// Runs a search with the given criteria and returns the matching updates.
    fn search(&self, criteria: &str) -> Result<Self::Updates, ComError>;
}

/// Single update (`IUpdate`).
pub trait UpdateEntry {
    type Category: UpdateCategory;
    type Categories: ComCollection<Item = Self::Category>;

    fn title(&self) -> Result<String, ComError>;
    /// MSRC severity rating; empty when the update has none.
    fn severity(&self) -> Result<String, ComError>;
    fn categories(&self) -> Result<Self::Categories, ComError>;
}

/// Update category (`ICategory`).
pub trait UpdateCategory {
    fn name(&self) -> Result<String, ComError>;
    fn order(&self) -> Result<i32, ComError>;
}

/// Factory for a Task Scheduler object graph.
///
/// `connect` is called on the apartment thread after COM has been
/// initialized there; the returned service never leaves that thread.
pub trait TaskSchedulerBackend: Clone + Send + Sync + 'static {
    type Runtime: ComRuntime;
    type Service: TaskService + 'static;

    fn runtime(&self) -> Self::Runtime;

    /// Creates the scheduler object and connects it to the local service.
    fn connect(&self) -> Result<Self::Service, ComError>;
}

/// Factory for a Windows Update Agent object graph.
pub trait UpdateAgentBackend: Clone + Send + Sync + 'static {
    type Runtime: ComRuntime;
    type Session: UpdateSession + 'static;

    fn runtime(&self) -> Self::Runtime;

    /// Creates the update session and its searcher.
    ///
    /// `online` selects searching the remote catalog instead of the local
    /// cache only.
    fn connect(&self, online: bool) -> Result<Self::Session, ComError>;
}
