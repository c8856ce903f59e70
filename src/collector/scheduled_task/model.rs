//! Scheduled task records.

/// `SCHED_S_SUCCESS`.
pub const SCHED_S_SUCCESS: i32 = 0x0000_0000;
/// `SCHED_S_TASK_HAS_NOT_RUN`.
pub const SCHED_S_TASK_HAS_NOT_RUN: i32 = 0x0004_1303;

/// Live task status (`TASK_STATE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Unknown,
    Disabled,
    Queued,
    Ready,
    Running,
}

impl TaskState {
    /// All states, in the order their metric series are emitted.
    pub const ALL: [TaskState; 5] = [
        TaskState::Disabled,
        TaskState::Queued,
        TaskState::Ready,
        TaskState::Running,
        TaskState::Unknown,
    ];

    /// Decodes a `TASK_STATE` value; unrecognized values are `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => TaskState::Disabled,
            2 => TaskState::Queued,
            3 => TaskState::Ready,
            4 => TaskState::Running,
            _ => TaskState::Unknown,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            TaskState::Unknown => 0,
            TaskState::Disabled => 1,
            TaskState::Queued => 2,
            TaskState::Ready => 3,
            TaskState::Running => 4,
        }
    }

    /// Lowercase label value.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Unknown => "unknown",
            TaskState::Disabled => "disabled",
            TaskState::Queued => "queued",
            TaskState::Ready => "ready",
            TaskState::Running => "running",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a task's last run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResult {
    Success,
    HasNotRun,
    /// Any other HRESULT or exit code.
    Other(i32),
}

impl TaskResult {
    pub fn from_code(code: i32) -> Self {
        match code {
            SCHED_S_SUCCESS => TaskResult::Success,
            SCHED_S_TASK_HAS_NOT_RUN => TaskResult::HasNotRun,
            other => TaskResult::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            TaskResult::Success => SCHED_S_SUCCESS,
            TaskResult::HasNotRun => SCHED_S_TASK_HAS_NOT_RUN,
            TaskResult::Other(code) => code,
        }
    }
}

/// Plain-data snapshot of one registered task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTaskRecord {
    pub name: String,
    /// Folder-qualified path with `/` separators.
    pub path: String,
    pub enabled: bool,
    pub state: TaskState,
    pub missed_runs: u32,
    pub last_result: TaskResult,
}

/// Converts a Task Scheduler path (`\Folder\Task`) to `/Folder/Task`.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}
