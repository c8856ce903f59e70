//! Pre-built mock object graphs.
//!
//! These scenarios provide realistic Task Scheduler trees and pending-update
//! lists for tests and for running `winglotd` off Windows.

use super::task_scheduler::{MockFolder, MockTask, MockTaskScheduler};
use super::update_agent::{MockUpdate, MockUpdateAgent};
use crate::collector::scheduled_task::{TaskResult, TaskState};

impl MockTaskScheduler {
    /// Root folder with task `A` (ready, last run succeeded) and sub-folder
    /// `Sub` with task `B` (disabled, never run).
    pub fn two_level() -> Self {
        Self::new(
            MockFolder::root()
                .with_task(
                    MockTask::new("A")
                        .state(TaskState::Ready)
                        .last_result(TaskResult::Success),
                )
                .with_folder(
                    MockFolder::new("Sub").with_task(
                        MockTask::new("B")
                            .state(TaskState::Disabled)
                            .last_result(TaskResult::HasNotRun),
                    ),
                ),
        )
    }

    /// A workstation-like tree under `\Microsoft\Windows`.
    pub fn typical_host() -> Self {
        let windows = MockFolder::new("Windows")
            .with_folder(
                MockFolder::new("Defrag").with_task(
                    MockTask::new("ScheduledDefrag")
                        .state(TaskState::Ready)
                        .last_result(TaskResult::Success),
                ),
            )
            .with_folder(
                MockFolder::new("UpdateOrchestrator")
                    .with_task(
                        MockTask::new("Schedule Scan")
                            .state(TaskState::Running)
                            .last_result(TaskResult::Success),
                    )
                    .with_task(
                        MockTask::new("Reboot")
                            .state(TaskState::Disabled)
                            .last_result(TaskResult::HasNotRun),
                    ),
            )
            .with_folder(
                MockFolder::new("WindowsUpdate").with_task(
                    MockTask::new("Scheduled Start")
                        .state(TaskState::Queued)
                        .last_result(TaskResult::Other(0x8007_0005_u32 as i32))
                        .missed_runs(2),
                ),
            );

        Self::new(
            MockFolder::root()
                .with_task(
                    MockTask::new("OneDrive Standalone Update Task")
                        .state(TaskState::Ready)
                        .last_result(TaskResult::Success),
                )
                .with_task(
                    MockTask::new("GoogleUpdateTaskMachineCore")
                        .state(TaskState::Ready)
                        .last_result(TaskResult::Other(1))
                        .missed_runs(1),
                )
                .with_folder(MockFolder::new("Microsoft").with_folder(windows)),
        )
    }

    /// A chain of `depth` nested folders with one task at each level.
    pub fn deep_chain(depth: usize) -> Self {
        let mut folder = MockFolder::new(format!("L{depth}"))
            .with_task(MockTask::new(format!("T{depth}")));
        for level in (1..depth).rev() {
            folder = MockFolder::new(format!("L{level}"))
                .with_task(MockTask::new(format!("T{level}")))
                .with_folder(folder);
        }
        Self::new(MockFolder::root().with_folder(folder))
    }
}

impl MockUpdateAgent {
    /// Two pending updates: one with two categories, one with none.
    pub fn two_pending() -> Self {
        Self::new(vec![
            MockUpdate::new("2026-10 Cumulative Update for Windows 11 (KB5044284)")
                .severity("Critical")
                .category("Security", 1)
                .category("Critical", 3),
            MockUpdate::new("Microsoft Defender Antivirus antimalware platform update"),
        ])
    }

    /// A typical set of pending updates with mixed severities and categories.
    pub fn typical_host() -> Self {
        Self::new(vec![
            MockUpdate::new("2026-10 Cumulative Update for Windows 11 (KB5044284)")
                .severity("Critical")
                .category("Windows 11", 2)
                .category("Security Updates", 0),
            MockUpdate::new("Windows Malicious Software Removal Tool x64 (KB890830)")
                .severity("Important")
                .category("Update Rollups", 1),
            MockUpdate::new("Intel - Display - 31.0.101.5590")
                .category("Drivers", 5),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com::traits::{TaskFolder, TaskSchedulerBackend, TaskService};

    #[test]
    fn test_deep_chain_shape() {
        let backend = MockTaskScheduler::deep_chain(3);
        let service = backend.connect().unwrap();
        let deepest = service.folder("\\L1\\L2\\L3").unwrap();
        assert!(deepest.tasks().is_ok());
    }
}
