//! Recursive task inventory. Runs on the apartment thread.
//!
//! Folders are walked depth-first: a folder's own tasks first, then each
//! sub-folder in enumeration order. A task whose properties cannot be read is
//! logged and skipped. A folder whose tasks or sub-folders cannot be
//! enumerated aborts the whole walk.

use tracing::{debug, warn};

use super::model::{ScheduledTaskRecord, TaskResult, TaskState, normalize_path};
use crate::com::ComError;
use crate::com::traits::{ComCollection, RegisteredTask, TaskFolder, TaskService};

/// Path of the root task folder.
pub const ROOT_FOLDER: &str = "\\";

/// Deepest folder nesting walked before the tree is treated as malformed.
pub const MAX_FOLDER_DEPTH: usize = 64;

/// Initial capacity of the inventory; typical hosts register a few hundred tasks.
const INVENTORY_CAPACITY: usize = 512;

/// Walks the whole task tree starting at the root folder.
pub fn collect_tasks<S: TaskService>(service: &S) -> Result<Vec<ScheduledTaskRecord>, ComError> {
    let root = service
        .folder(ROOT_FOLDER)
        .map_err(|e| e.wrap("open root task folder"))?;

    let mut tasks = Vec::with_capacity(INVENTORY_CAPACITY);
    walk_folder(&root, 0, &mut tasks)?;
    debug!(tasks = tasks.len(), "task inventory complete");
    Ok(tasks)
}

fn walk_folder<F: TaskFolder>(
    folder: &F,
    depth: usize,
    out: &mut Vec<ScheduledTaskRecord>,
) -> Result<(), ComError> {
    if depth > MAX_FOLDER_DEPTH {
        return Err(ComError::new(
            "walk task folders",
            format!("folder nesting exceeds {} levels", MAX_FOLDER_DEPTH),
        ));
    }

    fetch_folder_tasks(folder, out)?;

    let folders = folder
        .folders()
        .map_err(|e| e.wrap("enumerate task folders"))?;
    let count = folders
        .count()
        .map_err(|e| e.wrap("enumerate task folders"))?;
    for index in 0..count {
        let child = folders
            .item(index)
            .map_err(|e| e.wrap("enumerate task folders"))?;
        walk_folder(&child, depth + 1, out)?;
    }
    Ok(())
}

fn fetch_folder_tasks<F: TaskFolder>(
    folder: &F,
    out: &mut Vec<ScheduledTaskRecord>,
) -> Result<(), ComError> {
    let tasks = folder.tasks().map_err(|e| e.wrap("enumerate tasks"))?;
    let count = tasks.count().map_err(|e| e.wrap("enumerate tasks"))?;
    for index in 0..count {
        let task = tasks.item(index).map_err(|e| e.wrap("enumerate tasks"))?;
        match read_task(&task) {
            Ok(record) => out.push(record),
            Err(e) => warn!(index, error = %e, "skipping unreadable scheduled task"),
        }
    }
    Ok(())
}

/// Reads one task into a plain record.
pub fn read_task<T: RegisteredTask>(task: &T) -> Result<ScheduledTaskRecord, ComError> {
    let name = task.name()?;
    let path = task.path()?;
    let enabled = task.enabled()?;
    let state = task.state()?;
    let missed_runs = task.missed_runs()?;
    let last_result = task.last_result()?;

    Ok(ScheduledTaskRecord {
        name,
        path: normalize_path(&path),
        enabled,
        state: TaskState::from_code(state),
        missed_runs: u32::try_from(missed_runs).unwrap_or(0),
        last_result: TaskResult::from_code(last_result),
    })
}
