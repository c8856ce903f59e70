use windows::Win32::System::Com::{CLSCTX_ALL, CoCreateInstance};
use windows::Win32::System::TaskScheduler::{
    IRegisteredTask, IRegisteredTaskCollection, ITaskFolder, ITaskFolderCollection, ITaskService,
    TASK_ENUM_HIDDEN, TaskScheduler,
};
use windows::core::{BSTR, VARIANT};

use super::{Win32Runtime, bstr_to_string, com_err};
use crate::com::ComError;
use crate::com::traits::{
    ComCollection, RegisteredTask, TaskFolder, TaskSchedulerBackend, TaskService,
};

/// Task Scheduler backend connected to the local service.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32TaskScheduler;

impl TaskSchedulerBackend for Win32TaskScheduler {
    type Runtime = Win32Runtime;
    type Service = Win32TaskService;

    fn runtime(&self) -> Win32Runtime {
        Win32Runtime
    }

    fn connect(&self) -> Result<Win32TaskService, ComError> {
        // SAFETY: COM is initialized on this thread by the apartment.
        let service: ITaskService = unsafe { CoCreateInstance(&TaskScheduler, None, CLSCTX_ALL) }
            .map_err(com_err("create task scheduler"))?;
        let empty = VARIANT::default();
        // Empty variants select the local machine and the current user.
        unsafe { service.Connect(&empty, &empty, &empty, &empty) }
            .map_err(com_err("connect task scheduler"))?;
        Ok(Win32TaskService(service))
    }
}

pub struct Win32TaskService(ITaskService);

impl TaskService for Win32TaskService {
    type Folder = Win32TaskFolder;

    fn folder(&self, path: &str) -> Result<Win32TaskFolder, ComError> {
        unsafe { self.0.GetFolder(&BSTR::from(path)) }
            .map(Win32TaskFolder)
            .map_err(com_err("get task folder"))
    }
}

pub struct Win32TaskFolder(ITaskFolder);

impl TaskFolder for Win32TaskFolder {
    type Task = Win32RegisteredTask;
    type Tasks = Win32TaskCollection;
    type Folders = Win32FolderCollection;

    fn tasks(&self) -> Result<Win32TaskCollection, ComError> {
        unsafe { self.0.GetTasks(TASK_ENUM_HIDDEN.0) }
            .map(Win32TaskCollection)
            .map_err(com_err("get tasks"))
    }

    fn folders(&self) -> Result<Win32FolderCollection, ComError> {
        unsafe { self.0.GetFolders(0) }
            .map(Win32FolderCollection)
            .map_err(com_err("get folders"))
    }
}

/// Task Scheduler collections are indexed from 1.
fn one_based(index: usize) -> Result<VARIANT, ComError> {
    i32::try_from(index + 1)
        .map(VARIANT::from)
        .map_err(|_| ComError::new("index collection", format!("index {} out of range", index)))
}

fn native_count(count: i32) -> usize {
    usize::try_from(count).unwrap_or(0)
}

pub struct Win32TaskCollection(IRegisteredTaskCollection);

impl ComCollection for Win32TaskCollection {
    type Item = Win32RegisteredTask;

    fn count(&self) -> Result<usize, ComError> {
        unsafe { self.0.Count() }
            .map(native_count)
            .map_err(com_err("count tasks"))
    }

    fn item(&self, index: usize) -> Result<Win32RegisteredTask, ComError> {
        let index = one_based(index)?;
        unsafe { self.0.get_Item(&index) }
            .map(Win32RegisteredTask)
            .map_err(com_err("get task"))
    }
}

pub struct Win32FolderCollection(ITaskFolderCollection);

impl ComCollection for Win32FolderCollection {
    type Item = Win32TaskFolder;

    fn count(&self) -> Result<usize, ComError> {
        unsafe { self.0.Count() }
            .map(native_count)
            .map_err(com_err("count folders"))
    }

    fn item(&self, index: usize) -> Result<Win32TaskFolder, ComError> {
        let index = one_based(index)?;
        unsafe { self.0.get_Item(&index) }
            .map(Win32TaskFolder)
            .map_err(com_err("get folder"))
    }
}

pub struct Win32RegisteredTask(IRegisteredTask);

impl RegisteredTask for Win32RegisteredTask {
    fn name(&self) -> Result<String, ComError> {
        unsafe { self.0.Name() }
            .map(bstr_to_string)
            .map_err(com_err("task name"))
    }

    fn path(&self) -> Result<String, ComError> {
        unsafe { self.0.Path() }
            .map(bstr_to_string)
            .map_err(com_err("task path"))
    }

    fn enabled(&self) -> Result<bool, ComError> {
        unsafe { self.0.Enabled() }
            .map(|v| v.as_bool())
            .map_err(com_err("task enabled"))
    }

    fn state(&self) -> Result<i32, ComError> {
        unsafe { self.0.State() }
            .map(|s| s.0)
            .map_err(com_err("task state"))
    }

    fn missed_runs(&self) -> Result<i32, ComError> {
        unsafe { self.0.NumberOfMissedRuns() }.map_err(com_err("task missed runs"))
    }

    fn last_result(&self) -> Result<i32, ComError> {
        unsafe { self.0.LastTaskResult() }.map_err(com_err("task last result"))
    }
}
