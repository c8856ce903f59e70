//! Scheduled task collector.
//!
//! Walks the Task Scheduler folder tree on demand. The tree lives on a
//! dedicated apartment thread; every `collect` sends a refresh request and
//! blocks until that thread has walked the whole tree and replied with plain
//! records.

mod model;
mod walker;

pub use model::{
    SCHED_S_SUCCESS, SCHED_S_TASK_HAS_NOT_RUN, ScheduledTaskRecord, TaskResult, TaskState,
    normalize_path,
};
pub use walker::{MAX_FOLDER_DEPTH, ROOT_FOLDER, collect_tasks, read_task};

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::collector::sample::{MetricDesc, MetricKind, Sample};
use crate::collector::traits::{CollectError, Collector};
use crate::com::apartment::Apartment;
use crate::com::request::{self, Reply, Requester};
use crate::com::traits::TaskSchedulerBackend;
use crate::com::ComError;

pub const NAME: &str = "scheduled_task";

pub static LAST_RESULT: MetricDesc = MetricDesc {
    name: "windows_scheduled_task_last_result",
    help: "The last result of the scheduled task (1 = success).",
    kind: MetricKind::Gauge,
    labels: &["task"],
};

pub static MISSED_RUNS: MetricDesc = MetricDesc {
    name: "windows_scheduled_task_missed_runs",
    help: "The number of times the registered task missed a scheduled run.",
    kind: MetricKind::Gauge,
    labels: &["task"],
};

pub static STATE: MetricDesc = MetricDesc {
    name: "windows_scheduled_task_state",
    help: "The current state of the scheduled task.",
    kind: MetricKind::Gauge,
    labels: &["task", "state"],
};

/// Scheduled task collector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduledTaskConfig {
    /// Tasks whose normalized path matches are reported.
    pub include: String,
    /// Tasks whose normalized path matches are never reported.
    pub exclude: String,
}

impl Default for ScheduledTaskConfig {
    fn default() -> Self {
        Self {
            include: ".+".to_string(),
            exclude: String::new(),
        }
    }
}

/// Include/exclude filter over normalized task paths.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    include: Regex,
    exclude: Regex,
}

impl TaskFilter {
    /// Compiles both patterns, anchored to the whole path.
    pub fn new(config: &ScheduledTaskConfig) -> Result<Self, CollectError> {
        Ok(Self {
            include: anchored(&config.include, "include")?,
            exclude: anchored(&config.exclude, "exclude")?,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        !self.exclude.is_match(path) && self.include.is_match(path)
    }
}

fn anchored(pattern: &str, which: &str) -> Result<Regex, CollectError> {
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| CollectError::Config(format!("scheduled_task {} pattern: {}", which, e)))
}

type InventoryResult = Result<Vec<ScheduledTaskRecord>, ComError>;

/// Collector exposing the scheduled task inventory.
pub struct ScheduledTaskCollector<B: TaskSchedulerBackend> {
    config: ScheduledTaskConfig,
    backend: B,
    filter: Option<TaskFilter>,
    requester: Option<Requester<InventoryResult>>,
    apartment: Option<Apartment>,
}

impl<B: TaskSchedulerBackend> ScheduledTaskCollector<B> {
    pub fn new(config: ScheduledTaskConfig, backend: B) -> Self {
        Self {
            config,
            backend,
            filter: None,
            requester: None,
            apartment: None,
        }
    }

    /// Asks the apartment for a fresh inventory.
    ///
    /// Before `build` or after `close` there is nothing to ask, which yields an
    /// empty inventory rather than an error.
    pub fn inventory(&self) -> Result<Vec<ScheduledTaskRecord>, CollectError> {
        let Some(requester) = &self.requester else {
            return Ok(Vec::new());
        };
        match requester.call() {
            Reply::Ready(Ok(tasks)) => Ok(tasks),
            Reply::Ready(Err(e)) => Err(CollectError::Cycle(e)),
            Reply::Closed => {
                debug!("scheduled task apartment closed, no data");
                Ok(Vec::new())
            }
        }
    }
}

impl<B: TaskSchedulerBackend> Collector for ScheduledTaskCollector<B> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn build(&mut self) -> Result<(), CollectError> {
        self.filter = Some(TaskFilter::new(&self.config)?);

        let (requester, server) = request::channel::<InventoryResult>();
        let backend = self.backend.clone();
        let apartment = Apartment::start(
            "scheduled-task-com",
            self.backend.runtime(),
            move || backend.connect(),
            move |service| {
                let served = server.serve(|| collect_tasks(service));
                debug!(requests = served, "scheduled task serve loop finished");
            },
        )
        .map_err(CollectError::Init)?;

        info!(
            include = %self.config.include,
            exclude = %self.config.exclude,
            "scheduled task collector ready"
        );
        self.requester = Some(requester);
        self.apartment = Some(apartment);
        Ok(())
    }

    fn collect(&self, sink: &mut Vec<Sample>) -> Result<(), CollectError> {
        let tasks = self.inventory()?;
        let Some(filter) = &self.filter else {
            return Ok(());
        };
        for task in tasks.iter().filter(|t| filter.matches(&t.path)) {
            emit_task(task, sink);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), CollectError> {
        // Dropping the requester ends the serve loop once it finishes the
        // request in progress.
        self.requester = None;
        if let Some(mut apartment) = self.apartment.take() {
            apartment.join();
        }
        Ok(())
    }
}

impl<B: TaskSchedulerBackend> Drop for ScheduledTaskCollector<B> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Appends the samples for one task.
///
/// Tasks that have never run only report their state.
pub fn emit_task(task: &ScheduledTaskRecord, sink: &mut Vec<Sample>) {
    for state in TaskState::ALL {
        let value = if task.state == state { 1.0 } else { 0.0 };
        sink.push(Sample::new(
            &STATE,
            vec![task.path.clone(), state.as_str().to_string()],
            value,
        ));
    }

    if task.last_result == TaskResult::HasNotRun {
        return;
    }

    let last_result = if task.last_result == TaskResult::Success {
        1.0
    } else {
        0.0
    };
    sink.push(Sample::new(&LAST_RESULT, vec![task.path.clone()], last_result));
    sink.push(Sample::new(
        &MISSED_RUNS,
        vec![task.path.clone()],
        f64::from(task.missed_runs),
    ));
}
