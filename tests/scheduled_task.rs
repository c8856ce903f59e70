use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use winglot::collector::scheduled_task::{LAST_RESULT, MISSED_RUNS, STATE};
use winglot::collector::{
    CollectError, Collector, Sample, ScheduledTaskCollector, ScheduledTaskConfig,
};
use winglot::com::apartment::S_FALSE;
use winglot::com::mock::{MockFolder, MockRuntime, MockTask, MockTaskScheduler};

fn built(backend: &MockTaskScheduler) -> ScheduledTaskCollector<MockTaskScheduler> {
    let mut collector = ScheduledTaskCollector::new(ScheduledTaskConfig::default(), backend.clone());
    collector.build().unwrap();
    collector
}

fn find<'a>(samples: &'a [Sample], name: &str, task: &str, state: Option<&str>) -> Option<&'a Sample> {
    samples.iter().find(|s| {
        s.name() == name && s.label("task") == Some(task) && (state.is_none() || s.label("state") == state)
    })
}

#[test]
fn two_level_tree_is_reported() {
    let backend = MockTaskScheduler::two_level();
    let mut collector = built(&backend);

    let mut samples = Vec::new();
    collector.collect(&mut samples).unwrap();

    // A: five state series plus result and missed runs. B never ran: state only.
    assert_eq!(samples.len(), 12);
    assert_eq!(find(&samples, STATE.name, "/A", Some("ready")).unwrap().value, 1.0);
    assert_eq!(find(&samples, STATE.name, "/A", Some("disabled")).unwrap().value, 0.0);
    assert_eq!(find(&samples, LAST_RESULT.name, "/A", None).unwrap().value, 1.0);
    assert_eq!(find(&samples, MISSED_RUNS.name, "/A", None).unwrap().value, 0.0);

    assert_eq!(find(&samples, STATE.name, "/Sub/B", Some("disabled")).unwrap().value, 1.0);
    assert!(find(&samples, LAST_RESULT.name, "/Sub/B", None).is_none());
    assert!(find(&samples, MISSED_RUNS.name, "/Sub/B", None).is_none());

    collector.close().unwrap();
}

#[test]
fn include_and_exclude_filter_paths() {
    let backend = MockTaskScheduler::typical_host();
    let config = ScheduledTaskConfig {
        include: "/Microsoft/.+".to_string(),
        exclude: ".*/Reboot".to_string(),
    };
    let mut collector = ScheduledTaskCollector::new(config, backend);
    collector.build().unwrap();

    let mut samples = Vec::new();
    collector.collect(&mut samples).unwrap();
    let mut tasks: Vec<_> = samples
        .iter()
        .filter(|s| s.name() == STATE.name)
        .filter_map(|s| s.label("task"))
        .collect();
    tasks.dedup();

    assert_eq!(
        tasks,
        vec![
            "/Microsoft/Windows/Defrag/ScheduledDefrag",
            "/Microsoft/Windows/UpdateOrchestrator/Schedule Scan",
            "/Microsoft/Windows/WindowsUpdate/Scheduled Start",
        ]
    );
}

#[test]
fn every_collect_walks_a_fresh_tree() {
    let backend = MockTaskScheduler::two_level();
    let collector = built(&backend);

    backend.set_root(MockFolder::root().with_task(MockTask::new("Only")));
    let mut samples = Vec::new();
    collector.collect(&mut samples).unwrap();
    assert!(samples.iter().all(|s| s.label("task") == Some("/Only")));
    assert_eq!(backend.connects(), 1);
}

#[test]
fn enumeration_failure_fails_the_scrape_then_recovers() {
    let backend = MockTaskScheduler::two_level();
    let collector = built(&backend);

    backend.set_root(
        MockFolder::root()
            .with_task(MockTask::new("A"))
            .with_folder(MockFolder::new("Locked").failing_tasks()),
    );
    let mut samples = Vec::new();
    let err = collector.collect(&mut samples).unwrap_err();
    assert!(matches!(err, CollectError::Cycle(_)));
    assert!(samples.is_empty());

    backend.set_root(MockFolder::root().with_task(MockTask::new("A")));
    collector.collect(&mut samples).unwrap();
    assert!(!samples.is_empty());
}

#[test]
fn connect_failure_fails_build_and_releases_com() {
    let backend = MockTaskScheduler::two_level().failing_connect();
    let mut collector = ScheduledTaskCollector::new(ScheduledTaskConfig::default(), backend.clone());

    assert!(matches!(collector.build(), Err(CollectError::Init(_))));
    let stats = backend.runtime_stats();
    assert_eq!(stats.initialized(), 1);
    assert_eq!(stats.uninitialized(), 1);

    // Never built: nothing to report, nothing to fail.
    let mut samples = Vec::new();
    collector.collect(&mut samples).unwrap();
    assert!(samples.is_empty());
}

#[test]
fn already_initialized_thread_is_usable_and_balanced() {
    let backend = MockTaskScheduler::two_level().with_runtime(MockRuntime::with_hresult(S_FALSE));
    let mut collector = built(&backend);

    let mut samples = Vec::new();
    collector.collect(&mut samples).unwrap();
    assert!(!samples.is_empty());

    collector.close().unwrap();
    assert_eq!(backend.runtime_stats().initialized(), 1);
    assert_eq!(backend.runtime_stats().uninitialized(), 1);
}

#[test]
fn concurrent_collects_run_one_at_a_time_on_one_thread() {
    let backend = MockTaskScheduler::typical_host();
    let collector = Arc::new(built(&backend));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let collector = collector.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    let mut samples = Vec::new();
                    collector.collect(&mut samples).unwrap();
                    assert_eq!(samples.iter().filter(|s| s.name() == STATE.name).count(), 6 * 5);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let probe = backend.probe();
    assert_eq!(probe.max_in_flight(), 1);
    assert_eq!(probe.threads().len(), 1);
    assert!(!probe.threads().contains(&thread::current().id()));
}

#[test]
fn close_is_idempotent_bounded_and_releases_everything() {
    let backend = MockTaskScheduler::two_level();
    let mut collector = built(&backend);
    let mut samples = Vec::new();
    collector.collect(&mut samples).unwrap();

    let start = Instant::now();
    collector.close().unwrap();
    collector.close().unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));

    assert_eq!(backend.probe().live_objects(), 0);
    assert_eq!(backend.runtime_stats().uninitialized(), 1);

    samples.clear();
    collector.collect(&mut samples).unwrap();
    assert!(samples.is_empty());
}
