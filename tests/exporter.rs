use std::time::{Duration, Instant};

use winglot::collector::{
    ScheduledTaskCollector, ScheduledTaskConfig, UpdateCollector, UpdateConfig,
};
use winglot::com::mock::{MockTaskScheduler, MockUpdate, MockUpdateAgent};
use winglot::exporter::{COLLECTOR_SUCCESS, Exporter};

fn success(scrape: &winglot::exporter::Scrape, collector: &str) -> Option<f64> {
    scrape
        .samples
        .iter()
        .find(|s| s.name() == COLLECTOR_SUCCESS.name && s.label("collector") == Some(collector))
        .map(|s| s.value)
}

#[test]
fn failing_update_search_does_not_hide_tasks() {
    let agent = MockUpdateAgent::two_pending();
    agent.set_search_failure(true);

    let mut exporter = Exporter::new();
    exporter.register(Box::new(ScheduledTaskCollector::new(
        ScheduledTaskConfig::default(),
        MockTaskScheduler::two_level(),
    )));
    exporter.register(Box::new(UpdateCollector::new(UpdateConfig::default(), agent.clone())));
    assert_eq!(exporter.build(), 2);

    // Wait for the first (failed) search.
    let deadline = Instant::now() + Duration::from_secs(10);
    while agent.searches() == 0 {
        assert!(Instant::now() < deadline);
        std::thread::sleep(Duration::from_millis(5));
    }

    let scrape = exporter.scrape();
    assert_eq!(success(&scrape, "scheduled_task"), Some(1.0));
    assert_eq!(success(&scrape, "update"), Some(0.0));

    let text = scrape.render().unwrap();
    assert!(text.contains("# TYPE windows_scheduled_task_state gauge"));
    assert!(text.contains("state=\"ready\""));
    assert!(!text.contains("windows_update_pending_info{"));
    assert!(text.contains("winglot_collector_success{collector=\"update\"}"));

    exporter.close();
}

#[test]
fn collector_with_bad_pattern_is_dropped_at_build() {
    let mut exporter = Exporter::new();
    exporter.register(Box::new(ScheduledTaskCollector::new(
        ScheduledTaskConfig {
            include: "(".to_string(),
            exclude: String::new(),
        },
        MockTaskScheduler::two_level(),
    )));
    exporter.register(Box::new(UpdateCollector::new(
        UpdateConfig::default(),
        MockUpdateAgent::two_pending(),
    )));

    assert_eq!(exporter.build(), 1);
    assert_eq!(exporter.names(), vec!["update"]);
}

#[test]
fn update_title_with_quotes_renders_on_one_line() {
    let agent = MockUpdateAgent::new(vec![
        MockUpdate::new("Fix \"quoted\" C:\\path\nline2").category("Drivers", 1),
    ]);
    let mut exporter = Exporter::new();
    exporter.register(Box::new(UpdateCollector::new(UpdateConfig::default(), agent)));
    assert_eq!(exporter.build(), 1);

    let deadline = Instant::now() + Duration::from_secs(10);
    let scrape = loop {
        let scrape = exporter.scrape();
        if success(&scrape, "update") == Some(1.0) {
            break scrape;
        }
        assert!(Instant::now() < deadline);
        std::thread::sleep(Duration::from_millis(5));
    };

    let text = scrape.render().unwrap();
    assert!(text.contains(r#"title="Fix \"quoted\" C:\\path\nline2""#));
    assert!(text.lines().all(|line| !line.starts_with("line2")));

    exporter.close();
}
