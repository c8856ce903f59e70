//! Collector registry and Prometheus text rendering.
//!
//! One collector failing never hides the others: every scrape runs all
//! collectors concurrently, keeps whatever each one produced and reports the
//! outcome per collector through `winglot_collector_success` and
//! `winglot_collector_duration_seconds`.

use std::time::{Duration, Instant};

use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric, MetricEncoder};
use prometheus_client::metrics::MetricType;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::registry::Registry;
use tracing::{debug, error, info, warn};

use crate::collector::{CollectError, Collector, MetricDesc, MetricKind, Sample};
use crate::com::ComError;

pub static COLLECTOR_SUCCESS: MetricDesc = MetricDesc {
    name: "winglot_collector_success",
    help: "Whether the collector succeeded during the last scrape.",
    kind: MetricKind::Gauge,
    labels: &["collector"],
};

pub static COLLECTOR_DURATION: MetricDesc = MetricDesc {
    name: "winglot_collector_duration_seconds",
    help: "Time the collector spent in the last scrape.",
    kind: MetricKind::Gauge,
    labels: &["collector"],
};

/// Result of one collector during a scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorOutcome {
    pub name: &'static str,
    pub duration: Duration,
    pub error: Option<CollectError>,
}

impl CollectorOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything one scrape produced, status series included.
#[derive(Debug, Clone, Default)]
pub struct Scrape {
    pub samples: Vec<Sample>,
    pub outcomes: Vec<CollectorOutcome>,
}

impl Scrape {
    pub fn failed(&self) -> impl Iterator<Item = &CollectorOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    /// Renders the samples in the Prometheus text format.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        render(&self.samples)
    }
}

/// Owns the registered collectors and drives their lifecycle.
#[derive(Default)]
pub struct Exporter {
    collectors: Vec<Box<dyn Collector>>,
}

impl Exporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, collector: Box<dyn Collector>) {
        self.collectors.push(collector);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Builds every registered collector.
    ///
    /// Collectors that fail to build are closed and dropped; the rest keep
    /// working. Returns the number of collectors left.
    pub fn build(&mut self) -> usize {
        let mut ready = Vec::with_capacity(self.collectors.len());
        for mut collector in self.collectors.drain(..) {
            match collector.build() {
                Ok(()) => {
                    info!(collector = collector.name(), "collector built");
                    ready.push(collector);
                }
                Err(e) => {
                    error!(collector = collector.name(), error = %e, "collector disabled");
                    let _ = collector.close();
                }
            }
        }
        self.collectors = ready;
        self.collectors.len()
    }

    /// Runs every collector concurrently and merges their samples.
    pub fn scrape(&self) -> Scrape {
        let results: Vec<(Vec<Sample>, CollectorOutcome)> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .collectors
                .iter()
                .map(|collector| scope.spawn(move || run_collector(collector.as_ref())))
                .collect();

            handles
                .into_iter()
                .zip(&self.collectors)
                .map(|(handle, collector)| {
                    handle.join().unwrap_or_else(|_| {
                        error!(collector = collector.name(), "collector panicked");
                        (
                            Vec::new(),
                            CollectorOutcome {
                                name: collector.name(),
                                duration: Duration::ZERO,
                                error: Some(CollectError::Cycle(ComError::new(
                                    "collect",
                                    "collector panicked",
                                ))),
                            },
                        )
                    })
                })
                .collect()
        });

        let mut scrape = Scrape::default();
        for (samples, outcome) in results {
            scrape.samples.extend(samples);
            scrape.outcomes.push(outcome);
        }
        for outcome in &scrape.outcomes {
            let label = vec![outcome.name.to_string()];
            scrape.samples.push(Sample::new(
                &COLLECTOR_SUCCESS,
                label.clone(),
                if outcome.succeeded() { 1.0 } else { 0.0 },
            ));
            scrape.samples.push(Sample::new(
                &COLLECTOR_DURATION,
                label,
                outcome.duration.as_secs_f64(),
            ));
        }
        scrape
    }

    /// Closes every collector. Safe to call more than once.
    pub fn close(&mut self) {
        for collector in &mut self.collectors {
            if let Err(e) = collector.close() {
                warn!(collector = collector.name(), error = %e, "collector close failed");
            }
        }
        debug!(collectors = self.collectors.len(), "exporter closed");
    }
}

impl Drop for Exporter {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_collector(collector: &dyn Collector) -> (Vec<Sample>, CollectorOutcome) {
    let start = Instant::now();
    let mut samples = Vec::new();
    let result = collector.collect(&mut samples);
    let duration = start.elapsed();

    match &result {
        Ok(()) => debug!(
            collector = collector.name(),
            samples = samples.len(),
            duration_ms = duration.as_millis() as u64,
            "collector finished"
        ),
        Err(CollectError::NoData) => {
            warn!(collector = collector.name(), "collector has no data yet")
        }
        Err(e) => error!(collector = collector.name(), error = %e, "collector failed"),
    }

    (
        samples,
        CollectorOutcome {
            name: collector.name(),
            duration,
            error: result.err(),
        },
    )
}

/// Samples grouped into metric families, in first-seen order.
#[derive(Debug)]
struct SampleFamilies {
    families: Vec<(&'static MetricDesc, Vec<Sample>)>,
}

impl SampleFamilies {
    fn group(samples: &[Sample]) -> Self {
        let mut families: Vec<(&'static MetricDesc, Vec<Sample>)> = Vec::new();
        for sample in samples {
            match families.iter_mut().find(|(desc, _)| desc.name == sample.desc.name) {
                Some((_, members)) => members.push(sample.clone()),
                None => families.push((sample.desc, vec![sample.clone()])),
            }
        }
        Self { families }
    }
}

impl prometheus_client::collector::Collector for SampleFamilies {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), std::fmt::Error> {
        for (desc, samples) in &self.families {
            let metric_type = match desc.kind {
                MetricKind::Gauge => MetricType::Gauge,
            };
            let mut metric_encoder =
                encoder.encode_descriptor(desc.name, desc.help, None, metric_type)?;

            // A label-less family is a single series.
            if desc.labels.is_empty() {
                if let Some(sample) = samples.first() {
                    encode_value(desc.kind, sample.value, metric_encoder)?;
                }
                continue;
            }

            for sample in samples {
                let labels: Vec<(String, String)> = sample
                    .labels()
                    .map(|(k, v)| (k.to_string(), escape_label_value(v)))
                    .collect();
                encode_value(desc.kind, sample.value, metric_encoder.encode_family(&labels)?)?;
            }
        }
        Ok(())
    }
}

fn encode_value(
    kind: MetricKind,
    value: f64,
    encoder: MetricEncoder<'_>,
) -> Result<(), std::fmt::Error> {
    match kind {
        MetricKind::Gauge => ConstGauge::new(value).encode(encoder),
    }
}

/// Escapes a label value for the text format.
///
/// The encoder writes label values verbatim between quotes, and task paths
/// and update titles come straight from the OS.
fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Renders samples in the Prometheus/OpenMetrics text format.
pub fn render(samples: &[Sample]) -> Result<String, std::fmt::Error> {
    let mut registry = Registry::default();
    registry.register_collector(Box::new(SampleFamilies::group(samples)));

    let mut out = String::new();
    prometheus_client::encoding::text::encode(&mut out, &registry)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    static UP: MetricDesc = MetricDesc {
        name: "test_up",
        help: "Test gauge.",
        kind: MetricKind::Gauge,
        labels: &["instance"],
    };

    struct StubCollector {
        name: &'static str,
        build_error: Option<CollectError>,
        collect_error: Option<CollectError>,
        closes: Arc<AtomicUsize>,
    }

    impl StubCollector {
        fn ok(name: &'static str) -> Self {
            Self {
                name,
                build_error: None,
                collect_error: None,
                closes: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Collector for StubCollector {
        fn name(&self) -> &'static str {
            self.name
        }

        fn build(&mut self) -> Result<(), CollectError> {
            match &self.build_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }

        fn collect(&self, sink: &mut Vec<Sample>) -> Result<(), CollectError> {
            sink.push(Sample::new(&UP, vec![self.name.to_string()], 1.0));
            match &self.collect_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }

        fn close(&mut self) -> Result<(), CollectError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn success_of(scrape: &Scrape, name: &str) -> Option<f64> {
        scrape
            .samples
            .iter()
            .find(|s| s.name() == COLLECTOR_SUCCESS.name && s.label("collector") == Some(name))
            .map(|s| s.value)
    }

    #[test]
    fn test_build_drops_failing_collectors() {
        let broken = StubCollector {
            build_error: Some(CollectError::Init(ComError::new("connect", "access denied"))),
            ..StubCollector::ok("broken")
        };
        let closes = broken.closes.clone();

        let mut exporter = Exporter::new();
        exporter.register(Box::new(StubCollector::ok("good")));
        exporter.register(Box::new(broken));

        assert_eq!(exporter.build(), 1);
        assert_eq!(exporter.names(), vec!["good"]);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scrape_isolates_failures() {
        let failing = StubCollector {
            collect_error: Some(CollectError::Cycle(ComError::new("search", "timeout"))),
            ..StubCollector::ok("failing")
        };
        let mut exporter = Exporter::new();
        exporter.register(Box::new(StubCollector::ok("good")));
        exporter.register(Box::new(failing));
        exporter.build();

        let scrape = exporter.scrape();
        assert_eq!(success_of(&scrape, "good"), Some(1.0));
        assert_eq!(success_of(&scrape, "failing"), Some(0.0));
        assert_eq!(scrape.failed().count(), 1);

        // Partial output of the failing collector is kept.
        let up: Vec<_> = scrape.samples.iter().filter(|s| s.name() == "test_up").collect();
        assert_eq!(up.len(), 2);
    }

    #[test]
    fn test_outcomes_follow_registration_order() {
        let mut exporter = Exporter::new();
        for name in ["a", "b", "c"] {
            exporter.register(Box::new(StubCollector::ok(name)));
        }
        exporter.build();
        let names: Vec<_> = exporter.scrape().outcomes.iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_close_reaches_every_collector() {
        let stub = StubCollector::ok("a");
        let closes = stub.closes.clone();
        let mut exporter = Exporter::new();
        exporter.register(Box::new(stub));
        exporter.build();
        exporter.close();
        drop(exporter);
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_render_groups_families() {
        let samples = vec![
            Sample::new(&UP, vec!["a".to_string()], 1.0),
            Sample::new(&COLLECTOR_SUCCESS, vec!["a".to_string()], 1.0),
            Sample::new(&UP, vec!["b".to_string()], 0.0),
        ];
        let text = render(&samples).unwrap();

        assert_eq!(text.matches("# TYPE test_up gauge").count(), 1);
        assert!(text.contains("# HELP test_up Test gauge."));
        assert!(text.contains("test_up{instance=\"a\"}"));
        assert!(text.contains("test_up{instance=\"b\"}"));
        assert!(text.contains("winglot_collector_success{collector=\"a\"}"));
        assert!(text.find("test_up{instance=\"b\"}") < text.find("# TYPE winglot_collector_success"));
    }

    #[test]
    fn test_render_empty() {
        let text = render(&[]).unwrap();
        assert!(!text.contains("# TYPE"));
    }

    #[test]
    fn test_escape_label_value() {
        assert_eq!(escape_label_value("plain"), "plain");
        assert_eq!(escape_label_value(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_label_value(r"C:\tmp"), r"C:\\tmp");
        assert_eq!(escape_label_value("a\nb"), r"a\nb");
    }

    #[test]
    fn test_render_escapes_label_values() {
        let title = "Fix \"quoted\" C:\\path\nline2";
        let samples = vec![Sample::new(&UP, vec![title.to_string()], 1.0)];
        let text = render(&samples).unwrap();

        assert!(text.contains(r#"test_up{instance="Fix \"quoted\" C:\\path\nline2"} 1"#));
        // The newline must not split the sample line.
        for line in text.lines() {
            assert!(
                line.starts_with('#') || line.starts_with("test_up{"),
                "broken exposition line: {line:?}"
            );
        }
    }
}
