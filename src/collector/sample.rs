//! Plain-data metric samples.
//!
//! Samples are what crosses thread boundaries: collectors build them (on the
//! apartment thread for the update collector) and the exporter renders them.

/// Prometheus metric type of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
}

/// Static metric description.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub labels: &'static [&'static str],
}

/// One metric value with its label values.
///
/// `label_values` line up with `desc.labels`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub desc: &'static MetricDesc,
    pub label_values: Vec<String>,
    pub value: f64,
}

impl Sample {
    /// Creates a sample.
    ///
    /// # Panics
    /// Panics in debug builds when the number of label values does not match
    /// the descriptor.
    pub fn new(desc: &'static MetricDesc, label_values: Vec<String>, value: f64) -> Self {
        debug_assert_eq!(
            desc.labels.len(),
            label_values.len(),
            "label count mismatch for {}",
            desc.name
        );
        Self {
            desc,
            label_values,
            value,
        }
    }

    pub fn name(&self) -> &'static str {
        self.desc.name
    }

    /// Value of the label `name`, if the descriptor has it.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .labels
            .iter()
            .position(|l| *l == name)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }

    /// Label name/value pairs in descriptor order.
    pub fn labels(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.desc
            .labels
            .iter()
            .copied()
            .zip(self.label_values.iter().map(String::as_str))
    }
}
