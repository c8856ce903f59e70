//! Collector lifecycle shared by every collector.
//!
//! The exporter calls `build` once, `collect` on every scrape (possibly from
//! several threads at once) and `close` on shutdown.

use crate::collector::sample::Sample;
use crate::com::ComError;

/// Error returned by collector lifecycle methods.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectError {
    /// Invalid collector configuration.
    Config(String),
    /// The COM runtime or root object could not be set up; the collector is unusable.
    Init(ComError),
    /// A whole collection cycle failed (folder enumeration, search).
    Cycle(ComError),
    /// No usable data yet, or the last refresh failed.
    NoData,
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Config(msg) => write!(f, "invalid configuration: {}", msg),
            CollectError::Init(e) => write!(f, "initialization failed: {}", e),
            CollectError::Cycle(e) => write!(f, "collection failed: {}", e),
            CollectError::NoData => write!(f, "no data available yet"),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Init(e) | CollectError::Cycle(e) => Some(e),
            _ => None,
        }
    }
}

/// A metric collector with an explicit lifecycle.
pub trait Collector: Send + Sync {
    /// Stable collector name, used in logs and the per-collector status metrics.
    fn name(&self) -> &'static str;

    /// Prepares the collector. A failure means the collector is never scraped.
    fn build(&mut self) -> Result<(), CollectError>;

    /// Appends current samples to `sink`.
    fn collect(&self, sink: &mut Vec<Sample>) -> Result<(), CollectError>;

    /// Releases background resources. Safe to call more than once.
    fn close(&mut self) -> Result<(), CollectError>;
}
