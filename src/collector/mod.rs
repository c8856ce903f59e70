//! Metric collectors backed by COM automation objects.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Collector (trait)                         │
//! │  ┌─────────────────────────────┐  ┌───────────────────────────┐  │
//! │  │  ScheduledTaskCollector     │  │  UpdateCollector          │  │
//! │  │  - on-demand request/reply  │  │  - background poll loop   │  │
//! │  │  - recursive folder walk    │  │  - SnapshotCache replay   │  │
//! │  └──────────────┬──────────────┘  └─────────────┬─────────────┘  │
//! │                 │                               │                │
//! │        ┌────────▼────────┐             ┌────────▼────────┐       │
//! │        │ Apartment thread│             │ Apartment thread│       │
//! │        └────────┬────────┘             └────────┬────────┘       │
//! └─────────────────┼───────────────────────────────┼────────────────┘
//!                   │                               │
//!      TaskSchedulerBackend (trait)      UpdateAgentBackend (trait)
//!                   │                               │
//!          ┌────────┴────────┐             ┌────────┴────────┐
//!          │ Win32 │  Mock   │             │ Win32 │  Mock   │
//!          └─────────────────┘             └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ## Production (Windows)
//!
//! ```ignore
//! use winglot::collector::{Collector, ScheduledTaskCollector, ScheduledTaskConfig};
//! use winglot::com::windows::Win32TaskScheduler;
//!
//! let mut collector = ScheduledTaskCollector::new(ScheduledTaskConfig::default(), Win32TaskScheduler);
//! collector.build()?;
//! ```
//!
//! ## Testing (with mocks)
//!
//! ```
//! use winglot::collector::{Collector, ScheduledTaskCollector, ScheduledTaskConfig};
//! use winglot::com::mock::MockTaskScheduler;
//!
//! let mut collector =
//!     ScheduledTaskCollector::new(ScheduledTaskConfig::default(), MockTaskScheduler::two_level());
//! collector.build().unwrap();
//! let mut samples = Vec::new();
//! collector.collect(&mut samples).unwrap();
//! assert!(!samples.is_empty());
//! collector.close().unwrap();
//! ```

pub mod sample;
pub mod scheduled_task;
pub mod traits;
pub mod update;

pub use sample::{MetricDesc, MetricKind, Sample};
pub use scheduled_task::{ScheduledTaskCollector, ScheduledTaskConfig, ScheduledTaskRecord};
pub use traits::{CollectError, Collector};
pub use update::{SnapshotCache, UpdateCollector, UpdateConfig, UpdateSnapshot};
