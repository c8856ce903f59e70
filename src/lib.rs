//! winglot - COM automation bridge for a Windows metrics exporter.
//!
//! This library provides:
//! - `com` - single-threaded apartment executor, request protocol and the
//!   Task Scheduler / Windows Update Agent object graphs (real and mock)
//! - `collector` - scheduled-task and update collectors producing metric samples
//! - `exporter` - collector registry with per-collector failure isolation and
//!   Prometheus text rendering
//! - `config` - collector configuration
//! - `util` - helper utilities
//!
//! The `winglotd` daemon wires these together.

pub mod collector;
pub mod com;
pub mod config;
pub mod exporter;
pub mod util;
