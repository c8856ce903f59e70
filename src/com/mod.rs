//! COM automation plumbing.
//!
//! Windows automation objects (Task Scheduler, Windows Update Agent) are
//! thread-affine: every call into one object graph has to happen on the thread
//! that initialized COM for it. This module isolates each graph on its own
//! apartment thread and lets any other thread talk to it by message passing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  request   ┌──────────────────────────────────────────┐
//! │ caller thread├───────────►│            Apartment thread              │
//! │ (collect)    │◄───────────┤  ComRuntime::initialize                  │
//! └──────────────┘   reply    │  connect() -> root object (never Send)   │
//!                             │  serve(&root): walker runs here          │
//!                             │  drop(root); ComRuntime::uninitialize    │
//!                             └───────────────────┬──────────────────────┘
//!                                                 │
//!                                  ┌──────────────┴──────────────┐
//!                           ┌──────▼──────┐               ┌──────▼──────┐
//!                           │  windows    │               │    mock     │
//!                           │ (Win32 COM) │               │ (Testing)   │
//!                           └─────────────┘               └─────────────┘
//! ```
//!
//! Object graphs are described by the traits in [`traits`]; the walkers in
//! `collector` are generic over them, so the same traversal code runs against
//! the real COM interfaces and the in-memory [`mock`] backend.

pub mod apartment;
pub mod mock;
pub mod request;
pub mod traits;

#[cfg(windows)]
pub mod windows;

pub use apartment::{Apartment, ComRuntime, InitOutcome};
pub use request::{Reply, RequestServer, Requester};
pub use traits::{
    ComCollection, RegisteredTask, TaskFolder, TaskSchedulerBackend, TaskService,
    UpdateAgentBackend, UpdateCategory, UpdateEntry, UpdateSession,
};

/// Error raised by a COM operation.
///
/// `op` names the failing operation; wrapping with [`ComError::wrap`] keeps the
/// inner operation in the detail so the full call path shows up in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComError {
    pub op: &'static str,
    pub detail: String,
}

impl ComError {
    pub fn new(op: &'static str, detail: impl Into<String>) -> Self {
        Self {
            op,
            detail: detail.into(),
        }
    }

    /// Wraps this error with the name of the enclosing operation.
    pub fn wrap(self, op: &'static str) -> Self {
        Self {
            op,
            detail: self.to_string(),
        }
    }
}

impl std::fmt::Display for ComError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.op, self.detail)
    }
}

impl std::error::Error for ComError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_keeps_inner_operation() {
        let err = ComError::new("GetTasks", "access denied").wrap("fetch folder tasks");
        assert_eq!(err.op, "fetch folder tasks");
        assert_eq!(err.to_string(), "fetch folder tasks: GetTasks: access denied");
    }
}
