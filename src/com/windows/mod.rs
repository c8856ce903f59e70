//! Win32 COM backends.
//!
//! Interface pointers from the `windows` crate release themselves on drop,
//! so every collection and item fetched during a walk is released at the end
//! of the scope that fetched it.

mod runtime;
mod task_scheduler;
mod update_agent;

pub use runtime::Win32Runtime;
pub use task_scheduler::{Win32TaskScheduler, Win32TaskService};
pub use update_agent::{Win32UpdateAgent, Win32UpdateSession};

use super::ComError;

/// Maps a `windows` crate error to a [`ComError`] for the operation `op`.
pub(crate) fn com_err(op: &'static str) -> impl Fn(::windows::core::Error) -> ComError {
    move |e| ComError::new(op, e.to_string())
}

pub(crate) fn bstr_to_string(value: ::windows::core::BSTR) -> String {
    value.to_string()
}
