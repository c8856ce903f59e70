//! Dedicated apartment thread owning one COM object graph.
//!
//! The thread initializes COM, creates the root automation object and hands it
//! to a serve loop. The root object is created on the thread and dropped on the
//! thread, so it never needs to be `Send`. Startup failures are reported back
//! synchronously, which lets a collector's `build` fail instead of leaving a
//! half-started worker behind.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use super::ComError;

/// `S_OK`.
pub const S_OK: i32 = 0;
/// `S_FALSE`: COM was already initialized on this thread.
pub const S_FALSE: i32 = 1;
/// `RPC_E_CHANGED_MODE`: COM was already initialized with another concurrency model.
pub const RPC_E_CHANGED_MODE: i32 = 0x8001_0106_u32 as i32;

/// Result of a successful COM initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Initialized,
    /// The thread already had COM initialized; the call still has to be
    /// balanced with an uninitialize.
    AlreadyInitialized,
}

impl InitOutcome {
    /// Classifies the HRESULT returned by `CoInitializeEx`.
    ///
    /// `S_FALSE` counts as success.
    pub fn from_hresult(code: i32) -> Result<Self, ComError> {
        match code {
            S_FALSE => Ok(Self::AlreadyInitialized),
            c if c >= 0 => Ok(Self::Initialized),
            RPC_E_CHANGED_MODE => Err(ComError::new(
                "CoInitializeEx",
                "thread already initialized with a different concurrency model (RPC_E_CHANGED_MODE)",
            )),
            c => Err(ComError::new(
                "CoInitializeEx",
                format!("HRESULT 0x{:08X}", c as u32),
            )),
        }
    }
}

/// Per-thread COM library lifecycle.
pub trait ComRuntime: Send + 'static {
    /// Initializes COM for the calling thread.
    fn initialize(&self) -> Result<InitOutcome, ComError>;

    /// Balances a successful [`ComRuntime::initialize`] on the same thread.
    fn uninitialize(&self);
}

/// Uninitializes COM when dropped. Declared before the root object so the
/// root is released first.
struct RuntimeGuard<'a, R: ComRuntime>(&'a R);

impl<R: ComRuntime> Drop for RuntimeGuard<'_, R> {
    fn drop(&mut self) {
        self.0.uninitialize();
    }
}

/// Handle to a running apartment thread.
pub struct Apartment {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl Apartment {
    /// Starts an apartment thread.
    ///
    /// # Arguments
    /// * `name` - Thread name, also used in log records
    /// * `runtime` - COM library lifecycle for the new thread
    /// * `connect` - Creates the root object; runs on the apartment thread
    /// * `serve` - Serve loop; runs on the apartment thread until it returns
    ///
    /// Returns once the root object exists, or with the first startup error.
    pub fn start<R, Root, C, S>(
        name: &str,
        runtime: R,
        connect: C,
        serve: S,
    ) -> Result<Self, ComError>
    where
        R: ComRuntime,
        Root: 'static,
        C: FnOnce() -> Result<Root, ComError> + Send + 'static,
        S: FnOnce(&Root) + Send + 'static,
    {
        let (init_tx, init_rx) = mpsc::sync_channel::<Result<(), ComError>>(1);
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let outcome = match runtime.initialize() {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };
                if outcome == InitOutcome::AlreadyInitialized {
                    debug!(apartment = %thread_name, "COM already initialized on thread");
                }
                let _runtime = RuntimeGuard(&runtime);

                let root = match connect() {
                    Ok(root) => root,
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };
                let _ = init_tx.send(Ok(()));
                drop(init_tx);

                serve(&root);

                drop(root);
                debug!(apartment = %thread_name, "apartment released root object");
            })
            .map_err(|e| ComError::new("spawn apartment thread", e.to_string()))?;

        match init_rx.recv() {
            Ok(Ok(())) => {
                info!(apartment = name, "apartment started");
                Ok(Self {
                    name: name.to_string(),
                    handle: Some(handle),
                })
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(ComError::new(
                    "start apartment",
                    format!("apartment thread '{}' exited during startup", name),
                ))
            }
        }
    }

    /// Thread name of this apartment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether the thread has not been joined yet.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Waits for the serve loop to return and the thread to exit.
    ///
    /// The caller must first make the serve loop return (close its request
    /// channel or signal shutdown). Calling this again is a no-op.
    pub fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.join().is_err() {
            warn!(apartment = %self.name, "apartment thread panicked");
        } else {
            info!(apartment = %self.name, "apartment stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com::mock::MockRuntime;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_init_outcome_classification() {
        assert_eq!(InitOutcome::from_hresult(S_OK), Ok(InitOutcome::Initialized));
        assert_eq!(
            InitOutcome::from_hresult(S_FALSE),
            Ok(InitOutcome::AlreadyInitialized)
        );
        assert!(InitOutcome::from_hresult(RPC_E_CHANGED_MODE).is_err());
        let err = InitOutcome::from_hresult(0x8000_4005_u32 as i32).unwrap_err();
        assert!(err.to_string().contains("0x80004005"));
    }

    #[test]
    fn test_already_initialized_starts_and_balances() {
        let runtime = MockRuntime::with_hresult(S_FALSE);
        let stats = runtime.stats();
        let mut apartment =
            Apartment::start("test-sfalse", runtime, || Ok(()), |_root: &()| {}).unwrap();
        apartment.join();
        assert_eq!(stats.initialized(), 1);
        assert_eq!(stats.uninitialized(), 1);
    }

    #[test]
    fn test_init_failure_fails_start_without_uninitialize() {
        let runtime = MockRuntime::with_hresult(RPC_E_CHANGED_MODE);
        let stats = runtime.stats();
        let served = Arc::new(AtomicBool::new(false));
        let flag = served.clone();
        let result = Apartment::start(
            "test-init-fail",
            runtime,
            || Ok(()),
            move |_root: &()| flag.store(true, Ordering::SeqCst),
        );
        assert!(result.is_err());
        assert!(!served.load(Ordering::SeqCst));
        assert_eq!(stats.uninitialized(), 0);
    }

    #[test]
    fn test_connect_failure_is_reported_and_com_released() {
        let runtime = MockRuntime::new();
        let stats = runtime.stats();
        let result = Apartment::start(
            "test-connect-fail",
            runtime,
            || Err::<(), _>(ComError::new("CoCreateInstance", "class not registered")),
            |_root: &()| {},
        );
        let err = result.err().unwrap();
        assert_eq!(err.op, "CoCreateInstance");
        assert_eq!(stats.initialized(), 1);
        assert_eq!(stats.uninitialized(), 1);
    }

    #[test]
    fn test_root_is_created_and_dropped_on_apartment_thread() {
        // Rc is !Send: this only compiles because the root never leaves the thread.
        let (tx, rx) = mpsc::channel();
        let mut apartment = Apartment::start(
            "test-affinity",
            MockRuntime::new(),
            || Ok(Rc::new(Cell::new(thread::current().id()))),
            move |root: &Rc<Cell<thread::ThreadId>>| {
                let _ = tx.send((root.get(), thread::current().id()));
            },
        )
        .unwrap();
        let (created_on, served_on) = rx.recv().unwrap();
        apartment.join();
        assert_eq!(created_on, served_on);
        assert_ne!(created_on, thread::current().id());
    }

    #[test]
    fn test_join_is_idempotent() {
        let mut apartment =
            Apartment::start("test-join", MockRuntime::new(), || Ok(()), |_root: &()| {})
                .unwrap();
        assert!(apartment.is_running());
        apartment.join();
        apartment.join();
        assert!(!apartment.is_running());
        assert_eq!(apartment.name(), "test-join");
    }
}
