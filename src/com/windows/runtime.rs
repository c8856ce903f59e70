use windows::Win32::System::Com::{COINIT_MULTITHREADED, CoInitializeEx, CoUninitialize};

use crate::com::ComError;
use crate::com::apartment::{ComRuntime, InitOutcome};

/// COM library initialization for the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Runtime;

impl ComRuntime for Win32Runtime {
    fn initialize(&self) -> Result<InitOutcome, ComError> {
        // SAFETY: called once on the apartment thread before any COM object exists.
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        InitOutcome::from_hresult(hr.0)
    }

    fn uninitialize(&self) {
        // SAFETY: balanced with a successful initialize on the same thread,
        // after every interface pointer created there has been released.
        unsafe { CoUninitialize() };
    }
}
