use windows::Win32::Foundation::VARIANT_BOOL;
use windows::Win32::System::Com::{CLSCTX_ALL, CoCreateInstance};
use windows::Win32::System::UpdateAgent::{
    ICategory, ICategoryCollection, IUpdate, IUpdateCollection, IUpdateSearcher, IUpdateSession,
    UpdateSession,
};
use windows::core::BSTR;

use super::{Win32Runtime, bstr_to_string, com_err};
use crate::com::ComError;
use crate::com::traits::{
    ComCollection, UpdateAgentBackend, UpdateCategory, UpdateEntry, UpdateSession as Session,
};

/// Client id reported to the update agent.
pub const CLIENT_APPLICATION_ID: &str = "winglot";

/// Windows Update Agent backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32UpdateAgent;

impl UpdateAgentBackend for Win32UpdateAgent {
    type Runtime = Win32Runtime;
    type Session = Win32UpdateSession;

    fn runtime(&self) -> Win32Runtime {
        Win32Runtime
    }

    fn connect(&self, online: bool) -> Result<Win32UpdateSession, ComError> {
        // SAFETY: COM is initialized on this thread by the apartment.
        let session: IUpdateSession = unsafe { CoCreateInstance(&UpdateSession, None, CLSCTX_ALL) }
            .map_err(com_err("create update session"))?;
        unsafe { session.SetClientApplicationID(&BSTR::from(CLIENT_APPLICATION_ID)) }
            .map_err(com_err("set client application id"))?;
        let searcher = unsafe { session.CreateUpdateSearcher() }
            .map_err(com_err("create update searcher"))?;
        unsafe { searcher.SetOnline(VARIANT_BOOL::from(online)) }
            .map_err(com_err("set searcher online"))?;

        Ok(Win32UpdateSession {
            _session: session,
            searcher,
        })
    }
}

pub struct Win32UpdateSession {
    // Keeps the session alive for as long as its searcher.
    _session: IUpdateSession,
    searcher: IUpdateSearcher,
}

impl Session for Win32UpdateSession {
    type Update = Win32Update;
    type Updates = Win32UpdateCollection;

    fn search(&self, criteria: &str) -> Result<Win32UpdateCollection, ComError> {
        let result = unsafe { self.searcher.Search(&BSTR::from(criteria)) }
            .map_err(com_err("search"))?;
        unsafe { result.Updates() }
            .map(Win32UpdateCollection)
            .map_err(com_err("search result updates"))
    }
}

fn native_index(index: usize) -> Result<i32, ComError> {
    i32::try_from(index)
        .map_err(|_| ComError::new("index collection", format!("index {} out of range", index)))
}

fn native_count(count: i32) -> usize {
    usize::try_from(count).unwrap_or(0)
}

pub struct Win32UpdateCollection(IUpdateCollection);

impl ComCollection for Win32UpdateCollection {
    type Item = Win32Update;

    fn count(&self) -> Result<usize, ComError> {
        unsafe { self.0.Count() }
            .map(native_count)
            .map_err(com_err("count updates"))
    }

    fn item(&self, index: usize) -> Result<Win32Update, ComError> {
        let index = native_index(index)?;
        unsafe { self.0.get_Item(index) }
            .map(Win32Update)
            .map_err(com_err("get update"))
    }
}

pub struct Win32Update(IUpdate);

impl UpdateEntry for Win32Update {
    type Category = Win32Category;
    type Categories = Win32CategoryCollection;

    fn title(&self) -> Result<String, ComError> {
        unsafe { self.0.Title() }
            .map(bstr_to_string)
            .map_err(com_err("update title"))
    }

    fn severity(&self) -> Result<String, ComError> {
        unsafe { self.0.MsrcSeverity() }
            .map(bstr_to_string)
            .map_err(com_err("update severity"))
    }

    fn categories(&self) -> Result<Win32CategoryCollection, ComError> {
        unsafe { self.0.Categories() }
            .map(Win32CategoryCollection)
            .map_err(com_err("update categories"))
    }
}

pub struct Win32CategoryCollection(ICategoryCollection);

impl ComCollection for Win32CategoryCollection {
    type Item = Win32Category;

    fn count(&self) -> Result<usize, ComError> {
        unsafe { self.0.Count() }
            .map(native_count)
            .map_err(com_err("count categories"))
    }

    fn item(&self, index: usize) -> Result<Win32Category, ComError> {
        let index = native_index(index)?;
        unsafe { self.0.get_Item(index) }
            .map(Win32Category)
            .map_err(com_err("get category"))
    }
}

pub struct Win32Category(ICategory);

impl UpdateCategory for Win32Category {
    fn name(&self) -> Result<String, ComError> {
        unsafe { self.0.Name() }
            .map(bstr_to_string)
            .map_err(com_err("category name"))
    }

    fn order(&self) -> Result<i32, ComError> {
        unsafe { self.0.Order() }.map_err(com_err("category order"))
    }
}
