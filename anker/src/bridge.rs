//! HandleBridge: the shared state of the boundary, one per managed context.
//! Dispatch sites are minted from it and hold the shared table; the bridge
//! itself is handed around as `Arc<HandleBridge>`.

use std::sync::Arc;

use crate::{HandleTable, ManagedValue, RawHandle, UnwrapSite, ValueWrapper, WrapSite};

pub struct HandleBridge {
    table: Arc<HandleTable>,
}

impl Default for HandleBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleBridge {
    pub fn new() -> Self {
        Self {
            table: Arc::new(HandleTable::new()),
        }
    }

    /// Mint a dispatcher for one native-to-managed call site.
    pub fn unwrap_site(&self) -> UnwrapSite {
        UnwrapSite::new(self.table.clone())
    }

    /// Mint a dispatcher for one managed-to-native call site.
    pub fn wrap_site(&self) -> WrapSite {
        WrapSite::new(self.table.clone())
    }

    /// One-shot wrap for cold callers that have no call site to attach a
    /// cache to.
    pub fn wrap_value(&self, value: &ManagedValue) -> Arc<ValueWrapper> {
        self.wrap_site().wrap(value)
    }

    /// One-shot unwrap for cold callers.
    pub fn unwrap_value(&self, handle: RawHandle) -> Option<ManagedValue> {
        self.unwrap_site().unwrap_handle(handle)
    }

    /// The native side dropped `handle`.
    pub fn release(&self, handle: RawHandle) -> bool {
        self.table.release(handle)
    }

    /// Number of live table slots; immediate handles are not counted.
    pub fn live_handles(&self) -> usize {
        self.table.len()
    }
}
