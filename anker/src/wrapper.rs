//! ValueWrapper: a managed value paired with the handle that represents it
//! natively. The handle is assigned once; after it has been published to
//! native code it never changes for the wrapper's lifetime.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{ManagedValue, RawHandle};

/// Sentinel for a wrapper whose handle has not been assigned yet. Never
/// published across the boundary.
pub const UNSET_HANDLE: u64 = u64::MAX;

#[derive(Debug)]
pub struct ValueWrapper {
    value: ManagedValue,
    handle: AtomicU64,
}

impl ValueWrapper {
    pub fn new(value: ManagedValue, handle: RawHandle) -> Self {
        Self {
            value,
            handle: AtomicU64::new(handle.bits()),
        }
    }

    /// A wrapper created before its table slot exists.
    pub fn detached(value: ManagedValue) -> Self {
        Self {
            value,
            handle: AtomicU64::new(UNSET_HANDLE),
        }
    }

    #[inline]
    pub fn value(&self) -> &ManagedValue {
        &self.value
    }

    #[inline]
    pub fn handle(&self) -> Option<RawHandle> {
        match self.handle.load(Ordering::Acquire) {
            UNSET_HANDLE => None,
            bits => Some(RawHandle::from_bits(bits)),
        }
    }

    /// Assign the handle. Reassigning a published handle to different bits
    /// is an internal-consistency violation.
    pub fn set_handle(&self, handle: RawHandle) {
        let result = self.handle.compare_exchange(
            UNSET_HANDLE,
            handle.bits(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if let Err(current) = result {
            assert_eq!(
                current,
                handle.bits(),
                "wrapper handle is immutable once assigned"
            );
        }
    }
}
