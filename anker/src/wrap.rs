//! The managed-to-native direction: assign a value its handle representation
//! and produce the wrapper native code will hold.
//!
//! A `WrapSite` is one call site. Immediate values never touch the table;
//! for heap values the site keeps a monomorphic cache of the last wrapped
//! object, validated against the table epoch so a release invalidates it.

use std::{cell::RefCell, sync::Arc};

use crate::{HandleTable, HeapRef, ManagedValue, ObjectIdentity, ValueWrapper};

struct CachedWrap {
    identity: ObjectIdentity,
    epoch: u64,
    wrapper: Arc<ValueWrapper>,
}

pub struct WrapSite {
    table: Arc<HandleTable>,
    last_object: RefCell<Option<CachedWrap>>,
}

impl WrapSite {
    pub(crate) fn new(table: Arc<HandleTable>) -> Self {
        Self {
            table,
            last_object: RefCell::new(None),
        }
    }

    /// The one handle representation for `value`: singleton constants and
    /// in-range integers encode immediately, everything else goes through
    /// the table's insert-or-get.
    pub fn wrap(&self, value: &ManagedValue) -> Arc<ValueWrapper> {
        if let Some(handle) = value.immediate_handle() {
            return Arc::new(ValueWrapper::new(value.clone(), handle));
        }
        match value {
            ManagedValue::Object(object) => self.wrap_object(object, value),
            // integers too wide for the tagged encoding
            _ => self.table.intern(value),
        }
    }

    fn wrap_object(&self, object: &HeapRef, value: &ManagedValue) -> Arc<ValueWrapper> {
        let identity = object.identity();
        let epoch = self.table.epoch();

        if let Some(cached) = self.last_object.borrow().as_ref()
            && cached.identity == identity
            && cached.epoch == epoch
        {
            return cached.wrapper.clone();
        }

        let wrapper = self.table.intern(value);
        *self.last_object.borrow_mut() = Some(CachedWrap {
            identity,
            epoch,
            wrapper: wrapper.clone(),
        });
        wrapper
    }
}
