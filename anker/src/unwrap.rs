//! The native-to-managed direction: classify an incoming word or foreign
//! value and resolve it to a managed value or wrapper.
//!
//! An `UnwrapSite` is one call site. Call sites tend to see one or two
//! handle shapes over their lifetime, so each site remembers its last
//! classification and revalidates it with a single cheap test before
//! falling back to the full classifier. Sites are cheap to mint and live on
//! one thread; the table behind them is shared.

use std::{cell::Cell, sync::Arc};

use crate::{
    ArgumentError, ForeignValue, HandleClass, HandleTable, ManagedValue, RawHandle, ValueWrapper,
};

pub struct UnwrapSite {
    table: Arc<HandleTable>,
    last_class: Cell<Option<HandleClass>>,
}

impl UnwrapSite {
    pub(crate) fn new(table: Arc<HandleTable>) -> Self {
        Self {
            table,
            last_class: Cell::new(None),
        }
    }

    #[inline]
    fn classify_cached(&self, handle: RawHandle) -> HandleClass {
        if let Some(last) = self.last_class.get()
            && last.matches(handle)
        {
            return last;
        }
        let class = handle.classify();
        self.last_class.set(Some(class));
        class
    }

    /// Resolve a handle to the bare managed value. Invalid words and stale
    /// table slots yield `None`: probing uninitialized memory during interop
    /// negotiation is expected at some call sites and must not raise.
    pub fn unwrap_handle(&self, handle: RawHandle) -> Option<ManagedValue> {
        match self.classify_cached(handle) {
            HandleClass::Singleton(singleton) => Some(ManagedValue::from(singleton)),
            HandleClass::TaggedInteger => Some(ManagedValue::Integer(handle.decode_integer())),
            HandleClass::TaggedObject => self
                .table
                .lookup(handle)
                .map(|wrapper| wrapper.value().clone()),
            HandleClass::Invalid => None,
        }
    }

    /// Same classification, but every branch yields a wrapper carrying
    /// exactly the presented handle bits, so a later re-export reproduces
    /// the handle the native caller used.
    pub fn native_to_wrapper(&self, handle: RawHandle) -> Option<Arc<ValueWrapper>> {
        match self.classify_cached(handle) {
            HandleClass::Singleton(singleton) => Some(Arc::new(ValueWrapper::new(
                ManagedValue::from(singleton),
                singleton.handle(),
            ))),
            HandleClass::TaggedInteger => Some(Arc::new(ValueWrapper::new(
                ManagedValue::Integer(handle.decode_integer()),
                handle,
            ))),
            HandleClass::TaggedObject => self.table.lookup(handle),
            HandleClass::Invalid => None,
        }
    }

    /// Resolve a foreign value to the bare managed value. A foreign value
    /// that is not pointer-like is a caller contract violation.
    pub fn unwrap_foreign(
        &self,
        value: &dyn ForeignValue,
    ) -> Result<Option<ManagedValue>, ArgumentError> {
        if let Some(wrapper) = value.as_value_wrapper() {
            return Ok(Some(wrapper.value().clone()));
        }
        if value.is_pointer() {
            let bits = value.as_pointer().map_err(ArgumentError::from)?;
            Ok(self.unwrap_handle(RawHandle::from_bits(bits)))
        } else {
            Err(ArgumentError::new("not a handle or a pointer"))
        }
    }

    /// Wrapper-returning variant. A non-pointer foreign value yields
    /// `Ok(None)` here; the probing call sites that use this path treat it
    /// as "no wrapper" rather than an error.
    pub fn foreign_to_wrapper(
        &self,
        value: &dyn ForeignValue,
    ) -> Result<Option<Arc<ValueWrapper>>, ArgumentError> {
        if let Some(wrapper) = value.as_value_wrapper() {
            return Ok(Some(wrapper));
        }
        if value.is_pointer() {
            let bits = value.as_pointer().map_err(ArgumentError::from)?;
            Ok(self.native_to_wrapper(RawHandle::from_bits(bits)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod unwrap_tests {
    use super::*;
    use crate::{
        FALSE_HANDLE, HeapRef, NIL_HANDLE, NativePointer, PointerError, Singleton, TRUE_HANDLE,
        UNDEF_HANDLE,
    };

    fn site() -> (Arc<HandleTable>, UnwrapSite) {
        let table = Arc::new(HandleTable::new());
        let site = UnwrapSite::new(table.clone());
        (table, site)
    }

    struct NotAPointer;
    impl ForeignValue for NotAPointer {}

    struct BrokenPointer;
    impl ForeignValue for BrokenPointer {
        fn is_pointer(&self) -> bool {
            true
        }
        fn as_pointer(&self) -> Result<u64, PointerError> {
            Err(PointerError::new("asPointer not supported"))
        }
    }

    #[test]
    fn singleton_handles_unwrap_to_their_constants() {
        let (_table, site) = site();
        let cases = [
            (FALSE_HANDLE, ManagedValue::False),
            (TRUE_HANDLE, ManagedValue::True),
            (UNDEF_HANDLE, ManagedValue::Undefined),
            (NIL_HANDLE, ManagedValue::Nil),
        ];
        for (bits, expected) in cases {
            assert_eq!(
                site.unwrap_handle(RawHandle::from_bits(bits)),
                Some(expected)
            );
        }
    }

    #[test]
    fn tagged_integers_unwrap_to_their_value() {
        let (_table, site) = site();
        assert_eq!(
            site.unwrap_handle(RawHandle::from_bits(11)),
            Some(ManagedValue::Integer(5))
        );
        let negative = RawHandle::encode_integer(-40).expect("in range");
        assert_eq!(
            site.unwrap_handle(negative),
            Some(ManagedValue::Integer(-40))
        );
    }

    #[test]
    fn object_handles_resolve_through_the_table() {
        let (table, site) = site();
        let value = ManagedValue::Object(HeapRef::new("payload"));
        let handle = table.intern(&value).handle().expect("assigned");

        assert_eq!(site.unwrap_handle(handle), Some(value.clone()));

        let wrapper = site.native_to_wrapper(handle).expect("live slot");
        assert_eq!(wrapper.handle(), Some(handle));
        assert_eq!(wrapper.value(), &value);
    }

    #[test]
    fn garbage_words_yield_the_no_value_sentinel() {
        let (_table, site) = site();
        // never-issued but well-formed object handle
        assert_eq!(site.unwrap_handle(RawHandle::from_bits(0x2000)), None);
        // not matching any shape
        assert_eq!(site.unwrap_handle(RawHandle::from_bits(0x22)), None);
        assert!(site.native_to_wrapper(RawHandle::from_bits(0x22)).is_none());
    }

    #[test]
    fn wrapper_round_trip_preserves_the_presented_handle() {
        let (_table, site) = site();
        let handle = RawHandle::from_bits(11);
        let wrapper = site.native_to_wrapper(handle).expect("tagged integer");
        assert_eq!(wrapper.handle(), Some(handle));
        assert_eq!(wrapper.value(), &ManagedValue::Integer(5));

        let nil = site
            .native_to_wrapper(RawHandle::from_bits(NIL_HANDLE))
            .expect("singleton");
        assert_eq!(nil.handle(), Some(Singleton::Nil.handle()));
    }

    #[test]
    fn foreign_wrapper_passes_through_without_classification() {
        let (_table, site) = site();
        let wrapper = Arc::new(ValueWrapper::new(
            ManagedValue::Integer(7),
            RawHandle::encode_integer(7).expect("in range"),
        ));

        let value = site.unwrap_foreign(&wrapper).expect("no error");
        assert_eq!(value, Some(ManagedValue::Integer(7)));

        let passed = site
            .foreign_to_wrapper(&wrapper)
            .expect("no error")
            .expect("wrapper");
        assert!(Arc::ptr_eq(&wrapper, &passed));
    }

    #[test]
    fn foreign_pointer_words_unwrap_like_handles() {
        let (table, site) = site();
        let value = ManagedValue::Object(HeapRef::new(17u64));
        let handle = table.intern(&value).handle().expect("assigned");

        let foreign = NativePointer(handle.bits());
        assert_eq!(site.unwrap_foreign(&foreign).expect("no error"), Some(value));

        let probe = NativePointer(0x5008);
        assert_eq!(
            site.unwrap_foreign(&probe).expect("no error"),
            None,
            "an unallocated slot is the sentinel, not an error"
        );
    }

    #[test]
    fn non_pointer_foreign_value_is_an_argument_error() {
        let (_table, site) = site();
        let error = site.unwrap_foreign(&NotAPointer).expect_err("must raise");
        assert_eq!(error.message(), "not a handle or a pointer");

        // the wrapper-returning path probes instead of raising
        assert!(
            site.foreign_to_wrapper(&NotAPointer)
                .expect("no error")
                .is_none()
        );
    }

    #[test]
    fn failing_pointer_retrieval_wraps_the_underlying_message() {
        let (_table, site) = site();
        let error = site.unwrap_foreign(&BrokenPointer).expect_err("must raise");
        assert_eq!(error.message(), "asPointer not supported");

        let error = site
            .foreign_to_wrapper(&BrokenPointer)
            .expect_err("must raise");
        assert_eq!(error.message(), "asPointer not supported");
    }

    #[test]
    fn site_cache_follows_the_shapes_a_call_site_sees() {
        let (_table, site) = site();
        assert_eq!(site.last_class.get(), None);

        site.unwrap_handle(RawHandle::from_bits(11));
        assert_eq!(site.last_class.get(), Some(HandleClass::TaggedInteger));

        // another integer revalidates the cached class without replacing it
        site.unwrap_handle(RawHandle::from_bits(201));
        assert_eq!(site.last_class.get(), Some(HandleClass::TaggedInteger));

        // a singleton misses the cache and rewrites it
        site.unwrap_handle(RawHandle::from_bits(TRUE_HANDLE));
        assert_eq!(
            site.last_class.get(),
            Some(HandleClass::Singleton(Singleton::True))
        );

        // results stay correct across the shape change
        assert_eq!(
            site.unwrap_handle(RawHandle::from_bits(FALSE_HANDLE)),
            Some(ManagedValue::False)
        );
    }
}
