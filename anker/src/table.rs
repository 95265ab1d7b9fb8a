//! HandleTable: the bidirectional map behind tagged object handles.
//!
//! Sharded so unrelated values never serialize. Allocated handles embed the
//! shard index in their low bits, so a reverse lookup routes straight to the
//! shard that owns the slot without consulting the forward key.

use std::{
    collections::HashMap,
    hash::BuildHasher,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::RwLock;

use crate::{
    FIRST_OBJECT_HANDLE, HANDLE_ALIGNMENT, ManagedValue, ObjectIdentity, RawHandle, ValueWrapper,
};
use std::sync::Arc;

pub const SHARD_BITS: u32 = 4;
pub const SHARD_COUNT: usize = 1 << SHARD_BITS;

/// Forward-map key: the identity under which a value claims its one live
/// handle. Heap values dedupe by pointer identity, integers too wide for the
/// tagged encoding dedupe by value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    Object(ObjectIdentity),
    Integer(i64),
}

impl TableKey {
    pub fn for_value(value: &ManagedValue) -> Option<TableKey> {
        match value {
            ManagedValue::Object(object) => Some(TableKey::Object(object.identity())),
            ManagedValue::Integer(integer) => Some(TableKey::Integer(*integer)),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Shard {
    forward: HashMap<TableKey, Arc<ValueWrapper>, ahash::RandomState>,
    reverse: HashMap<u64, Arc<ValueWrapper>, ahash::RandomState>,
    next_index: u64,
}

pub struct HandleTable {
    shards: [RwLock<Shard>; SHARD_COUNT],
    router: ahash::RandomState,
    epoch: AtomicU64,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            shards: std::array::from_fn(|_| RwLock::new(Shard::default())),
            router: ahash::RandomState::new(),
            epoch: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard_of_key(&self, key: TableKey) -> usize {
        self.router.hash_one(key) as usize & (SHARD_COUNT - 1)
    }

    #[inline]
    fn shard_of_handle(bits: u64) -> usize {
        (((bits - FIRST_OBJECT_HANDLE) / HANDLE_ALIGNMENT) & (SHARD_COUNT as u64 - 1)) as usize
    }

    #[inline]
    fn handle_for(shard: usize, index: u64) -> RawHandle {
        let slot = (index << SHARD_BITS) | shard as u64;
        RawHandle::from_bits(FIRST_OBJECT_HANDLE + slot * HANDLE_ALIGNMENT)
    }

    /// Insert-or-get: the one handle for `value`, allocating a slot on first
    /// sight. Atomic with respect to the forward map, so concurrent wraps of
    /// the same value observe exactly one winning handle.
    pub fn intern(&self, value: &ManagedValue) -> Arc<ValueWrapper> {
        let key = TableKey::for_value(value).expect("immediate values are never table backed");
        let shard_index = self.shard_of_key(key);

        {
            let shard = self.shards[shard_index].read();
            if let Some(wrapper) = shard.forward.get(&key) {
                return wrapper.clone();
            }
        }

        let mut shard = self.shards[shard_index].write();
        // another thread may have won the race between the two locks
        if let Some(wrapper) = shard.forward.get(&key) {
            return wrapper.clone();
        }

        let handle = Self::handle_for(shard_index, shard.next_index);
        shard.next_index += 1;
        debug_assert!(handle.is_tagged_object());

        let wrapper = Arc::new(ValueWrapper::new(value.clone(), handle));
        let previous = shard.reverse.insert(handle.bits(), wrapper.clone());
        assert!(
            previous.is_none(),
            "handle table corruption: duplicate handle {:#x}",
            handle.bits()
        );
        shard.forward.insert(key, wrapper.clone());
        log::trace!(
            "allocated handle {:#x} in shard {shard_index}",
            handle.bits()
        );
        wrapper
    }

    /// Reverse lookup. `None` for anything that is not a live slot: a stale
    /// or released handle, or a word that was never issued.
    pub fn lookup(&self, handle: RawHandle) -> Option<Arc<ValueWrapper>> {
        if !handle.is_tagged_object() {
            return None;
        }
        let shard = self.shards[Self::shard_of_handle(handle.bits())].read();
        shard.reverse.get(&handle.bits()).cloned()
    }

    /// The native side dropped the handle. Removes both directions; a later
    /// wrap of the same value allocates a fresh slot.
    pub fn release(&self, handle: RawHandle) -> bool {
        if !handle.is_tagged_object() {
            return false;
        }
        let removed = {
            let mut shard = self.shards[Self::shard_of_handle(handle.bits())].write();
            let Some(wrapper) = shard.reverse.remove(&handle.bits()) else {
                return false;
            };
            let key =
                TableKey::for_value(wrapper.value()).expect("table entries always have a key");
            shard.forward.remove(&key);
            wrapper
        };
        self.epoch.fetch_add(1, Ordering::Release);
        log::debug!(
            "released handle {:#x} for {:?}",
            handle.bits(),
            removed.value()
        );
        true
    }

    /// Bumped on every release; call-site caches revalidate against it.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().reverse.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
