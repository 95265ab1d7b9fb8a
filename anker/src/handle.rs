//! RawHandle: the 64-bit word native code holds in place of a managed value.
//!
//! Four mutually exclusive shapes, decidable from the bits alone:
//! singleton constants (false/true/undefined/nil), tagged small integers
//! (low bit set), tagged object handles (8-aligned, above the reserved low
//! region, backed by a table slot) and everything else, which is invalid.

/// Handle of the managed `false` value.
pub const FALSE_HANDLE: u64 = 0b000;
/// Handle of the managed `true` value.
pub const TRUE_HANDLE: u64 = 0b010;
/// Handle of the nil value.
pub const NIL_HANDLE: u64 = 0b100;
/// Handle of the "argument not provided" marker.
pub const UNDEF_HANDLE: u64 = 0b110;

pub const INTEGER_TAG: u64 = 0b1;

/// Object handles are multiples of this, so their low bits stay clear of
/// the integer tag and the singleton constants.
pub const HANDLE_ALIGNMENT: u64 = 8;

/// Lowest object handle the table will ever hand out. The region below is
/// reserved so small garbage words can never alias a table slot.
pub const FIRST_OBJECT_HANDLE: u64 = 0x1000;

/// Largest integer whose tagged encoding round-trips. The tag costs one bit.
pub const INTEGER_MAX: i64 = (1 << 62) - 1;
/// Smallest integer whose tagged encoding round-trips.
pub const INTEGER_MIN: i64 = -(1 << 62);

/// A pointer-sized word crossing the native boundary.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RawHandle(u64);

/// The four recognized singleton values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Singleton {
    False,
    True,
    Undefined,
    Nil,
}

/// Total classification of a handle word.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HandleClass {
    Singleton(Singleton),
    TaggedInteger,
    TaggedObject,
    Invalid,
}

impl Singleton {
    #[inline]
    pub const fn handle(self) -> RawHandle {
        match self {
            Singleton::False => RawHandle(FALSE_HANDLE),
            Singleton::True => RawHandle(TRUE_HANDLE),
            Singleton::Undefined => RawHandle(UNDEF_HANDLE),
            Singleton::Nil => RawHandle(NIL_HANDLE),
        }
    }
}

impl RawHandle {
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_tagged_integer(self) -> bool {
        self.0 & INTEGER_TAG == INTEGER_TAG
    }

    #[inline]
    pub fn is_singleton(self) -> bool {
        matches!(self.0, FALSE_HANDLE | TRUE_HANDLE | NIL_HANDLE | UNDEF_HANDLE)
    }

    #[inline]
    pub fn is_tagged_object(self) -> bool {
        self.0 & (HANDLE_ALIGNMENT - 1) == 0 && self.0 >= FIRST_OBJECT_HANDLE
    }

    /// Total over all 2^64 inputs; a short chain of equality and bit tests.
    #[inline]
    pub fn classify(self) -> HandleClass {
        if self.is_tagged_integer() {
            return HandleClass::TaggedInteger;
        }
        match self.0 {
            FALSE_HANDLE => HandleClass::Singleton(Singleton::False),
            TRUE_HANDLE => HandleClass::Singleton(Singleton::True),
            UNDEF_HANDLE => HandleClass::Singleton(Singleton::Undefined),
            NIL_HANDLE => HandleClass::Singleton(Singleton::Nil),
            _ if self.is_tagged_object() => HandleClass::TaggedObject,
            _ => HandleClass::Invalid,
        }
    }

    /// `None` when the shift would lose bits. Callers that must encode
    /// out-of-range integers go through the handle table instead.
    #[inline]
    pub fn encode_integer(value: i64) -> Option<RawHandle> {
        if !(INTEGER_MIN..=INTEGER_MAX).contains(&value) {
            return None;
        }
        let tagged = (value << 1).cast_unsigned() | INTEGER_TAG;
        Some(Self(tagged))
    }

    /// Only defined for `TaggedInteger` handles. Arithmetic shift,
    /// sign-extending.
    #[inline]
    pub fn decode_integer(self) -> i64 {
        debug_assert!(self.is_tagged_integer(), "handle is not a tagged integer");
        self.0.cast_signed() >> 1
    }
}

impl HandleClass {
    /// Cheap revalidation used by call-site caches: does `handle` still fall
    /// into this class? A remembered `Invalid` never matches, so corrupt
    /// words always take the full classification path.
    #[inline]
    pub fn matches(self, handle: RawHandle) -> bool {
        match self {
            HandleClass::Singleton(singleton) => handle == singleton.handle(),
            HandleClass::TaggedInteger => handle.is_tagged_integer(),
            HandleClass::TaggedObject => handle.is_tagged_object(),
            HandleClass::Invalid => false,
        }
    }
}

impl From<Singleton> for RawHandle {
    #[inline]
    fn from(singleton: Singleton) -> Self {
        singleton.handle()
    }
}

impl From<RawHandle> for u64 {
    #[inline]
    fn from(handle: RawHandle) -> Self {
        handle.bits()
    }
}
