//! The capability protocol for values presented by native code, and the
//! argument error raised when a caller hands us something that is neither
//! a wrapper nor pointer-like.

use std::{error::Error, fmt, sync::Arc};

use crate::ValueWrapper;

/// The underlying failure when a foreign value refuses to yield its pointer
/// identity despite claiming to have one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerError {
    message: String,
}

impl PointerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PointerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for PointerError {}

/// Caller contract violation at the boundary. Carries a human-readable
/// message; when a pointer retrieval failed, the message is the underlying
/// failure's description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentError {
    message: String,
}

impl ArgumentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "argument error: {}", self.message)
    }
}

impl Error for ArgumentError {}

impl From<PointerError> for ArgumentError {
    fn from(error: PointerError) -> Self {
        Self::new(error.message)
    }
}

/// What the bridge needs from a native-presented value: is it already one
/// of our wrappers, and if not, can it yield a pointer-sized identity?
/// The native runtime owns the concrete implementations.
pub trait ForeignValue {
    /// Wrapper pass-through: a value that already is a wrapper yields it
    /// directly, skipping classification.
    fn as_value_wrapper(&self) -> Option<Arc<ValueWrapper>> {
        None
    }

    fn is_pointer(&self) -> bool {
        false
    }

    fn as_pointer(&self) -> Result<u64, PointerError> {
        Err(PointerError::new("foreign value does not expose a pointer"))
    }
}

impl ForeignValue for Arc<ValueWrapper> {
    fn as_value_wrapper(&self) -> Option<Arc<ValueWrapper>> {
        Some(self.clone())
    }

    fn is_pointer(&self) -> bool {
        self.handle().is_some()
    }

    fn as_pointer(&self) -> Result<u64, PointerError> {
        self.handle()
            .map(|handle| handle.bits())
            .ok_or_else(|| PointerError::new("wrapper has no native handle assigned"))
    }
}

/// A bare pointer-sized word crossing the boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NativePointer(pub u64);

impl ForeignValue for NativePointer {
    fn is_pointer(&self) -> bool {
        true
    }

    fn as_pointer(&self) -> Result<u64, PointerError> {
        Ok(self.0)
    }
}
