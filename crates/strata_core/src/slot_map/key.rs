//! # Slot Map Keys
//!
//! Keys are stable indices into a slot map's key table. They survive
//! compaction of the dense value array but carry no generation counter:
//! a key that outlives its value is a caller bug, not a detected error.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Untyped stable key into a [`SlotMap`](super::SlotMap).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Key(u32);

impl Key {
    /// Creates a key from a raw key-table index.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw key-table index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw index as stored.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A [`Key`] tagged with the type of value it refers to.
///
/// Equality, ordering and hashing only look at the index. `T` is a marker;
/// no bounds are placed on it so handles stay `Copy` for any value type.
#[repr(transparent)]
pub struct Handle<T> {
    key: Key,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Wraps an untyped key.
    #[inline]
    #[must_use]
    pub const fn from_key(key: Key) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    /// Returns the untyped key.
    #[inline]
    #[must_use]
    pub const fn key(self) -> Key {
        self.key
    }

    /// Returns the raw key-table index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.key.index()
    }
}

impl<T> From<Handle<T>> for Key {
    fn from(handle: Handle<T>) -> Self {
        handle.key
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle")
            .field(&std::any::type_name::<T>())
            .field(&self.key.0)
            .finish()
    }
}
