//! # Component System
//!
//! Components are plain data values with no behaviour and no back-reference
//! to the entities that use them. Each registered component type gets one
//! [`SlotMap`](crate::SlotMap) in the [`ComponentStore`](super::ComponentStore).

use std::fmt;

use super::bitset::{Id, IdSet};

/// Marker trait for component types.
///
/// Components must be:
/// - `Default`: used when an entity is created without an explicit value
/// - `Send + Sync`: read-only passes may run on several threads
/// - `'static`: stored behind a type-erased column
///
/// # Example
///
/// ```rust
/// use strata_core::Component;
///
/// #[derive(Clone, Copy, Debug, Default, PartialEq)]
/// struct Position {
///     x: i32,
///     y: i32,
/// }
///
/// impl Component for Position {}
/// ```
pub trait Component: Default + Send + Sync + 'static {}

/// Dense id of a registered component type (0-63).
///
/// Ids are handed out in registration order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ComponentId(u8);

impl ComponentId {
    /// Creates an id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Raw id value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl Id for ComponentId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    fn from_index(index: usize) -> Self {
        debug_assert!(index < super::bitset::MAX_IDS);
        #[allow(clippy::cast_possible_truncation)]
        Self(index as u8)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Set of component ids.
pub type ComponentSet = IdSet<ComponentId>;
