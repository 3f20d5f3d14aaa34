//! # Slot Map
//!
//! Stable-key container with O(1) insert, erase and lookup.
//!
//! ```text
//! slots:   [D1, F-, D0, F1]   key index -> dense position | free link
//! keys:    [K2, K0]           dense position -> key (back pointer)
//! values:  [v2, v0]           dense, no gaps: [0, len)
//! ```
//!
//! Erase moves the last value into the hole and repairs its back pointer,
//! then pushes the freed key onto an intrusive free list threaded through
//! `slots`. Insert pops that list before growing the key table.

use std::ops::{Index, IndexMut};

use super::key::Key;

/// State of one key-table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    /// Live: position of the value in the dense arrays.
    Occupied { dense: u32 },
    /// Dead: next free key index, if any.
    Free { next: Option<u32> },
}

/// Dense, stable-key container.
///
/// # Invariants
///
/// - every live key maps, through `slots`, to exactly one dense position;
/// - `keys[p]` is the key whose slot points at `p`;
/// - values occupy `[0, len)` with no gaps;
/// - iteration order is dense order and changes on any insert or erase.
///
/// # Example
///
/// ```rust
/// use strata_core::SlotMap;
///
/// let mut map = SlotMap::new();
/// let a = map.insert("a");
/// let b = map.insert("b");
/// map.erase(a);
/// assert_eq!(map[b], "b");
/// assert_eq!(map.len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct SlotMap<V> {
    slots: Vec<Slot>,
    keys: Vec<Key>,
    values: Vec<V>,
    free_head: Option<u32>,
}

impl<V> Default for SlotMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SlotMap<V> {
    /// Creates an empty slot map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            keys: Vec::new(),
            values: Vec::new(),
            free_head: None,
        }
    }

    /// Creates an empty slot map with room for `capacity` values.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            keys: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            free_head: None,
        }
    }

    /// Number of live values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no value is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of values that fit without reallocating.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    /// Number of key-table entries ever created (live and free).
    ///
    /// Every key handed out so far has `index() < slot_count()`.
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Reserves room for at least `additional` more values.
    pub fn reserve(&mut self, additional: usize) {
        self.slots.reserve(additional);
        self.keys.reserve(additional);
        self.values.reserve(additional);
    }

    /// Inserts a value and returns its stable key.
    ///
    /// Recycles the most recently freed key if there is one.
    ///
    /// # Panics
    ///
    /// Panics if the key table would exceed `u32::MAX` entries.
    pub fn insert(&mut self, value: V) -> Key {
        assert!(
            self.values.len() < u32::MAX as usize,
            "slot map cannot hold more than u32::MAX values"
        );
        #[allow(clippy::cast_possible_truncation)]
        let dense = self.values.len() as u32;

        let key = match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                let Slot::Free { next } = *slot else {
                    unreachable!("free list points at an occupied slot");
                };
                *slot = Slot::Occupied { dense };
                self.free_head = next;
                Key::new(index)
            }
            None => {
                assert!(
                    self.slots.len() < u32::MAX as usize,
                    "slot map key table exhausted"
                );
                #[allow(clippy::cast_possible_truncation)]
                let index = self.slots.len() as u32;
                self.slots.push(Slot::Occupied { dense });
                Key::new(index)
            }
        };

        self.keys.push(key);
        self.values.push(value);
        key
    }

    /// Erases a live value and returns it.
    ///
    /// The last dense value is moved into the hole; every other key stays
    /// valid and keeps pointing at its own value.
    ///
    /// # Panics
    ///
    /// Panics if `key` is free or was never handed out. A key whose slot has
    /// since been recycled is not detected and erases the new occupant.
    pub fn erase(&mut self, key: Key) -> V {
        let dense = self.dense_position(key).unwrap_or_else(|| {
            panic!("erase of key {key} that is not live");
        });

        let value = self.values.swap_remove(dense);
        self.keys.swap_remove(dense);

        if let Some(&moved) = self.keys.get(dense) {
            #[allow(clippy::cast_possible_truncation)]
            let dense = dense as u32;
            self.slots[moved.index()] = Slot::Occupied { dense };
        }

        self.slots[key.index()] = Slot::Free {
            next: self.free_head,
        };
        self.free_head = Some(key.raw());

        value
    }

    /// Returns `true` if `key` currently refers to a live slot.
    ///
    /// This reads free-list state only; a recycled key reports `true`.
    #[inline]
    #[must_use]
    pub fn contains(&self, key: Key) -> bool {
        self.dense_position(key).is_some()
    }

    /// Dense position of a live key.
    #[inline]
    #[must_use]
    pub fn dense_position(&self, key: Key) -> Option<usize> {
        match self.slots.get(key.index()) {
            Some(Slot::Occupied { dense }) => Some(*dense as usize),
            _ => None,
        }
    }

    /// Key of the value at dense position `pos`.
    #[inline]
    #[must_use]
    pub fn key_at(&self, pos: usize) -> Option<Key> {
        self.keys.get(pos).copied()
    }

    /// Looks up a live value.
    #[inline]
    #[must_use]
    pub fn get(&self, key: Key) -> Option<&V> {
        let dense = self.dense_position(key)?;
        self.values.get(dense)
    }

    /// Looks up a live value mutably.
    #[inline]
    pub fn get_mut(&mut self, key: Key) -> Option<&mut V> {
        let dense = self.dense_position(key)?;
        self.values.get_mut(dense)
    }

    /// Live values in dense order.
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[V] {
        &self.values
    }

    /// Live values in dense order, mutably.
    #[inline]
    pub fn values_mut(&mut self) -> &mut [V] {
        &mut self.values
    }

    /// Live keys in dense order.
    #[inline]
    #[must_use]
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Iterates `(key, value)` pairs in dense order. Use `.rev()` for the
    /// back-to-front walk.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Key, &V)> + ExactSizeIterator {
        self.keys.iter().copied().zip(self.values.iter())
    }

    /// Iterates `(key, value)` pairs mutably in dense order.
    pub fn iter_mut(
        &mut self,
    ) -> impl DoubleEndedIterator<Item = (Key, &mut V)> + ExactSizeIterator {
        self.keys.iter().copied().zip(self.values.iter_mut())
    }

    /// Keeps only the values for which `keep` returns `true`.
    ///
    /// Walks from the last dense position to the first and erases rejected
    /// values in the same pass. The value swapped into an erased position
    /// always comes from a position that was already visited, so every value
    /// is visited exactly once.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(Key, &mut V) -> bool,
    {
        let mut pos = self.values.len();
        while pos > 0 {
            pos -= 1;
            let key = self.keys[pos];
            if !keep(key, &mut self.values[pos]) {
                self.erase(key);
            }
        }
    }

    /// Erases every value and forgets every key.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.keys.clear();
        self.values.clear();
        self.free_head = None;
    }
}

impl<V> Index<Key> for SlotMap<V> {
    type Output = V;

    fn index(&self, key: Key) -> &V {
        self.get(key)
            .unwrap_or_else(|| panic!("lookup of key {key} that is not live"))
    }
}

impl<V> IndexMut<Key> for SlotMap<V> {
    fn index_mut(&mut self, key: Key) -> &mut V {
        self.get_mut(key)
            .unwrap_or_else(|| panic!("lookup of key {key} that is not live"))
    }
}
