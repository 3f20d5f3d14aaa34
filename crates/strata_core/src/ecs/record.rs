//! # Entity Records
//!
//! An entity is identified by the schema it is viewed under plus a key into
//! that schema's record table. A composite entity has one record per schema
//! in its tree; every record of the tree shares the same component keys and
//! lists every base record, so any view resolves to any other in O(1).
//!
//! ```text
//! BasicCharacter #0   components {Render:#3, Position:#5, Physics:#1}
//!                     bases      {Renderable:#2, Movable:#0}   parent: Root
//! Renderable #2       components {Render:#3, Position:#5}
//!                     bases      {Renderable:#2, Movable:#0}   parent: BasicCharacter #0
//! Movable #0          components {Position:#5, Physics:#1}
//!                     bases      {Renderable:#2, Movable:#0}   parent: BasicCharacter #0
//! ```

use std::fmt;
use std::ops::Index;

use super::bitset::{Id, IdSet};
use super::component::ComponentId;
use super::schema::SchemaId;
use crate::slot_map::Key;

/// Handle to an entity record: a schema plus a key into its table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    schema: SchemaId,
    key: Key,
}

impl Entity {
    /// Creates an entity handle.
    #[inline]
    #[must_use]
    pub const fn new(schema: SchemaId, key: Key) -> Self {
        Self { schema, key }
    }

    /// Schema the handle views the entity under.
    #[inline]
    #[must_use]
    pub const fn schema(self) -> SchemaId {
        self.schema
    }

    /// Key into that schema's record table.
    #[inline]
    #[must_use]
    pub const fn key(self) -> Key {
        self.key
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{}", self.schema, self.key)
    }
}

/// Owner of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parent {
    /// The record is the root of its tree.
    Root,
    /// The record is a base row embedded in this root.
    Embedded(Entity),
}

/// Keys indexed by a bitset of ids, stored in ascending id order.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyTable<I> {
    set: IdSet<I>,
    keys: Vec<Key>,
}

/// Component keys of one record.
pub type ComponentKeys = KeyTable<ComponentId>;

/// Base-record keys of one tree.
pub type BaseKeys = KeyTable<SchemaId>;

impl<I> Default for KeyTable<I> {
    fn default() -> Self {
        Self {
            set: IdSet::EMPTY,
            keys: Vec::new(),
        }
    }
}

impl<I: Id> KeyTable<I> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids present in the table.
    #[inline]
    #[must_use]
    pub fn set(&self) -> IdSet<I> {
        self.set
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the table is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key stored for `id`.
    #[inline]
    #[must_use]
    pub fn get(&self, id: I) -> Option<Key> {
        if self.set.contains(id) {
            Some(self.keys[self.set.rank(id)])
        } else {
            None
        }
    }

    /// Stores `key` for `id`, returning the key it replaces.
    pub fn insert(&mut self, id: I, key: Key) -> Option<Key> {
        let rank = self.set.rank(id);
        if self.set.insert(id) {
            self.keys.insert(rank, key);
            None
        } else {
            Some(std::mem::replace(&mut self.keys[rank], key))
        }
    }

    /// Removes the entry for `id`.
    pub fn remove(&mut self, id: I) -> Option<Key> {
        if self.set.remove(id) {
            Some(self.keys.remove(self.set.rank(id)))
        } else {
            None
        }
    }

    /// Entries whose id is in `ids`.
    #[must_use]
    pub fn project(&self, ids: IdSet<I>) -> Self {
        let set = self.set.intersection(ids);
        let keys = self
            .iter()
            .filter(|&(id, _)| set.contains(id))
            .map(|(_, key)| key)
            .collect();
        Self { set, keys }
    }

    /// Iterates `(id, key)` in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (I, Key)> + '_ {
        self.set.iter().zip(self.keys.iter().copied())
    }
}

impl<I: Id> Index<I> for KeyTable<I> {
    type Output = Key;

    fn index(&self, id: I) -> &Key {
        assert!(self.set.contains(id), "no key for {id:?}");
        &self.keys[self.set.rank(id)]
    }
}

impl<I: Id> fmt::Debug for KeyTable<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<I: Id> FromIterator<(I, Key)> for KeyTable<I> {
    fn from_iter<T: IntoIterator<Item = (I, Key)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (id, key) in iter {
            table.insert(id, key);
        }
        table
    }
}

/// Stored row of one schema's table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityRecord {
    pub(crate) components: ComponentKeys,
    pub(crate) bases: BaseKeys,
    pub(crate) parent: Parent,
}

impl EntityRecord {
    /// Keys of every component the record's schema carries.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &ComponentKeys {
        &self.components
    }

    /// Keys of every base record of the tree.
    #[inline]
    #[must_use]
    pub fn bases(&self) -> &BaseKeys {
        &self.bases
    }

    /// Owner of this record.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Parent {
        self.parent
    }
}
