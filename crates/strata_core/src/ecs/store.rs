//! # Component Store
//!
//! One [`SlotMap`] per registered component type, behind a single facade
//! keyed by (type, key).
//!
//! Columns are type-erased so the entity manager can create defaults and
//! destroy components knowing only their [`ComponentId`]. Typed access
//! downcasts the column back to `SlotMap<T>`.

use std::any::{type_name, Any};
use std::sync::Arc;

use super::bitset::Id;
use super::component::{Component, ComponentId};
use super::schema::Registry;
use crate::error::{EcsError, EcsResult};
use crate::slot_map::{Handle, Key, SlotMap};

/// Type-erased component column.
///
/// Implemented for `SlotMap<T>` of every component type. Query parameters
/// receive their columns through it.
pub trait ErasedColumn: Send + Sync {
    /// Upcast for downcasting to the concrete slot map.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Inserts `T::default()`.
    fn insert_default(&mut self) -> Key;

    /// Erases and drops the value at `key`.
    fn erase(&mut self, key: Key);

    /// Number of live values.
    fn len(&self) -> usize;

    /// Reserves room for `additional` more values.
    fn reserve(&mut self, additional: usize);
}

impl<T: Component> ErasedColumn for SlotMap<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn insert_default(&mut self) -> Key {
        self.insert(T::default())
    }

    fn erase(&mut self, key: Key) {
        drop(SlotMap::erase(self, key));
    }

    fn len(&self) -> usize {
        SlotMap::len(self)
    }

    fn reserve(&mut self, additional: usize) {
        SlotMap::reserve(self, additional);
    }
}

/// Column constructor stored in the registry for each component type.
pub(crate) fn new_column<T: Component>(capacity: usize) -> Box<dyn ErasedColumn> {
    Box::new(SlotMap::<T>::with_capacity(capacity))
}

/// Downcasts a column to its concrete slot map.
///
/// # Panics
///
/// Panics if the column does not hold `T`.
pub(crate) fn downcast_ref<T: Component>(column: &dyn ErasedColumn) -> &SlotMap<T> {
    column
        .as_any()
        .downcast_ref()
        .unwrap_or_else(|| panic!("column does not hold `{}`", type_name::<T>()))
}

/// Mutable variant of [`downcast_ref`].
pub(crate) fn downcast_mut<T: Component>(column: &mut Box<dyn ErasedColumn>) -> &mut SlotMap<T> {
    column
        .as_any_mut()
        .downcast_mut()
        .unwrap_or_else(|| panic!("column does not hold `{}`", type_name::<T>()))
}

/// Storage for every component value in a world.
///
/// The store owns its values: [`destroy`](Self::destroy) moves a value out,
/// erased destruction drops it. A key that is never destroyed leaks its
/// value until the store is dropped.
pub struct ComponentStore {
    registry: Arc<Registry>,
    columns: Vec<Box<dyn ErasedColumn>>,
}

impl ComponentStore {
    /// Creates one empty column per registered component type.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_capacity(registry, 0)
    }

    /// Creates the columns with room for `capacity` values each.
    #[must_use]
    pub fn with_capacity(registry: Arc<Registry>, capacity: usize) -> Self {
        let columns = registry
            .components()
            .iter()
            .map(|info| info.new_column(capacity))
            .collect();
        Self { registry, columns }
    }

    /// The registry the columns were built from.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Stores a value and returns its handle.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not a registered component type.
    pub fn create<T: Component>(&mut self, value: T) -> Handle<T> {
        Handle::from_key(self.column_mut::<T>().insert(value))
    }

    /// Removes a value and returns it.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered or `handle` is not live.
    pub fn destroy<T: Component>(&mut self, handle: Handle<T>) -> T {
        self.column_mut::<T>().erase(handle.key())
    }

    /// Borrows a value.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered or `handle` is not live.
    #[must_use]
    pub fn get<T: Component>(&self, handle: Handle<T>) -> &T {
        &self.column::<T>()[handle.key()]
    }

    /// Borrows a value mutably.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered or `handle` is not live.
    pub fn get_mut<T: Component>(&mut self, handle: Handle<T>) -> &mut T {
        &mut self.column_mut::<T>()[handle.key()]
    }

    /// Number of live values of type `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    #[must_use]
    pub fn len<T: Component>(&self) -> usize {
        self.column::<T>().len()
    }

    /// The slot map holding every `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    #[must_use]
    pub fn column<T: Component>(&self) -> &SlotMap<T> {
        downcast_ref(&*self.columns[self.id_of::<T>().index()])
    }

    /// The slot map holding every `T`, mutably.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    pub fn column_mut<T: Component>(&mut self) -> &mut SlotMap<T> {
        let index = self.id_of::<T>().index();
        downcast_mut(&mut self.columns[index])
    }

    /// Stores the default value of component `id`.
    pub fn create_default(&mut self, id: ComponentId) -> Key {
        self.columns[id.index()].insert_default()
    }

    /// Drops the value of component `id` at `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not live in that column.
    pub fn destroy_erased(&mut self, id: ComponentId, key: Key) {
        self.columns[id.index()].erase(key);
    }

    /// Number of live values of component `id`.
    #[must_use]
    pub fn len_of(&self, id: ComponentId) -> usize {
        self.columns[id.index()].len()
    }

    /// Reserves room for `additional` more values in every column.
    pub fn reserve(&mut self, additional: usize) {
        for column in &mut self.columns {
            column.reserve(additional);
        }
    }

    pub(crate) fn column_by_id(&self, id: ComponentId) -> &dyn ErasedColumn {
        &*self.columns[id.index()]
    }

    /// Borrows several columns mutably at once, in the order of `ids`.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateComponent`] if an id appears twice.
    pub(crate) fn columns_mut(
        &mut self,
        ids: &[ComponentId],
    ) -> EcsResult<Vec<&mut Box<dyn ErasedColumn>>> {
        let mut free: Vec<Option<&mut Box<dyn ErasedColumn>>> =
            self.columns.iter_mut().map(Some).collect();

        let mut picked = Vec::with_capacity(ids.len());
        for &id in ids {
            match free[id.index()].take() {
                Some(column) => picked.push(column),
                None => {
                    return Err(EcsError::DuplicateComponent {
                        component: self.registry.component_name(id).to_string(),
                    })
                }
            }
        }
        Ok(picked)
    }

    fn id_of<T: Component>(&self) -> ComponentId {
        self.registry
            .component_id::<T>()
            .unwrap_or_else(|| panic!("component type `{}` is not registered", type_name::<T>()))
    }
}
