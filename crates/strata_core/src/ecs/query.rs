//! # Queries
//!
//! A query names the components a pass reads or writes: `&T`, `&mut T`, or
//! a tuple of those (up to six). Every callback receives the component
//! references plus the [`Entity`](super::Entity) being visited.
//!
//! Columns are borrowed once per pass. A `&mut T` column is split up front
//! into one `&mut T` per record of the table being walked, so handing out
//! references for different records never aliases, and the cost of a pass
//! follows the table size rather than the column size. Within one schema
//! table each record owns its own component keys, so every slot is taken
//! at most once.

use std::any::type_name;

use super::component::{Component, ComponentId};
use super::record::{ComponentKeys, EntityRecord};
use super::schema::Registry;
use super::store::{downcast_mut, downcast_ref, ComponentStore, ErasedColumn};
use crate::error::EcsResult;
use crate::slot_map::{Key, SlotMap};

/// One element of a query.
pub trait QueryParam {
    /// Reference handed to the callback.
    type Item<'w>;

    /// Column borrow held for the duration of a pass.
    type Column<'w>;

    /// Registered id of the component.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredComponent`](crate::EcsError::UnregisteredComponent)
    /// if the type was never registered.
    fn component_id(registry: &Registry) -> EcsResult<ComponentId>;

    /// Borrows the column for a pass over the records of `table`.
    fn column<'w>(
        column: &'w mut Box<dyn ErasedColumn>,
        id: ComponentId,
        table: &SlotMap<EntityRecord>,
    ) -> Self::Column<'w>;

    /// Reference for the record whose component keys are `keys`.
    fn fetch<'w>(column: &mut Self::Column<'w>, keys: &ComponentKeys) -> Self::Item<'w>;

    /// Reference to a single value, without preparing a whole column.
    fn get<'w>(column: &'w mut Box<dyn ErasedColumn>, key: Key) -> Self::Item<'w>;
}

/// Query element that never writes.
pub trait ReadOnlyParam: QueryParam {
    /// Borrows the column through a shared reference.
    fn column_ref<'w>(column: &'w dyn ErasedColumn, id: ComponentId) -> Self::Column<'w>;
}

/// Shared column borrow for `&T`.
pub struct ColumnRef<'w, T> {
    id: ComponentId,
    map: &'w SlotMap<T>,
}

/// Exclusive column borrow for `&mut T`.
///
/// Holds one `&mut T` per record of the table being walked, sorted by key.
/// Values of the column that belong to other schemas are never touched.
pub struct ColumnMut<'w, T> {
    id: ComponentId,
    slots: Vec<(Key, Option<&'w mut T>)>,
}

impl<'w, T> ColumnMut<'w, T> {
    fn new(id: ComponentId, map: &'w mut SlotMap<T>, table: &SlotMap<EntityRecord>) -> Self {
        let mut wanted: Vec<(usize, Key)> = table
            .values()
            .iter()
            .map(|record| {
                let key = record.components()[id];
                let pos = map
                    .dense_position(key)
                    .unwrap_or_else(|| panic!("record points at free key {key}"));
                (pos, key)
            })
            .collect();
        wanted.sort_unstable_by_key(|&(pos, _)| pos);

        let mut slots = Vec::with_capacity(wanted.len());
        let mut rest: &'w mut [T] = map.values_mut();
        let mut offset = 0;
        for (pos, key) in wanted {
            let skip = pos
                .checked_sub(offset)
                .unwrap_or_else(|| panic!("key {key} referenced twice in one table"));
            let (_, tail) = std::mem::take(&mut rest).split_at_mut(skip);
            let Some((value, tail)) = tail.split_first_mut() else {
                unreachable!("dense position {pos} out of range");
            };
            slots.push((key, Some(value)));
            rest = tail;
            offset = pos + 1;
        }
        slots.sort_unstable_by_key(|&(key, _)| key);
        Self { id, slots }
    }
}

impl<T: Component> QueryParam for &T {
    type Item<'w> = &'w T;
    type Column<'w> = ColumnRef<'w, T>;

    fn component_id(registry: &Registry) -> EcsResult<ComponentId> {
        registry.require_component::<T>()
    }

    fn column<'w>(
        column: &'w mut Box<dyn ErasedColumn>,
        id: ComponentId,
        _table: &SlotMap<EntityRecord>,
    ) -> Self::Column<'w> {
        ColumnRef {
            id,
            map: downcast_mut::<T>(column),
        }
    }

    fn fetch<'w>(column: &mut Self::Column<'w>, keys: &ComponentKeys) -> <Self as QueryParam>::Item<'w> {
        let map: &'w SlotMap<T> = column.map;
        &map[keys[column.id]]
    }

    fn get<'w>(column: &'w mut Box<dyn ErasedColumn>, key: Key) -> <Self as QueryParam>::Item<'w> {
        &downcast_mut::<T>(column)[key]
    }
}

impl<T: Component> ReadOnlyParam for &T {
    fn column_ref<'w>(column: &'w dyn ErasedColumn, id: ComponentId) -> Self::Column<'w> {
        ColumnRef {
            id,
            map: downcast_ref::<T>(column),
        }
    }
}

impl<T: Component> QueryParam for &mut T {
    type Item<'w> = &'w mut T;
    type Column<'w> = ColumnMut<'w, T>;

    fn component_id(registry: &Registry) -> EcsResult<ComponentId> {
        registry.require_component::<T>()
    }

    fn column<'w>(
        column: &'w mut Box<dyn ErasedColumn>,
        id: ComponentId,
        table: &SlotMap<EntityRecord>,
    ) -> Self::Column<'w> {
        ColumnMut::new(id, downcast_mut::<T>(column), table)
    }

    fn fetch<'w>(column: &mut Self::Column<'w>, keys: &ComponentKeys) -> <Self as QueryParam>::Item<'w> {
        let key = keys[column.id];
        column
            .slots
            .binary_search_by_key(&key, |&(slot, _)| slot)
            .ok()
            .and_then(|index| column.slots[index].1.take())
            .unwrap_or_else(|| {
                panic!(
                    "`{}` at key {key} is not in this pass or was fetched twice",
                    type_name::<T>()
                )
            })
    }

    fn get<'w>(column: &'w mut Box<dyn ErasedColumn>, key: Key) -> <Self as QueryParam>::Item<'w> {
        &mut downcast_mut::<T>(column)[key]
    }
}

/// A full query: one parameter or a tuple of parameters.
pub trait Query {
    /// References handed to the callback.
    type Item<'w>;

    /// Column borrows held for the duration of a pass.
    type Columns<'w>;

    /// Component ids in parameter order.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredComponent`](crate::EcsError::UnregisteredComponent)
    /// if a parameter type was never registered.
    fn component_ids(registry: &Registry) -> EcsResult<Vec<ComponentId>>;

    /// Borrows every column of the query for a pass over `table`.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateComponent`](crate::EcsError::DuplicateComponent)
    /// if two parameters name the same component.
    fn columns<'w>(
        store: &'w mut ComponentStore,
        ids: &[ComponentId],
        table: &SlotMap<EntityRecord>,
    ) -> EcsResult<Self::Columns<'w>>;

    /// References for the record whose component keys are `keys`.
    fn fetch<'w>(columns: &mut Self::Columns<'w>, keys: &ComponentKeys) -> Self::Item<'w>;

    /// References for one record, without preparing whole columns.
    ///
    /// # Errors
    ///
    /// As [`columns`](Self::columns).
    fn fetch_one<'w>(
        store: &'w mut ComponentStore,
        ids: &[ComponentId],
        keys: &ComponentKeys,
    ) -> EcsResult<Self::Item<'w>>;
}

/// Query made only of `&T` parameters; can run through `&World`.
pub trait ReadOnlyQuery: Query {
    /// Borrows every column through a shared reference.
    fn columns_ref<'w>(store: &'w ComponentStore, ids: &[ComponentId]) -> Self::Columns<'w>;
}

fn next_column<'w, I>(columns: &mut I) -> (&'w mut Box<dyn ErasedColumn>, ComponentId)
where
    I: Iterator<Item = (&'w mut Box<dyn ErasedColumn>, ComponentId)>,
{
    columns
        .next()
        .unwrap_or_else(|| unreachable!("one column per query parameter"))
}

fn next_id(ids: &mut impl Iterator<Item = ComponentId>) -> ComponentId {
    ids.next()
        .unwrap_or_else(|| unreachable!("one id per query parameter"))
}

fn single_column<'w>(
    store: &'w mut ComponentStore,
    ids: &[ComponentId],
) -> EcsResult<(&'w mut Box<dyn ErasedColumn>, ComponentId)> {
    let mut columns = store.columns_mut(ids)?.into_iter().zip(ids.iter().copied());
    Ok(next_column(&mut columns))
}

impl<T: Component> Query for &T {
    type Item<'w> = &'w T;
    type Columns<'w> = ColumnRef<'w, T>;

    fn component_ids(registry: &Registry) -> EcsResult<Vec<ComponentId>> {
        Ok(vec![registry.require_component::<T>()?])
    }

    fn columns<'w>(
        store: &'w mut ComponentStore,
        ids: &[ComponentId],
        table: &SlotMap<EntityRecord>,
    ) -> EcsResult<Self::Columns<'w>> {
        let (column, id) = single_column(store, ids)?;
        Ok(<Self as QueryParam>::column(column, id, table))
    }

    fn fetch<'w>(columns: &mut Self::Columns<'w>, keys: &ComponentKeys) -> <Self as Query>::Item<'w> {
        <Self as QueryParam>::fetch(columns, keys)
    }

    fn fetch_one<'w>(
        store: &'w mut ComponentStore,
        ids: &[ComponentId],
        keys: &ComponentKeys,
    ) -> EcsResult<<Self as Query>::Item<'w>> {
        let (column, id) = single_column(store, ids)?;
        Ok(<Self as QueryParam>::get(column, keys[id]))
    }
}

impl<T: Component> ReadOnlyQuery for &T {
    fn columns_ref<'w>(store: &'w ComponentStore, ids: &[ComponentId]) -> Self::Columns<'w> {
        let id = next_id(&mut ids.iter().copied());
        <Self as ReadOnlyParam>::column_ref(store.column_by_id(id), id)
    }
}

impl<T: Component> Query for &mut T {
    type Item<'w> = &'w mut T;
    type Columns<'w> = ColumnMut<'w, T>;

    fn component_ids(registry: &Registry) -> EcsResult<Vec<ComponentId>> {
        Ok(vec![registry.require_component::<T>()?])
    }

    fn columns<'w>(
        store: &'w mut ComponentStore,
        ids: &[ComponentId],
        table: &SlotMap<EntityRecord>,
    ) -> EcsResult<Self::Columns<'w>> {
        let (column, id) = single_column(store, ids)?;
        Ok(<Self as QueryParam>::column(column, id, table))
    }

    fn fetch<'w>(columns: &mut Self::Columns<'w>, keys: &ComponentKeys) -> <Self as Query>::Item<'w> {
        <Self as QueryParam>::fetch(columns, keys)
    }

    fn fetch_one<'w>(
        store: &'w mut ComponentStore,
        ids: &[ComponentId],
        keys: &ComponentKeys,
    ) -> EcsResult<<Self as Query>::Item<'w>> {
        let (column, id) = single_column(store, ids)?;
        Ok(<Self as QueryParam>::get(column, keys[id]))
    }
}

macro_rules! impl_query_tuple {
    ($($P:ident),*) => {
        impl<$($P: QueryParam),*> Query for ($($P,)*) {
            type Item<'w> = ($($P::Item<'w>,)*);
            type Columns<'w> = ($($P::Column<'w>,)*);

            fn component_ids(registry: &Registry) -> EcsResult<Vec<ComponentId>> {
                Ok(vec![$($P::component_id(registry)?),*])
            }

            fn columns<'w>(
                store: &'w mut ComponentStore,
                ids: &[ComponentId],
                table: &SlotMap<EntityRecord>,
            ) -> EcsResult<Self::Columns<'w>> {
                let mut columns = store.columns_mut(ids)?.into_iter().zip(ids.iter().copied());
                Ok(($({
                    let (column, id) = next_column(&mut columns);
                    $P::column(column, id, table)
                },)*))
            }

            #[allow(non_snake_case)]
            fn fetch<'w>(columns: &mut Self::Columns<'w>, keys: &ComponentKeys) -> Self::Item<'w> {
                let ($($P,)*) = columns;
                ($($P::fetch($P, keys),)*)
            }

            fn fetch_one<'w>(
                store: &'w mut ComponentStore,
                ids: &[ComponentId],
                keys: &ComponentKeys,
            ) -> EcsResult<Self::Item<'w>> {
                let mut columns = store.columns_mut(ids)?.into_iter().zip(ids.iter().copied());
                Ok(($({
                    let (column, id) = next_column(&mut columns);
                    $P::get(column, keys[id])
                },)*))
            }
        }

        impl<$($P: ReadOnlyParam),*> ReadOnlyQuery for ($($P,)*) {
            fn columns_ref<'w>(store: &'w ComponentStore, ids: &[ComponentId]) -> Self::Columns<'w> {
                let mut ids = ids.iter().copied();
                ($({
                    let id = next_id(&mut ids);
                    $P::column_ref(store.column_by_id(id), id)
                },)*)
            }
        }
    };
}

impl_query_tuple!(A);
impl_query_tuple!(A, B);
impl_query_tuple!(A, B, C);
impl_query_tuple!(A, B, C, D);
impl_query_tuple!(A, B, C, D, E);
impl_query_tuple!(A, B, C, D, E, F);
