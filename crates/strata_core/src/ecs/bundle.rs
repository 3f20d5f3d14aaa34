//! # Component Bundles
//!
//! A bundle is the set of explicit component values passed to
//! [`World::spawn`](super::World::spawn) or
//! [`World::transform_to`](super::World::transform_to): a tuple of up to
//! eight components. Components of the schema that the bundle does not
//! supply are default-constructed.

use super::component::{Component, ComponentId};
use super::record::ComponentKeys;
use super::schema::Registry;
use super::store::ComponentStore;
use crate::error::EcsResult;

/// A collection of components that can be stored together.
pub trait Bundle {
    /// Component ids in tuple order.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredComponent`](crate::EcsError::UnregisteredComponent)
    /// if a member type was never registered.
    fn component_ids(registry: &Registry) -> EcsResult<Vec<ComponentId>>;

    /// Moves every value into the store and records its key under the id
    /// at the same position of `ids`.
    fn insert_into(self, store: &mut ComponentStore, ids: &[ComponentId], keys: &mut ComponentKeys);
}

impl Bundle for () {
    fn component_ids(_registry: &Registry) -> EcsResult<Vec<ComponentId>> {
        Ok(Vec::new())
    }

    fn insert_into(self, _store: &mut ComponentStore, _ids: &[ComponentId], _keys: &mut ComponentKeys) {}
}

macro_rules! impl_bundle_tuple {
    ($(($C:ident, $n:tt)),*) => {
        impl<$($C: Component),*> Bundle for ($($C,)*) {
            fn component_ids(registry: &Registry) -> EcsResult<Vec<ComponentId>> {
                Ok(vec![$(registry.require_component::<$C>()?),*])
            }

            fn insert_into(
                self,
                store: &mut ComponentStore,
                ids: &[ComponentId],
                keys: &mut ComponentKeys,
            ) {
                $(
                    keys.insert(ids[$n], store.create(self.$n).key());
                )*
            }
        }
    };
}

impl_bundle_tuple!((A, 0));
impl_bundle_tuple!((A, 0), (B, 1));
impl_bundle_tuple!((A, 0), (B, 1), (C, 2));
impl_bundle_tuple!((A, 0), (B, 1), (C, 2), (D, 3));
impl_bundle_tuple!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_bundle_tuple!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_bundle_tuple!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_bundle_tuple!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7));
