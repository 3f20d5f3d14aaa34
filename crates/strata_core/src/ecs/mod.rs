//! # Entity Component System
//!
//! Slot-map backed storage for entities whose shape is declared up front.
//!
//! ## Design Philosophy
//!
//! - One slot map per component type, one slot map of records per schema
//! - A composite schema embeds its bases: one record per schema of the
//!   tree, all sharing the same component keys
//! - Set algebra over schemas is precomputed once in the [`Registry`]
//! - Iteration walks tables back to front

mod bitset;
mod bundle;
mod component;
mod manager;
mod query;
mod record;
mod schema;
mod store;
mod world;

pub use bitset::{Id, IdSet, MAX_IDS};
pub use bundle::Bundle;
pub use component::{Component, ComponentId, ComponentSet};
pub use manager::EntityManager;
pub use query::{ColumnMut, ColumnRef, Query, QueryParam, ReadOnlyParam, ReadOnlyQuery};
pub use record::{BaseKeys, ComponentKeys, Entity, EntityRecord, KeyTable, Parent};
pub use schema::{
    ComponentInfo, MigrationPlan, Registry, RegistryBuilder, SchemaBuilder, SchemaId, SchemaInfo,
    SchemaSet,
};
pub use store::{ComponentStore, ErasedColumn};
pub use world::World;
