//! # STRATA Core
//!
//! In-memory entity/component storage engine:
//! - Stable-key slot maps with O(1) insert, erase and lookup
//! - Struct-of-arrays component storage, one slot map per component type
//! - Composite entity schemas built from reusable bases
//! - Archetype migration that keeps shared components in place
//!
//! ## Architecture Rules
//!
//! 1. **Schemas are closed** - every schema is registered before the first
//!    entity exists
//! 2. **No duplication** - a component shared by several views of one
//!    entity is stored once
//! 3. **Single writer** - mutation takes `&mut World`; read-only passes take
//!    `&World` and may run on several threads
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use strata_core::{Component, Registry, World};
//!
//! #[derive(Default)]
//! struct Position { x: i32, y: i32 }
//! impl Component for Position {}
//!
//! #[derive(Default)]
//! struct Physics { vx: i32, vy: i32 }
//! impl Component for Physics {}
//!
//! let mut builder = Registry::builder();
//! builder.component::<Position>("Position").unwrap();
//! builder.component::<Physics>("Physics").unwrap();
//! let movable = builder
//!     .schema("Movable")
//!     .component::<Position>()
//!     .component::<Physics>()
//!     .register()
//!     .unwrap();
//!
//! let mut world = World::new(Arc::new(builder.build()));
//! world.spawn(movable, (Physics { vx: 1, vy: 2 },)).unwrap();
//! world
//!     .for_each::<(&mut Position, &Physics), _>(movable, |(p, v), _| {
//!         p.x += v.vx;
//!         p.y += v.vy;
//!     })
//!     .unwrap();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod slot_map;

pub use config::{SchemaDecl, SchemaLayout, WorldConfig};
pub use ecs::{
    Bundle, Component, ComponentId, ComponentKeys, ComponentStore, Entity, EntityManager,
    MigrationPlan, Parent, Query, ReadOnlyQuery, Registry, RegistryBuilder, SchemaId, SchemaInfo,
    World,
};
pub use error::{EcsError, EcsResult};
pub use slot_map::{Handle, Key, SlotMap};
