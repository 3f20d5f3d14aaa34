//! # ECS World
//!
//! The facade over the [`ComponentStore`] and the [`EntityManager`]: entity
//! creation with default-component fallback, per-schema iteration, and
//! cross-schema matching.
//!
//! ## Iteration Order
//!
//! Passes walk a schema's table from the last dense position to the first.
//! Swap-erase only ever moves the last record into a hole, and the last
//! record has already been visited, so destroying the current entity during
//! a pass never skips or repeats anything (see [`World::destroy_where`]).

use std::sync::Arc;

use tracing::trace;

use super::bundle::Bundle;
use super::component::{Component, ComponentId, ComponentSet};
use super::manager::EntityManager;
use super::query::{Query, ReadOnlyQuery};
use super::record::{ComponentKeys, Entity};
use super::schema::{Registry, SchemaId};
use super::store::ComponentStore;
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};

/// Container for every entity and component.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use strata_core::{Component, Registry, World};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Render(char);
/// impl Component for Render {}
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Position(i32, i32);
/// impl Component for Position {}
///
/// let mut builder = Registry::builder();
/// builder.component::<Render>("Render").unwrap();
/// builder.component::<Position>("Position").unwrap();
/// let renderable = builder
///     .schema("Renderable")
///     .component::<Render>()
///     .component::<Position>()
///     .register()
///     .unwrap();
///
/// let mut world = World::new(Arc::new(builder.build()));
/// world.spawn(renderable, (Render('a'),)).unwrap();
///
/// let mut rows = Vec::new();
/// world
///     .for_each::<(&Render, &Position), _>(renderable, |(render, position), _| {
///         rows.push((render.0, position.0));
///     })
///     .unwrap();
/// assert_eq!(rows, vec![('a', 0)]);
/// ```
pub struct World {
    registry: Arc<Registry>,
    components: ComponentStore,
    entities: EntityManager,
}

impl World {
    /// Creates a world with the default capacities.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_config(registry, &WorldConfig::default())
    }

    /// Creates a world with every table pre-reserved per `config`.
    #[must_use]
    pub fn with_config(registry: Arc<Registry>, config: &WorldConfig) -> Self {
        Self {
            components: ComponentStore::with_capacity(Arc::clone(&registry), config.component_capacity),
            entities: EntityManager::with_capacity(Arc::clone(&registry), config.entity_capacity),
            registry,
        }
    }

    /// The schema registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The component store.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    /// The entity manager.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    /// Creates an entity of `schema`.
    ///
    /// Components of the schema missing from `bundle` are
    /// default-constructed. An empty bundle `()` defaults everything.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredComponent`] for an unregistered bundle type
    /// - [`EcsError::DuplicateComponent`] if the bundle repeats a type
    /// - [`EcsError::ForeignComponent`] if the schema lacks a bundle type
    ///
    /// Nothing is created on error.
    pub fn spawn<B: Bundle>(&mut self, schema: SchemaId, bundle: B) -> EcsResult<Entity> {
        let registry = Arc::clone(&self.registry);
        let info = registry.schema(schema);
        let ids = B::component_ids(&registry)?;
        let explicit = check_explicit(&registry, schema, info.components(), &ids)?;

        let mut keys = ComponentKeys::new();
        bundle.insert_into(&mut self.components, &ids, &mut keys);
        self.create_defaults(info.components().difference(explicit), &mut keys);

        let entity = self.entities.create(schema, keys);
        trace!(schema = info.name(), entity = %entity, "spawned entity");
        Ok(entity)
    }

    /// Destroys the entity's whole tree and every component it owned.
    ///
    /// `entity` may be any view of the tree.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not live.
    pub fn destroy(&mut self, entity: Entity) {
        let released = self.entities.destroy(entity);
        for (id, key) in released.iter() {
            self.components.destroy_erased(id, key);
        }
        trace!(
            schema = self.registry.schema(entity.schema()).name(),
            entity = %entity,
            components = released.len(),
            "destroyed entity"
        );
    }

    /// Migrates the entity's tree to schema `target`.
    ///
    /// Components shared by both schemas keep their storage and values.
    /// `bundle` may only supply components the target adds; the remaining
    /// new ones are default-constructed. Returns the new root.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnrelatedSchemas`] if the schemas share neither identity
    ///   nor a base
    /// - [`EcsError::ForeignComponent`] if the bundle supplies a component
    ///   the target does not add
    /// - as [`spawn`](Self::spawn) for duplicate or unregistered types
    ///
    /// Nothing is modified on error.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not live.
    pub fn transform_to<B: Bundle>(
        &mut self,
        entity: Entity,
        target: SchemaId,
        bundle: B,
    ) -> EcsResult<Entity> {
        let registry = Arc::clone(&self.registry);
        let root = self.entities.root_of(entity);
        let plan = registry
            .migration(root.schema(), target)
            .ok_or_else(|| EcsError::UnrelatedSchemas {
                from: registry.schema(root.schema()).name().to_string(),
                to: registry.schema(target).name().to_string(),
            })?;
        let ids = B::component_ids(&registry)?;
        let explicit = check_explicit(&registry, target, plan.created_components(), &ids)?;

        let mut created = ComponentKeys::new();
        bundle.insert_into(&mut self.components, &ids, &mut created);
        self.create_defaults(plan.created_components().difference(explicit), &mut created);

        let (new_root, dropped) = self.entities.transform_to(root, target, created)?;
        for (id, key) in dropped.iter() {
            self.components.destroy_erased(id, key);
        }

        trace!(
            from = registry.schema(root.schema()).name(),
            to = registry.schema(target).name(),
            entity = %new_root,
            dropped = dropped.len(),
            "transformed entity"
        );
        Ok(new_root)
    }

    /// Runs `f` on every record of `schema`, last to first.
    ///
    /// Records embedded in composite entities are visited too.
    ///
    /// # Errors
    ///
    /// - [`EcsError::ForeignComponent`] if the schema lacks a queried type
    /// - [`EcsError::DuplicateComponent`] if the query repeats a type
    /// - [`EcsError::UnregisteredComponent`] for an unregistered type
    pub fn for_each<'w, Q, F>(&'w mut self, schema: SchemaId, mut f: F) -> EcsResult<()>
    where
        Q: Query,
        F: FnMut(Q::Item<'w>, Entity),
    {
        let ids = Q::component_ids(&self.registry)?;
        check_query(&self.registry, schema, &ids)?;

        let table = self.entities.table(schema);
        let mut columns = Q::columns(&mut self.components, &ids, table)?;
        for (key, record) in table.iter().rev() {
            f(Q::fetch(&mut columns, record.components()), Entity::new(schema, key));
        }
        Ok(())
    }

    /// Read-only [`for_each`](Self::for_each).
    ///
    /// Takes `&self`, so several passes can run on different threads at
    /// once while nothing mutates the world.
    ///
    /// # Errors
    ///
    /// As [`for_each`](Self::for_each).
    pub fn for_each_ref<'w, Q, F>(&'w self, schema: SchemaId, mut f: F) -> EcsResult<()>
    where
        Q: ReadOnlyQuery,
        F: FnMut(Q::Item<'w>, Entity),
    {
        let ids = Q::component_ids(&self.registry)?;
        check_query(&self.registry, schema, &ids)?;

        let mut columns = Q::columns_ref(&self.components, &ids);
        for (key, record) in self.entities.table(schema).iter().rev() {
            f(Q::fetch(&mut columns, record.components()), Entity::new(schema, key));
        }
        Ok(())
    }

    /// Runs `f` once if the entity's tree contains a `schema` view.
    ///
    /// `entity` may be a handle under any schema of the tree. The callback
    /// receives the `schema` view's components and handle. Returns whether
    /// it ran.
    ///
    /// # Errors
    ///
    /// As [`for_each`](Self::for_each); checked before the entity is
    /// resolved.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not live.
    pub fn match_entity<'w, Q, F>(&'w mut self, schema: SchemaId, entity: Entity, f: F) -> EcsResult<bool>
    where
        Q: Query,
        F: FnOnce(Q::Item<'w>, Entity),
    {
        let ids = Q::component_ids(&self.registry)?;
        check_query(&self.registry, schema, &ids)?;

        let Some(view) = self.entities.base_of(entity, schema) else {
            return Ok(false);
        };
        let keys = self.entities.record(view).components();
        let item = Q::fetch_one(&mut self.components, &ids, keys)?;
        f(item, view);
        Ok(true)
    }

    /// Destroys every entity whose `schema` record satisfies `predicate`.
    ///
    /// Walks the table last to first and destroys during the walk. Each
    /// destroyed tree holds exactly one record of `schema`, the one being
    /// visited, so the walk sees every record once. Returns the number of
    /// trees destroyed.
    pub fn destroy_where<F>(&mut self, schema: SchemaId, mut predicate: F) -> usize
    where
        F: FnMut(&World, Entity) -> bool,
    {
        let mut destroyed = 0;
        let mut pos = self.entities.len(schema);
        while pos > 0 {
            pos -= 1;
            let Some(entity) = self.entities.entity_at(schema, pos) else {
                continue;
            };
            if predicate(self, entity) {
                self.destroy(entity);
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Borrows component `T` of the entity's record.
    ///
    /// `None` if `T` is unregistered or not part of the entity's schema.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not live.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let id = self.registry.component_id::<T>()?;
        let key = self.entities.record(entity).components().get(id)?;
        self.components.column::<T>().get(key)
    }

    /// Mutable [`get`](Self::get).
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not live.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let id = self.registry.component_id::<T>()?;
        let key = self.entities.record(entity).components().get(id)?;
        self.components.column_mut::<T>().get_mut(key)
    }

    /// Root view of the entity's tree.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not live.
    #[must_use]
    pub fn root_of(&self, entity: Entity) -> Entity {
        self.entities.root_of(entity)
    }

    /// Number of records of `schema`, embedded ones included.
    #[must_use]
    pub fn len(&self, schema: SchemaId) -> usize {
        self.entities.len(schema)
    }

    /// Returns `true` if the world holds no entity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of live `T` values.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    #[must_use]
    pub fn component_count<T: Component>(&self) -> usize {
        self.components.len::<T>()
    }

    /// Returns `true` if `entity`'s key is occupied in its table.
    ///
    /// See [`EntityManager::contains`].
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(entity)
    }

    fn create_defaults(&mut self, ids: ComponentSet, keys: &mut ComponentKeys) {
        for id in ids.iter() {
            keys.insert(id, self.components.create_default(id));
        }
    }
}

/// Validates explicit components against the set a schema accepts.
fn check_explicit(
    registry: &Registry,
    schema: SchemaId,
    allowed: ComponentSet,
    ids: &[ComponentId],
) -> EcsResult<ComponentSet> {
    let mut seen = ComponentSet::EMPTY;
    for &id in ids {
        if !seen.insert(id) {
            return Err(EcsError::DuplicateComponent {
                component: registry.component_name(id).to_string(),
            });
        }
        if !allowed.contains(id) {
            return Err(EcsError::ForeignComponent {
                component: registry.component_name(id).to_string(),
                schema: registry.schema(schema).name().to_string(),
            });
        }
    }
    Ok(seen)
}

/// Validates query components against a schema's closure.
fn check_query(registry: &Registry, schema: SchemaId, ids: &[ComponentId]) -> EcsResult<()> {
    check_explicit(registry, schema, registry.schema(schema).components(), ids).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, Copy, PartialEq)]
    struct Render(char);
    impl Component for Render {}

    #[derive(Debug, Default, Clone, Copy, PartialEq)]
    struct Position {
        x: i32,
        y: i32,
    }
    impl Component for Position {}

    #[derive(Debug, Default, Clone, Copy, PartialEq)]
    struct Physics {
        vx: i32,
        vy: i32,
    }
    impl Component for Physics {}

    #[derive(Debug, Default)]
    struct Stray;
    impl Component for Stray {}

    struct Fixture {
        world: World,
        renderable: SchemaId,
        movable: SchemaId,
        character: SchemaId,
    }

    fn fixture() -> Fixture {
        let mut builder = Registry::builder();
        builder.component::<Render>("Render").unwrap();
        builder.component::<Position>("Position").unwrap();
        builder.component::<Physics>("Physics").unwrap();
        let renderable = builder
            .schema("Renderable")
            .component::<Render>()
            .component::<Position>()
            .register()
            .unwrap();
        let movable = builder
            .schema("Movable")
            .component::<Position>()
            .component::<Physics>()
            .register()
            .unwrap();
        let character = builder
            .schema("BasicCharacter")
            .base(renderable)
            .base(movable)
            .register()
            .unwrap();

        let config = WorldConfig {
            entity_capacity: 16,
            component_capacity: 16,
        };
        Fixture {
            world: World::with_config(Arc::new(builder.build()), &config),
            renderable,
            movable,
            character,
        }
    }

    #[test]
    fn test_world_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<World>();
    }

    #[test]
    fn test_spawn_defaults_missing_components() {
        let mut f = fixture();
        let e = f.world.spawn(f.renderable, (Render('a'),)).unwrap();

        assert_eq!(f.world.get::<Render>(e), Some(&Render('a')));
        assert_eq!(f.world.get::<Position>(e), Some(&Position::default()));
        assert_eq!(f.world.get::<Physics>(e), None);

        let d = f.world.spawn(f.movable, ()).unwrap();
        assert_eq!(f.world.get::<Physics>(d), Some(&Physics::default()));
        assert_eq!(f.world.component_count::<Position>(), 2);
    }

    #[test]
    fn test_spawn_rejects_bad_bundles() {
        let mut f = fixture();

        assert_eq!(
            f.world.spawn(f.renderable, (Physics::default(),)),
            Err(EcsError::ForeignComponent {
                component: "Physics".to_string(),
                schema: "Renderable".to_string()
            })
        );
        assert_eq!(
            f.world.spawn(f.renderable, (Render('a'), Render('b'))),
            Err(EcsError::DuplicateComponent {
                component: "Render".to_string()
            })
        );
        assert!(matches!(
            f.world.spawn(f.renderable, (Stray,)),
            Err(EcsError::UnregisteredComponent(_))
        ));
        assert_eq!(f.world.component_count::<Render>(), 0);
        assert!(f.world.is_empty());
    }

    #[test]
    fn test_composite_shares_component_storage() {
        let mut f = fixture();
        let c = f
            .world
            .spawn(
                f.character,
                (Render('d'), Position { x: 6, y: 2 }, Physics { vx: 1, vy: 1 }),
            )
            .unwrap();

        assert_eq!(f.world.len(f.character), 1);
        assert_eq!(f.world.len(f.renderable), 1);
        assert_eq!(f.world.len(f.movable), 1);
        assert_eq!(f.world.component_count::<Position>(), 1);

        let movable = f.world.entities().base_of(c, f.movable).unwrap();
        f.world.get_mut::<Position>(movable).unwrap().x = 40;
        let renderable = f.world.entities().base_of(c, f.renderable).unwrap();
        assert_eq!(f.world.get::<Position>(renderable).unwrap().x, 40);
        assert!(std::ptr::eq(
            f.world.get::<Position>(c).unwrap(),
            f.world.get::<Position>(renderable).unwrap()
        ));
    }

    #[test]
    fn test_for_each_mutates_in_place() {
        let mut f = fixture();
        for i in 0..4 {
            f.world
                .spawn(f.movable, (Position { x: i, y: 0 }, Physics { vx: 1, vy: 2 }))
                .unwrap();
        }

        f.world
            .for_each::<(&mut Position, &Physics), _>(f.movable, |(position, physics), _| {
                position.x += physics.vx;
                position.y += physics.vy;
            })
            .unwrap();

        let mut xs = Vec::new();
        f.world
            .for_each_ref::<&Position, _>(f.movable, |position, _| {
                assert_eq!(position.y, 2);
                xs.push(position.x);
            })
            .unwrap();
        xs.sort_unstable();
        assert_eq!(xs, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_for_each_walks_back_to_front() {
        let mut f = fixture();
        let spawned: Vec<Entity> = (0..3)
            .map(|_| f.world.spawn(f.renderable, ()).unwrap())
            .collect();

        let mut visited = Vec::new();
        f.world
            .for_each::<&Render, _>(f.renderable, |_, entity| visited.push(entity))
            .unwrap();
        visited.reverse();
        assert_eq!(visited, spawned);
    }

    #[test]
    fn test_query_validation() {
        let mut f = fixture();
        f.world.spawn(f.renderable, ()).unwrap();

        assert_eq!(
            f.world.for_each::<&Physics, _>(f.renderable, |_, _| {}),
            Err(EcsError::ForeignComponent {
                component: "Physics".to_string(),
                schema: "Renderable".to_string()
            })
        );
        assert_eq!(
            f.world.for_each_ref::<(&Render, &Render), _>(f.renderable, |_, _| {}),
            Err(EcsError::DuplicateComponent {
                component: "Render".to_string()
            })
        );
    }

    #[test]
    fn test_match_entity_resolves_through_root() {
        let mut f = fixture();
        let plain = f.world.spawn(f.renderable, (Render('r'),)).unwrap();
        let c = f
            .world
            .spawn(f.character, (Render('c'), Physics { vx: 3, vy: 0 }))
            .unwrap();
        let via_base = f.world.entities().base_of(c, f.renderable).unwrap();
        let movable = f.movable;

        // A movable system run against a handle obtained under Renderable.
        let ran = f
            .world
            .match_entity::<(&mut Position, &Physics), _>(movable, via_base, |(p, v), view| {
                p.x += v.vx;
                assert_eq!(view.schema(), movable);
            })
            .unwrap();
        assert!(ran);
        assert_eq!(f.world.get::<Position>(c).unwrap().x, 3);

        let ran = f
            .world
            .match_entity::<&Physics, _>(f.movable, plain, |_, _| unreachable!())
            .unwrap();
        assert!(!ran);

        let ran = f
            .world
            .match_entity::<&Render, _>(f.renderable, plain, |r, view| {
                assert_eq!((r.0, view), ('r', plain));
            })
            .unwrap();
        assert!(ran);
    }

    #[test]
    fn test_destroy_where_during_backward_walk() {
        let mut f = fixture();
        for i in 0..10 {
            f.world
                .spawn(f.movable, (Position { x: i, y: 0 },))
                .unwrap();
        }
        let c = f.world.spawn(f.character, (Position { x: 3, y: 0 },)).unwrap();

        let mut seen = Vec::new();
        let destroyed = f.world.destroy_where(f.movable, |world, entity| {
            let x = world.get::<Position>(entity).unwrap().x;
            seen.push(x);
            x % 3 == 0
        });

        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(destroyed, 5);
        assert_eq!(f.world.len(f.movable), 6);
        assert_eq!(f.world.len(f.character), 0);
        assert_eq!(f.world.len(f.renderable), 0);
        assert!(!f.world.contains(c));
        assert_eq!(f.world.component_count::<Position>(), 6);
        assert_eq!(f.world.component_count::<Render>(), 0);
    }

    #[test]
    fn test_transform_rejects_invalid_requests() {
        let mut f = fixture();
        let r = f.world.spawn(f.renderable, ()).unwrap();
        let m = f.world.spawn(f.movable, ()).unwrap();

        assert_eq!(
            f.world.transform_to(r, f.movable, ()),
            Err(EcsError::UnrelatedSchemas {
                from: "Renderable".to_string(),
                to: "Movable".to_string()
            })
        );
        // Position is shared, not created by the migration.
        assert_eq!(
            f.world.transform_to(m, f.character, (Position::default(),)),
            Err(EcsError::ForeignComponent {
                component: "Position".to_string(),
                schema: "BasicCharacter".to_string()
            })
        );
        assert_eq!(f.world.len(f.movable), 1);
        assert_eq!(f.world.component_count::<Position>(), 2);
        assert_eq!(f.world.root_of(m), m);
    }

    #[test]
    fn test_transform_to_composite_and_back() {
        let mut f = fixture();
        let m = f
            .world
            .spawn(f.movable, (Position { x: 6, y: 2 }, Physics { vx: 1, vy: 1 }))
            .unwrap();

        let c = f.world.transform_to(m, f.character, (Render('z'),)).unwrap();
        assert_eq!(c.schema(), f.character);
        assert_eq!(f.world.get::<Render>(c), Some(&Render('z')));
        assert_eq!(f.world.get::<Position>(c), Some(&Position { x: 6, y: 2 }));
        assert_eq!(f.world.len(f.movable), 1);
        assert_eq!(f.world.len(f.renderable), 1);

        let back = f.world.transform_to(c, f.movable, ()).unwrap();
        assert_eq!(f.world.get::<Physics>(back), Some(&Physics { vx: 1, vy: 1 }));
        assert_eq!(f.world.len(f.renderable), 0);
        assert_eq!(f.world.len(f.character), 0);
        assert_eq!(f.world.component_count::<Render>(), 0);
    }

    #[test]
    fn test_parallel_read_only_passes() {
        let mut f = fixture();
        for i in 1..=100 {
            f.world
                .spawn(f.movable, (Position { x: i, y: -i },))
                .unwrap();
        }
        let world = &f.world;
        let movable = f.movable;

        let (sum_x, sum_y) = std::thread::scope(|scope| {
            let xs = scope.spawn(move || {
                let mut sum = 0;
                world
                    .for_each_ref::<&Position, _>(movable, |p, _| sum += p.x)
                    .unwrap();
                sum
            });
            let ys = scope.spawn(move || {
                let mut sum = 0;
                world
                    .for_each_ref::<(&Position, &Physics), _>(movable, |(p, _), _| sum += p.y)
                    .unwrap();
                sum
            });
            (xs.join().unwrap(), ys.join().unwrap())
        });

        assert_eq!(sum_x, 5050);
        assert_eq!(sum_y, -5050);
    }
}
