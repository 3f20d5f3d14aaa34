//! # Entity Manager
//!
//! One [`SlotMap`] of [`EntityRecord`]s per registered schema.
//!
//! The manager only moves component *keys* around. Creating and destroying
//! component values is the caller's job: [`destroy`](EntityManager::destroy)
//! and [`transform_to`](EntityManager::transform_to) hand back the keys that
//! must be released in the [`ComponentStore`](super::ComponentStore).

use std::sync::Arc;

use super::bitset::Id;
use super::record::{BaseKeys, ComponentKeys, Entity, EntityRecord, Parent};
use super::schema::{Registry, SchemaId, SchemaSet};
use crate::error::{EcsError, EcsResult};
use crate::slot_map::{Key, SlotMap};

/// Record tables of every schema.
pub struct EntityManager {
    registry: Arc<Registry>,
    tables: Vec<SlotMap<EntityRecord>>,
}

impl EntityManager {
    /// Creates one empty table per registered schema.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_capacity(registry, 0)
    }

    /// Creates the tables with room for `capacity` records each.
    #[must_use]
    pub fn with_capacity(registry: Arc<Registry>, capacity: usize) -> Self {
        let tables = (0..registry.schema_count())
            .map(|_| SlotMap::with_capacity(capacity))
            .collect();
        Self { registry, tables }
    }

    /// The registry the tables were built from.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Creates a root record of `schema` and one record per base.
    ///
    /// `components` must hold exactly one key for every component of the
    /// schema's closure.
    ///
    /// # Panics
    ///
    /// Panics if `schema` was not issued by the registry.
    pub fn create(&mut self, schema: SchemaId, components: ComponentKeys) -> Entity {
        let registry = Arc::clone(&self.registry);
        let info = registry.schema(schema);
        debug_assert_eq!(
            components.set(),
            info.components(),
            "component keys do not match schema `{}`",
            info.name()
        );

        let root = self.insert_record(schema, &components, Parent::Root);
        let bases = self.create_bases(info.bases(), &components, root);
        self.link_bases(root, bases);
        root
    }

    /// Erases every record of the entity's tree.
    ///
    /// `entity` may be any view of the tree. Returns the component keys the
    /// tree owned; they are no longer referenced by any record.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not live.
    pub fn destroy(&mut self, entity: Entity) -> ComponentKeys {
        let root = self.root_of(entity);
        let record = self.tables[root.schema().index()].erase(root.key());
        for (base, key) in record.bases.iter() {
            self.tables[base.index()].erase(key);
        }
        record.components
    }

    /// Migrates the entity's tree so that its root has schema `target`.
    ///
    /// `created` must hold one key for every component in the plan's
    /// [`created_components`](super::MigrationPlan::created_components).
    /// Shared component keys move to the new tree untouched; base records
    /// shared by both trees are re-parented. Returns the new root and the
    /// keys of the components no longer referenced.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnrelatedSchemas`] if the registry has no plan for the
    /// pair. Nothing is modified in that case.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not live.
    pub fn transform_to(
        &mut self,
        entity: Entity,
        target: SchemaId,
        created: ComponentKeys,
    ) -> EcsResult<(Entity, ComponentKeys)> {
        let registry = Arc::clone(&self.registry);
        let root = self.root_of(entity);
        let plan = registry
            .migration(root.schema(), target)
            .ok_or_else(|| EcsError::UnrelatedSchemas {
                from: registry.schema(root.schema()).name().to_string(),
                to: registry.schema(target).name().to_string(),
            })?;
        debug_assert_eq!(created.set(), plan.created_components());

        let old = self.tables[root.schema().index()].erase(root.key());

        let dropped = old.components.project(plan.dropped_components());
        let mut components = old.components.project(plan.retained_components());
        for (id, key) in created.iter() {
            components.insert(id, key);
        }

        for base in plan.dropped_bases().iter() {
            self.tables[base.index()].erase(old.bases[base]);
        }

        let new_root = self.insert_record(target, &components, Parent::Root);

        let mut bases = old.bases.project(plan.retained_bases());
        for (base, key) in bases.iter() {
            self.tables[base.index()][key].parent = Parent::Embedded(new_root);
        }
        for (base, key) in self
            .create_bases(plan.created_bases(), &components, new_root)
            .iter()
        {
            bases.insert(base, key);
        }
        self.link_bases(new_root, bases);

        Ok((new_root, dropped))
    }

    /// Root view of the entity's tree.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not live.
    #[must_use]
    pub fn root_of(&self, entity: Entity) -> Entity {
        match self.record(entity).parent {
            Parent::Root => entity,
            Parent::Embedded(root) => root,
        }
    }

    /// View of the entity's tree under `schema`, if the tree has one.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not live.
    #[must_use]
    pub fn base_of(&self, entity: Entity, schema: SchemaId) -> Option<Entity> {
        let root = self.root_of(entity);
        if root.schema() == schema {
            return Some(root);
        }
        self.record(root)
            .bases
            .get(schema)
            .map(|key| Entity::new(schema, key))
    }

    /// The record behind `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not live.
    #[must_use]
    pub fn record(&self, entity: Entity) -> &EntityRecord {
        &self.tables[entity.schema().index()][entity.key()]
    }

    /// Returns `true` if `entity`'s key is occupied in its table.
    ///
    /// Recycled keys report `true`; this is a debugging aid, not a liveness
    /// check.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.tables
            .get(entity.schema().index())
            .is_some_and(|table| table.contains(entity.key()))
    }

    /// Number of records in `schema`'s table, roots and embedded rows alike.
    #[must_use]
    pub fn len(&self, schema: SchemaId) -> usize {
        self.tables[schema.index()].len()
    }

    /// Returns `true` if no schema has a record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(SlotMap::is_empty)
    }

    /// Entity at dense position `pos` of `schema`'s table.
    #[must_use]
    pub fn entity_at(&self, schema: SchemaId, pos: usize) -> Option<Entity> {
        self.tables[schema.index()]
            .key_at(pos)
            .map(|key| Entity::new(schema, key))
    }

    /// Record table of `schema`.
    #[must_use]
    pub fn table(&self, schema: SchemaId) -> &SlotMap<EntityRecord> {
        &self.tables[schema.index()]
    }

    fn insert_record(
        &mut self,
        schema: SchemaId,
        components: &ComponentKeys,
        parent: Parent,
    ) -> Entity {
        let record = EntityRecord {
            components: components.project(self.registry.schema(schema).components()),
            bases: BaseKeys::new(),
            parent,
        };
        let key: Key = self.tables[schema.index()].insert(record);
        Entity::new(schema, key)
    }

    fn create_bases(
        &mut self,
        schemas: SchemaSet,
        components: &ComponentKeys,
        root: Entity,
    ) -> BaseKeys {
        schemas
            .iter()
            .map(|base| {
                let entity = self.insert_record(base, components, Parent::Embedded(root));
                (base, entity.key())
            })
            .collect()
    }

    /// Gives the root and every base record the full base table.
    fn link_bases(&mut self, root: Entity, bases: BaseKeys) {
        for (base, key) in bases.iter() {
            self.tables[base.index()][key].bases = bases.clone();
        }
        self.tables[root.schema().index()][root.key()].bases = bases;
    }
}
