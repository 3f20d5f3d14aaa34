//! # Schema Registry
//!
//! Entity shapes are declared once, before any entity exists, and frozen
//! into an immutable [`Registry`] that the world shares through an `Arc`.
//!
//! ## Data Layout
//!
//! ```text
//! Schema "BasicCharacter"   owned: {}            declared bases: {Renderable, Movable}
//!   components (closure):   {Render, Position, Physics}
//!   bases (closure):        {Renderable, Movable}
//! Schema "Renderable"       owned: {Render, Position}
//!   embedders:              {BasicCharacter}
//! ```
//!
//! Every set is a 64-bit bitset. Closures and embedders are computed on
//! registration, and a [`MigrationPlan`] is cached for every ordered pair of
//! related schemas when the registry is built. Nothing is re-derived per
//! call.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use super::bitset::{Id, IdSet, MAX_IDS};
use super::component::{Component, ComponentId, ComponentSet};
use super::store::{new_column, ErasedColumn};
use crate::config::SchemaLayout;
use crate::error::{EcsError, EcsResult};

/// Dense id of a registered schema (0-63).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SchemaId(u8);

impl SchemaId {
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

impl Id for SchemaId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    fn from_index(index: usize) -> Self {
        debug_assert!(index < MAX_IDS);
        #[allow(clippy::cast_possible_truncation)]
        Self(index as u8)
    }
}

impl fmt::Debug for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Set of schema ids.
pub type SchemaSet = IdSet<SchemaId>;

type ColumnFactory = fn(usize) -> Box<dyn ErasedColumn>;

/// A registered component type.
pub struct ComponentInfo {
    id: ComponentId,
    name: String,
    type_id: TypeId,
    type_name: &'static str,
    factory: ColumnFactory,
}

impl ComponentInfo {
    /// Component id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Registered name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rust type id of the component.
    #[inline]
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the component.
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Builds an empty column for this component type.
    pub(crate) fn new_column(&self, capacity: usize) -> Box<dyn ErasedColumn> {
        (self.factory)(capacity)
    }
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// A registered schema and its precomputed closures.
#[derive(Clone, Debug)]
pub struct SchemaInfo {
    id: SchemaId,
    name: String,
    owned: ComponentSet,
    components: ComponentSet,
    declared_bases: SchemaSet,
    bases: SchemaSet,
    embedders: SchemaSet,
}

impl SchemaInfo {
    /// Schema id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SchemaId {
        self.id
    }

    /// Registered name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Components declared directly on this schema.
    #[inline]
    #[must_use]
    pub fn owned(&self) -> ComponentSet {
        self.owned
    }

    /// Every component an entity of this schema carries, bases included.
    #[inline]
    #[must_use]
    pub fn components(&self) -> ComponentSet {
        self.components
    }

    /// Bases named in the declaration.
    #[inline]
    #[must_use]
    pub fn declared_bases(&self) -> SchemaSet {
        self.declared_bases
    }

    /// Transitive base closure, excluding the schema itself.
    #[inline]
    #[must_use]
    pub fn bases(&self) -> SchemaSet {
        self.bases
    }

    /// Schemas that embed this one, directly or transitively.
    #[inline]
    #[must_use]
    pub fn embedders(&self) -> SchemaSet {
        self.embedders
    }

    /// The schema together with its base closure: every record one root
    /// of this schema owns.
    #[inline]
    #[must_use]
    pub fn tree(&self) -> SchemaSet {
        let mut tree = self.bases;
        tree.insert(self.id);
        tree
    }
}

/// Precomputed difference between two related schemas.
///
/// Root records are always replaced by a migration. Base records of the
/// source tree that are also bases of the target are kept and re-parented;
/// the rest are dropped or created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationPlan {
    from: SchemaId,
    to: SchemaId,
    retained_components: ComponentSet,
    dropped_components: ComponentSet,
    created_components: ComponentSet,
    retained_bases: SchemaSet,
    dropped_bases: SchemaSet,
    created_bases: SchemaSet,
}

impl MigrationPlan {
    fn between(from: &SchemaInfo, to: &SchemaInfo) -> Self {
        Self {
            from: from.id,
            to: to.id,
            retained_components: from.components.intersection(to.components),
            dropped_components: from.components.difference(to.components),
            created_components: to.components.difference(from.components),
            retained_bases: from.bases.intersection(to.bases),
            dropped_bases: from.bases.difference(to.bases),
            created_bases: to.bases.difference(from.bases),
        }
    }

    /// Source root schema.
    #[inline]
    #[must_use]
    pub fn from(&self) -> SchemaId {
        self.from
    }

    /// Target root schema.
    #[inline]
    #[must_use]
    pub fn to(&self) -> SchemaId {
        self.to
    }

    /// Components moved into the new tree unchanged.
    #[inline]
    #[must_use]
    pub fn retained_components(&self) -> ComponentSet {
        self.retained_components
    }

    /// Components destroyed by the migration.
    #[inline]
    #[must_use]
    pub fn dropped_components(&self) -> ComponentSet {
        self.dropped_components
    }

    /// Components the target needs that the source lacks.
    #[inline]
    #[must_use]
    pub fn created_components(&self) -> ComponentSet {
        self.created_components
    }

    /// Base records kept and re-parented.
    #[inline]
    #[must_use]
    pub fn retained_bases(&self) -> SchemaSet {
        self.retained_bases
    }

    /// Base records erased.
    #[inline]
    #[must_use]
    pub fn dropped_bases(&self) -> SchemaSet {
        self.dropped_bases
    }

    /// Base records created under the new root.
    #[inline]
    #[must_use]
    pub fn created_bases(&self) -> SchemaSet {
        self.created_bases
    }
}

/// Collects component and schema declarations.
///
/// # Example
///
/// ```rust
/// use strata_core::{Component, Registry};
///
/// #[derive(Default)]
/// struct Render(char);
/// impl Component for Render {}
///
/// let mut builder = Registry::builder();
/// builder.component::<Render>("Render").unwrap();
/// let renderable = builder.schema("Renderable").component::<Render>().register().unwrap();
/// let registry = builder.build();
/// assert_eq!(registry.schema(renderable).name(), "Renderable");
/// ```
#[derive(Default)]
pub struct RegistryBuilder {
    components: Vec<ComponentInfo>,
    component_types: HashMap<TypeId, ComponentId>,
    component_names: HashMap<String, ComponentId>,
    schemas: Vec<SchemaInfo>,
    schema_names: HashMap<String, SchemaId>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers component type `T` under `name`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DuplicateComponentName`] if the name or the type is taken
    /// - [`EcsError::CapacityExceeded`] past 64 component types
    pub fn component<T: Component>(&mut self, name: &str) -> EcsResult<ComponentId> {
        let type_id = TypeId::of::<T>();
        if self.component_names.contains_key(name) {
            return Err(EcsError::DuplicateComponentName(name.to_string()));
        }
        if self.component_types.contains_key(&type_id) {
            return Err(EcsError::DuplicateComponentName(type_name::<T>().to_string()));
        }
        if self.components.len() >= MAX_IDS {
            return Err(EcsError::CapacityExceeded {
                kind: "components",
                max: MAX_IDS,
            });
        }

        let id = ComponentId::from_index(self.components.len());
        self.components.push(ComponentInfo {
            id,
            name: name.to_string(),
            type_id,
            type_name: type_name::<T>(),
            factory: new_column::<T>,
        });
        self.component_types.insert(type_id, id);
        self.component_names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Starts declaring a schema.
    ///
    /// Nothing is recorded until [`SchemaBuilder::register`] succeeds.
    pub fn schema(&mut self, name: &str) -> SchemaBuilder<'_> {
        SchemaBuilder {
            builder: self,
            name: name.to_string(),
            owned: ComponentSet::EMPTY,
            bases: SchemaSet::EMPTY,
            error: None,
        }
    }

    /// Registers every schema of a layout, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first registration error. Schemas registered before it
    /// stay registered.
    pub fn layout(&mut self, layout: &SchemaLayout) -> EcsResult<Vec<SchemaId>> {
        layout
            .schemas
            .iter()
            .map(|decl| {
                let mut schema = self.schema(&decl.name);
                for component in &decl.components {
                    schema = schema.component_named(component);
                }
                for base in &decl.bases {
                    schema = schema.base_named(base);
                }
                schema.register()
            })
            .collect()
    }

    /// Parses a TOML layout and registers its schemas.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] on malformed TOML, otherwise as
    /// [`layout`](Self::layout).
    pub fn layout_toml(&mut self, source: &str) -> EcsResult<Vec<SchemaId>> {
        let layout = SchemaLayout::from_toml_str(source)?;
        self.layout(&layout)
    }

    /// Id of an already registered schema.
    #[must_use]
    pub fn schema_id(&self, name: &str) -> Option<SchemaId> {
        self.schema_names.get(name).copied()
    }

    /// Freezes the declarations and precomputes migration plans.
    #[must_use]
    pub fn build(mut self) -> Registry {
        for index in 0..self.schemas.len() {
            let id = self.schemas[index].id;
            let bases = self.schemas[index].bases;
            for base in bases.iter() {
                self.schemas[base.index()].embedders.insert(id);
            }
        }

        let count = self.schemas.len();
        let mut migrations = Vec::with_capacity(count * count);
        for from in &self.schemas {
            for to in &self.schemas {
                let related = from.tree().intersects(to.tree());
                migrations.push(related.then(|| MigrationPlan::between(from, to)));
            }
        }

        debug!(
            components = self.components.len(),
            schemas = count,
            migrations = migrations.iter().flatten().count(),
            "schema registry built"
        );

        Registry {
            components: self.components,
            component_types: self.component_types,
            component_names: self.component_names,
            schemas: self.schemas,
            schema_names: self.schema_names,
            migrations,
        }
    }

    fn component_name(&self, id: ComponentId) -> &str {
        &self.components[id.index()].name
    }
}

/// Declaration of one schema, finished by [`register`](Self::register).
///
/// The first error is kept and reported by `register`, so declarations can
/// be chained without intermediate checks.
pub struct SchemaBuilder<'a> {
    builder: &'a mut RegistryBuilder,
    name: String,
    owned: ComponentSet,
    bases: SchemaSet,
    error: Option<EcsError>,
}

impl SchemaBuilder<'_> {
    /// Adds component type `T` to the schema.
    #[must_use]
    pub fn component<T: Component>(mut self) -> Self {
        match self.builder.component_types.get(&TypeId::of::<T>()).copied() {
            Some(id) => self.add_component(id),
            None => self.fail(EcsError::UnregisteredComponent(type_name::<T>())),
        }
        self
    }

    /// Adds a component by its registered name.
    #[must_use]
    pub fn component_named(mut self, name: &str) -> Self {
        match self.builder.component_names.get(name).copied() {
            Some(id) => self.add_component(id),
            None => self.fail(EcsError::UnknownComponent(name.to_string())),
        }
        self
    }

    /// Embeds an already registered schema as a base.
    #[must_use]
    pub fn base(mut self, base: SchemaId) -> Self {
        if base.index() < self.builder.schemas.len() {
            self.bases.insert(base);
        } else {
            self.fail(EcsError::UnknownSchema(format!("{base:?}")));
        }
        self
    }

    /// Embeds an already registered schema, looked up by name.
    #[must_use]
    pub fn base_named(mut self, name: &str) -> Self {
        match self.builder.schema_id(name) {
            Some(id) => {
                self.bases.insert(id);
            }
            None => self.fail(EcsError::UnknownSchema(name.to_string())),
        }
        self
    }

    /// Validates and records the schema.
    ///
    /// # Errors
    ///
    /// - the first error recorded while declaring
    /// - [`EcsError::DuplicateSchema`] if the name is taken
    /// - [`EcsError::EmptySchema`] with no components and no bases
    /// - [`EcsError::CapacityExceeded`] past 64 schemas
    pub fn register(self) -> EcsResult<SchemaId> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let builder = self.builder;
        if builder.schema_names.contains_key(&self.name) {
            return Err(EcsError::DuplicateSchema(self.name));
        }
        if self.owned.is_empty() && self.bases.is_empty() {
            return Err(EcsError::EmptySchema(self.name));
        }
        if builder.schemas.len() >= MAX_IDS {
            return Err(EcsError::CapacityExceeded {
                kind: "schemas",
                max: MAX_IDS,
            });
        }

        let mut components = self.owned;
        let mut closure = self.bases;
        for base in self.bases.iter() {
            let info = &builder.schemas[base.index()];
            components = components.union(info.components);
            closure = closure.union(info.bases);
        }

        let id = SchemaId::from_index(builder.schemas.len());
        builder.schema_names.insert(self.name.clone(), id);
        builder.schemas.push(SchemaInfo {
            id,
            name: self.name,
            owned: self.owned,
            components,
            declared_bases: self.bases,
            bases: closure,
            embedders: SchemaSet::EMPTY,
        });
        Ok(id)
    }

    fn add_component(&mut self, id: ComponentId) {
        if !self.owned.insert(id) {
            let component = self.builder.component_name(id).to_string();
            self.fail(EcsError::DuplicateComponent { component });
        }
    }

    fn fail(&mut self, error: EcsError) {
        self.error.get_or_insert(error);
    }
}

/// Immutable schema table shared by the component store, the entity
/// manager and the world.
pub struct Registry {
    components: Vec<ComponentInfo>,
    component_types: HashMap<TypeId, ComponentId>,
    component_names: HashMap<String, ComponentId>,
    schemas: Vec<SchemaInfo>,
    schema_names: HashMap<String, SchemaId>,
    /// Row-major `from * schema_count + to`.
    migrations: Vec<Option<MigrationPlan>>,
}

impl Registry {
    /// Starts a new declaration.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Number of registered component types.
    #[inline]
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Number of registered schemas.
    #[inline]
    #[must_use]
    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// All schemas in id order.
    #[inline]
    #[must_use]
    pub fn schemas(&self) -> &[SchemaInfo] {
        &self.schemas
    }

    /// Looks up a schema.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this registry.
    #[inline]
    #[must_use]
    pub fn schema(&self, id: SchemaId) -> &SchemaInfo {
        &self.schemas[id.index()]
    }

    /// Schema id by name.
    #[must_use]
    pub fn schema_id(&self, name: &str) -> Option<SchemaId> {
        self.schema_names.get(name).copied()
    }

    /// Schema id by name, as an error when missing.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownSchema`] if no schema has that name.
    pub fn require_schema(&self, name: &str) -> EcsResult<SchemaId> {
        self.schema_id(name)
            .ok_or_else(|| EcsError::UnknownSchema(name.to_string()))
    }

    /// Looks up a component type.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this registry.
    #[inline]
    #[must_use]
    pub fn component(&self, id: ComponentId) -> &ComponentInfo {
        &self.components[id.index()]
    }

    /// All component types in id order.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[ComponentInfo] {
        &self.components
    }

    /// Registered name of a component.
    #[inline]
    #[must_use]
    pub fn component_name(&self, id: ComponentId) -> &str {
        &self.components[id.index()].name
    }

    /// Component id by name.
    #[must_use]
    pub fn component_id_named(&self, name: &str) -> Option<ComponentId> {
        self.component_names.get(name).copied()
    }

    /// Component id of type `T`.
    #[inline]
    #[must_use]
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.component_types.get(&TypeId::of::<T>()).copied()
    }

    /// Component id of type `T`, as an error when unregistered.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredComponent`] if `T` was never registered.
    pub fn require_component<T: Component>(&self) -> EcsResult<ComponentId> {
        self.component_id::<T>()
            .ok_or(EcsError::UnregisteredComponent(type_name::<T>()))
    }

    /// Returns `true` if `base` is in the base closure of `schema`.
    #[inline]
    #[must_use]
    pub fn is_base_of(&self, base: SchemaId, schema: SchemaId) -> bool {
        self.schema(schema).bases.contains(base)
    }

    /// Precomputed plan for migrating a root of `from` to `to`.
    ///
    /// `None` when the schemas share neither identity nor a base.
    #[inline]
    #[must_use]
    pub fn migration(&self, from: SchemaId, to: SchemaId) -> Option<&MigrationPlan> {
        let index = from.index() * self.schemas.len() + to.index();
        self.migrations.get(index)?.as_ref()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("components", &self.components)
            .field("schemas", &self.schemas)
            .finish_non_exhaustive()
    }
}
