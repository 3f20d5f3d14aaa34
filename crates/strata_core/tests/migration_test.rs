//! # Migration Integrity Tests
//!
//! Plain-old-data components are compared byte for byte across migrations,
//! and a seeded random workload of spawn / destroy / transform is checked
//! against a simple model after every step.

use std::sync::Arc;

use bytemuck::{bytes_of, Pod, Zeroable};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_core::{Component, Entity, Parent, Registry, SchemaId, World, WorldConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Glyph {
    code: u32,
    color: u32,
}
impl Component for Glyph {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
    _padding: f32,
}
impl Component for Position {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
    _padding: f32,
}
impl Component for Velocity {}

/// Renderable, Movable, BasicCharacter.
const SHAPES: usize = 3;

struct Setup {
    world: World,
    schemas: [SchemaId; SHAPES],
}

fn setup() -> Setup {
    let mut builder = Registry::builder();
    builder.component::<Glyph>("Glyph").unwrap();
    builder.component::<Position>("Position").unwrap();
    builder.component::<Velocity>("Velocity").unwrap();
    let renderable = builder
        .schema("Renderable")
        .component::<Glyph>()
        .component::<Position>()
        .register()
        .unwrap();
    let movable = builder
        .schema("Movable")
        .component::<Position>()
        .component::<Velocity>()
        .register()
        .unwrap();
    let character = builder
        .schema("BasicCharacter")
        .base(renderable)
        .base(movable)
        .register()
        .unwrap();

    let config = WorldConfig {
        entity_capacity: 4,
        component_capacity: 4,
    };
    Setup {
        world: World::with_config(Arc::new(builder.build()), &config),
        schemas: [renderable, movable, character],
    }
}

fn position(rng: &mut ChaCha8Rng) -> Position {
    Position {
        x: rng.gen_range(-100.0..100.0),
        y: rng.gen_range(-100.0..100.0),
        z: rng.gen_range(-100.0..100.0),
        _padding: 0.0,
    }
}

fn velocity(rng: &mut ChaCha8Rng) -> Velocity {
    Velocity {
        x: rng.gen_range(-1.0..1.0),
        y: rng.gen_range(-1.0..1.0),
        z: rng.gen_range(-1.0..1.0),
        _padding: 0.0,
    }
}

fn assert_same_bytes<T: Pod>(actual: Option<&T>, expected: Option<T>) {
    assert_eq!(actual.map(|v| bytes_of(v).to_vec()), expected.map(|v| bytes_of(&v).to_vec()));
}

#[test]
fn test_shared_components_survive_migration_bitwise() {
    let Setup { mut world, schemas } = setup();
    let [renderable, movable, character] = schemas;

    let glyph = Glyph {
        code: 0x263A,
        color: 0xFF00_FF00,
    };
    let pos = Position {
        x: 1.5,
        y: -0.0,
        z: f32::MAX,
        _padding: 0.0,
    };

    let r = world.spawn(renderable, (glyph, pos)).unwrap();
    let c = world.transform_to(r, character, ()).unwrap();
    assert_same_bytes(world.get::<Glyph>(c), Some(glyph));
    assert_same_bytes(world.get::<Position>(c), Some(pos));
    assert_same_bytes(world.get::<Velocity>(c), Some(Velocity::zeroed()));

    let vel = Velocity {
        x: 0.25,
        y: 0.5,
        z: 0.75,
        _padding: 0.0,
    };
    *world.get_mut::<Velocity>(c).unwrap() = vel;

    let m = world.transform_to(c, movable, ()).unwrap();
    assert_same_bytes(world.get::<Position>(m), Some(pos));
    assert_same_bytes(world.get::<Velocity>(m), Some(vel));
    assert_same_bytes::<Glyph>(world.get::<Glyph>(m), None);
    assert_eq!(world.component_count::<Glyph>(), 0);
}

#[test]
fn test_explicit_components_on_migration() {
    let Setup { mut world, schemas } = setup();
    let [_, movable, character] = schemas;

    let m = world.spawn(movable, ()).unwrap();
    let glyph = Glyph { code: 64, color: 7 };
    let c = world.transform_to(m, character, (glyph,)).unwrap();

    assert_same_bytes(world.get::<Glyph>(c), Some(glyph));
    let view = world.entities().base_of(c, schemas[0]).unwrap();
    assert_same_bytes(world.get::<Glyph>(view), Some(glyph));
}

#[test]
fn test_destroy_through_base_cascades() {
    let Setup { mut world, schemas } = setup();
    let [renderable, movable, character] = schemas;

    let keep = world.spawn(movable, ()).unwrap();
    let c = world.spawn(character, ()).unwrap();
    let base = world.entities().base_of(c, renderable).unwrap();

    world.destroy(base);

    assert!(!world.contains(c));
    assert_eq!(world.len(character), 0);
    assert_eq!(world.len(renderable), 0);
    assert_eq!(world.len(movable), 1);
    assert!(world.contains(keep));
    assert_eq!(world.component_count::<Position>(), 1);
    assert_eq!(world.component_count::<Velocity>(), 1);
    assert_eq!(world.component_count::<Glyph>(), 0);
}

/// Expected state of one live entity tree.
#[derive(Clone, Copy, Debug)]
struct Model {
    root: Entity,
    shape: usize,
    glyph: Option<Glyph>,
    position: Position,
    velocity: Option<Velocity>,
}

fn has_glyph(shape: usize) -> bool {
    shape != 1
}

fn has_velocity(shape: usize) -> bool {
    shape != 0
}

/// Schemas present in a tree rooted at `shape`.
fn tree(shape: usize) -> &'static [usize] {
    match shape {
        0 => &[0],
        1 => &[1],
        _ => &[0, 1, 2],
    }
}

fn verify(world: &World, schemas: &[SchemaId; SHAPES], live: &[Model]) {
    for (shape, &schema) in schemas.iter().enumerate() {
        let expected = live.iter().filter(|m| tree(m.shape).contains(&shape)).count();
        assert_eq!(world.len(schema), expected, "records of shape {shape}");
    }
    assert_eq!(world.component_count::<Position>(), live.len());
    assert_eq!(
        world.component_count::<Glyph>(),
        live.iter().filter(|m| m.glyph.is_some()).count()
    );
    assert_eq!(
        world.component_count::<Velocity>(),
        live.iter().filter(|m| m.velocity.is_some()).count()
    );

    for m in live {
        assert_eq!(m.root.schema(), schemas[m.shape]);
        assert_eq!(world.root_of(m.root), m.root);
        assert_same_bytes(world.get::<Glyph>(m.root), m.glyph);
        assert_same_bytes(world.get::<Position>(m.root), Some(m.position));
        assert_same_bytes(world.get::<Velocity>(m.root), m.velocity);
        for &base in tree(m.shape) {
            let view = world.entities().base_of(m.root, schemas[base]).unwrap();
            assert_eq!(world.root_of(view), m.root);
            assert_same_bytes(world.get::<Position>(view), Some(m.position));
        }
    }
}

#[test]
fn test_random_workload_matches_model() {
    let Setup { mut world, schemas } = setup();
    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);
    let mut live: Vec<Model> = Vec::new();

    for _ in 0..2_000 {
        match rng.gen_range(0..10) {
            0..=3 => {
                let shape = rng.gen_range(0..SHAPES);
                let position = position(&mut rng);
                let root = world.spawn(schemas[shape], (position,)).unwrap();
                live.push(Model {
                    root,
                    shape,
                    glyph: has_glyph(shape).then(Glyph::default),
                    position,
                    velocity: has_velocity(shape).then(Velocity::default),
                });
            }
            4..=5 if !live.is_empty() => {
                let m = live.swap_remove(rng.gen_range(0..live.len()));
                // Any view of the tree destroys all of it.
                let &base = tree(m.shape).first().unwrap();
                let view = world.entities().base_of(m.root, schemas[base]).unwrap();
                world.destroy(view);
            }
            6..=7 if !live.is_empty() => {
                let index = rng.gen_range(0..live.len());
                let m = &mut live[index];
                let velocity = velocity(&mut rng);
                if let Some(v) = world.get_mut::<Velocity>(m.root) {
                    *v = velocity;
                    m.velocity = Some(velocity);
                }
            }
            8..=9 if !live.is_empty() => {
                let index = rng.gen_range(0..live.len());
                let m = &mut live[index];
                // Renderable and Movable only relate through the composite.
                let target = match m.shape {
                    2 => rng.gen_range(0..SHAPES),
                    shape => {
                        if rng.gen_bool(0.5) {
                            shape
                        } else {
                            2
                        }
                    }
                };
                m.root = world.transform_to(m.root, schemas[target], ()).unwrap();
                m.shape = target;
                m.glyph = has_glyph(target).then(|| m.glyph.unwrap_or_default());
                m.velocity = has_velocity(target).then(|| m.velocity.unwrap_or_default());
            }
            _ => {}
        }
        verify(&world, &schemas, &live);
    }

    for m in live.drain(..) {
        world.destroy(m.root);
    }
    assert!(world.is_empty());
    assert_eq!(world.component_count::<Position>(), 0);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Health {
    value: u32,
}
impl Component for Health {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Armor {
    value: u32,
}
impl Component for Armor {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Mana {
    value: u32,
}
impl Component for Mana {}

#[test]
fn test_diamond_tree_shares_one_common_base() {
    let mut builder = Registry::builder();
    builder.component::<Health>("Health").unwrap();
    builder.component::<Armor>("Armor").unwrap();
    builder.component::<Mana>("Mana").unwrap();
    let living = builder.schema("Living").component::<Health>().register().unwrap();
    let warrior = builder
        .schema("Warrior")
        .component::<Armor>()
        .base(living)
        .register()
        .unwrap();
    let mage = builder
        .schema("Mage")
        .component::<Mana>()
        .base(living)
        .register()
        .unwrap();
    let spellblade = builder
        .schema("Spellblade")
        .base(warrior)
        .base(mage)
        .register()
        .unwrap();
    let mut world = World::new(Arc::new(builder.build()));

    let root = world
        .spawn(spellblade, (Health { value: 7 }, Mana { value: 3 }))
        .unwrap();
    assert_eq!(world.len(living), 1);
    assert_eq!(world.len(warrior), 1);
    assert_eq!(world.len(mage), 1);
    assert_eq!(world.len(spellblade), 1);
    assert_eq!(world.component_count::<Health>(), 1);

    let living_view = world.entities().base_of(root, living).unwrap();
    let living_key = living_view.key();

    let new_root = world.transform_to(root, warrior, ()).unwrap();
    assert_eq!(world.len(living), 1);
    assert_eq!(world.len(warrior), 1);
    assert_eq!(world.len(mage), 0);
    assert_eq!(world.len(spellblade), 0);
    assert_eq!(world.component_count::<Mana>(), 0);
    assert_same_bytes(world.get::<Health>(new_root), Some(Health { value: 7 }));

    let kept = world.entities().base_of(new_root, living).unwrap();
    assert_eq!(kept.key(), living_key);
    assert_eq!(
        world.entities().record(kept).parent(),
        Parent::Embedded(new_root)
    );

    world.destroy(kept);
    assert!(world.is_empty());
    assert_eq!(world.component_count::<Health>(), 0);
    assert_eq!(world.component_count::<Armor>(), 0);
}
