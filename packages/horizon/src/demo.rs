//! A procedurally generated scene to render when no world is supplied.

use crate::{
    flora::{
        Grass,
        Tree,
        PROP_GRASS,
        PROP_OAK,
        PROP_CHERRY,
    },
    palette::FloraKind,
    props::PropRenderers,
};
use world_data::*;
use torus_math::*;
use std::sync::Arc;
use anyhow::*;
use bracket_noise::prelude::*;
use rand::{
    Rng,
    SeedableRng,
};
use rand_pcg::Pcg64Mcg;


/// Oak branching program, expanded.
pub const OAK_PROGRAM: &'static str =
    "FFF[&&F[+FL][-FL][^FL]FL][^^F[+FL][-FL][&FL]FL][++F[^FL][&FL]FL][--F[^FL][&FL]FL]FL";

/// Cherry branching program, expanded.
pub const CHERRY_PROGRAM: &'static str =
    "FF[+F[+FL][-FL][^F[&FL]L]FL][-F[+FL][-FL][&F[^FL]L]FL][^F[-FL]FL][&F[+FL]FL]FL";

// altitudes, in altitude units
const SEA_LEVEL: u16 = 1400;
const BEACH: u16 = 1500;
const TREE_LINE: u16 = 3200;
const SNOW_LINE: u16 = 3800;
const MAX_ALTITUDE: f32 = 5000.0;

// grass free radius around a tree trunk, in world units
const CLEARING: u32 = TILE_SIZE / 4;


/// How to generate the demo scene.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DemoParams {
    /// Tiles along each axis. Power of two.
    pub size: u32,
    pub seed: u64,
    /// Grass tufts to attempt to place.
    pub grass: usize,
    /// Trees to attempt to place.
    pub trees: usize,
}

impl Default for DemoParams {
    fn default() -> Self {
        DemoParams {
            size: 1024,
            seed: 0xcafef00dd15ea5e5,
            grass: 200_000,
            trees: 40_000,
        }
    }
}


// noise which wraps around both axes of a size x size square, by blending
// the four ways of shifting a point around the square
fn toroidal_noise(noise: &FastNoise, x: u32, z: u32, size: u32) -> f32 {
    let s = size as f32;
    let (fx, fz) = (x as f32 / s, z as f32 / s);
    let (x, z) = (x as f32, z as f32);
    noise.get_noise(x, z) * (1.0 - fx) * (1.0 - fz)
        + noise.get_noise(x - s, z) * fx * (1.0 - fz)
        + noise.get_noise(x, z - s) * (1.0 - fx) * fz
        + noise.get_noise(x - s, z - s) * fx * fz
}

fn category_at(altitude: u16, slope: u16) -> u8 {
    if altitude <= SEA_LEVEL {
        TERRAIN_WATER
    } else if altitude < BEACH {
        TERRAIN_SAND
    } else if altitude >= SNOW_LINE {
        TERRAIN_SNOW
    } else if altitude >= TREE_LINE || slope > 160 {
        TERRAIN_ROCK
    } else if slope > 90 {
        TERRAIN_DIRT
    } else {
        TERRAIN_GRASS
    }
}

// shadow from light falling from the -X side
fn shadow_at(rise: i32) -> u8 {
    match rise {
        i32::MIN..=-120 => 3,
        -119..=-60 => 2,
        -59..=-20 => 1,
        _ => 0,
    }
}

/// Generate a wrapping world of hills, lakes, and snowy peaks.
pub fn generate_world(params: &DemoParams) -> World {
    let size = params.size;
    let mut noise = FastNoise::seeded(params.seed);
    noise.set_noise_type(NoiseType::SimplexFractal);
    noise.set_fractal_type(FractalType::FBM);
    noise.set_fractal_octaves(6);
    noise.set_frequency(1.0 / 160.0);

    let mut world = World::new(size, size, 1, 1);
    let mut altitudes = vec![0u16; size as usize * size as usize];
    for z in 0..size {
        for x in 0..size {
            let n = toroidal_noise(&noise, x, z, size);
            let alt = ((n * 0.5 + 0.5) * MAX_ALTITUDE).clamp(0.0, MAX_ALTITUDE) as u16;
            altitudes[(z * size + x) as usize] = alt.max(SEA_LEVEL);
        }
    }
    let alt = |x: u32, z: u32| altitudes[((z & (size - 1)) * size + (x & (size - 1))) as usize];
    for z in 0..size {
        for x in 0..size {
            let a = alt(x, z);
            let rise = a as i32 - alt(x.wrapping_sub(1), z) as i32;
            let slope = rise.unsigned_abs()
                .max((a as i32 - alt(x, z.wrapping_sub(1)) as i32).unsigned_abs()) as u16;
            let category = category_at(a, slope);
            let shadow = if category == TERRAIN_WATER { 0 } else { shadow_at(rise) };
            *world.tile_mut(x, z) = Tile {
                ty: terrain_type(category, shadow),
                thickness: 0,
                altitude: a,
            };
        }
    }
    world.recalculate_all();
    debug!(size, levels = world.num_levels(), "generated demo world");
    world
}

/// Scatter grass and trees over the grassy parts of a world.
pub fn scatter_props(world: World, params: &DemoParams) -> PropWorld {
    let mut rng = Pcg64Mcg::seed_from_u64(params.seed);
    let torus = world.torus();
    let place = |count: usize, rng: &mut Pcg64Mcg, ty: &dyn Fn(&mut Pcg64Mcg) -> u8| {
        let mut props = Vec::with_capacity(count);
        for _ in 0..count {
            let x = rng.gen_range(0..torus.x);
            let z = rng.gen_range(0..torus.y);
            if world.tile(x >> TILE_SHIFT, z >> TILE_SHIFT).category() != TERRAIN_GRASS {
                continue;
            }
            props.push(Prop {
                x,
                z,
                ty: ty(rng),
                variant: rng.gen(),
                yrot: Angle(rng.gen()),
            });
        }
        props
    };

    let grass = place(params.grass, &mut rng, &|_| PROP_GRASS);
    let trees = place(params.trees, &mut rng, &|rng| {
        if rng.gen_bool(1.0 / 3.0) { PROP_CHERRY } else { PROP_OAK }
    });
    let mut layers = [Vec::new(), Vec::new()];
    for (i, tree) in trees.into_iter().enumerate() {
        layers[i % 2].push(tree);
    }
    let [layer0, layer1] = layers;

    let mut scene = PropWorld::new(world);
    scene.grass = PropList::from_unsorted(grass);
    scene.trees = [PropList::from_unsorted(layer0), PropList::from_unsorted(layer1)];
    clear_around_trees(&mut scene, CLEARING);
    debug!(
        grass = scene.grass.as_slice().iter().filter(|p| p.is_present()).count(),
        trees = scene.trees[0].len() + scene.trees[1].len(),
        "scattered demo props",
    );
    scene
}

// nothing grows right at the foot of a tree
fn clear_around_trees(scene: &mut PropWorld, radius: u32) {
    let torus = scene.world.torus();
    let r = radius as i32;
    let mut cleared = Vec::new();
    for tree in scene.trees.iter().flat_map(|list| list.as_slice()) {
        let zmin = torus_add(tree.z, -r, torus.y);
        let zmax = torus_add(tree.z, r, torus.y);
        cleared.extend(
            scene.grass.window(zmin, zmax)
                .filter(|(_, grass)| torus_dist(tree.x, grass.x, torus.x).abs() < r)
                .map(|(i, _)| i)
        );
    }
    for i in cleared {
        scene.grass.destroy(i);
    }
}

/// Renderers for the props `scatter_props` places.
pub fn demo_renderers() -> Result<PropRenderers> {
    let mut oak = Tree::new(
        FloraKind::Oak,
        OAK_PROGRAM,
        (TILE_SIZE / 5) as f32,
        Angle::from_degrees(32.0),
        (TILE_SIZE / 28) as f32,
        (TILE_SIZE / 7) as f32,
    ).context("oak program")?;
    oak.deciduous = true;
    let mut cherry = Tree::new(
        FloraKind::Cherry,
        CHERRY_PROGRAM,
        (TILE_SIZE / 7) as f32,
        Angle::from_degrees(38.0),
        (TILE_SIZE / 36) as f32,
        (TILE_SIZE / 10) as f32,
    ).context("cherry program")?;
    cherry.deciduous = true;

    let mut renderers = PropRenderers::new();
    renderers.insert(PROP_GRASS, Arc::new(Grass::default()));
    renderers.insert(PROP_OAK, Arc::new(oak));
    renderers.insert(PROP_CHERRY, Arc::new(cherry));
    Ok(renderers)
}


#[test]
fn test_demo_world_wraps() {
    let params = DemoParams {
        size: 64,
        grass: 500,
        trees: 100,
        ..DemoParams::default()
    };
    let world = generate_world(&params);
    // neighbours across the seam are no further apart than other neighbours
    let alt = |x: u32, z: u32| world.tile(x & 63, z & 63).altitude as i32;
    let mut seam = 0;
    let mut inner = 0;
    for a in 0..64 {
        seam = seam.max((alt(63, a) - alt(0, a)).abs()).max((alt(a, 63) - alt(a, 0)).abs());
        for b in 0..63 {
            inner = inner.max((alt(b, a) - alt(b + 1, a)).abs()).max((alt(a, b) - alt(a, b + 1)).abs());
        }
    }
    assert!(seam <= inner * 2, "seam {} inner {}", seam, inner);

    let scene = scatter_props(world, &params);
    for list in [&scene.grass, &scene.trees[0], &scene.trees[1]] {
        let zs = list.as_slice().iter().map(|p| p.z).collect::<Vec<_>>();
        assert!(zs.windows(2).all(|w| w[0] <= w[1]));
    }
    assert!(scene.grass.as_slice().iter().all(|p| p.ty == PROP_GRASS || !p.is_present()));
    assert!(
        scene.trees.iter()
            .flat_map(|list| list.as_slice())
            .all(|p| p.ty == PROP_OAK || p.ty == PROP_CHERRY)
    );
}

#[test]
fn test_no_grass_at_the_foot_of_trees() {
    let params = DemoParams {
        size: 16,
        grass: 20000,
        trees: 50,
        ..DemoParams::default()
    };
    let mut world = World::new(16, 16, 1, 1);
    for z in 0..16 {
        for x in 0..16 {
            world.tile_mut(x, z).ty = terrain_type(TERRAIN_GRASS, 0);
        }
    }
    world.recalculate_all();
    let scene = scatter_props(world, &params);
    let torus = scene.world.torus();
    let trees = scene.trees.iter().flat_map(|list| list.as_slice()).collect::<Vec<_>>();
    assert!(!trees.is_empty());
    let (present, absent): (Vec<&Prop>, Vec<&Prop>) = scene.grass.as_slice()
        .iter()
        .partition(|p| p.is_present());
    // with this much grass some of it must have been under a tree
    assert!(!absent.is_empty());
    for grass in present {
        for tree in &trees {
            let near = |a: Coord, b: Coord, m: u32| torus_dist(a, b, m).abs() < CLEARING as i32;
            assert!(!(near(grass.x, tree.x, torus.x) && near(grass.z, tree.z, torus.y)));
        }
    }
}

#[test]
fn test_demo_renderers_build() {
    let renderers = demo_renderers().unwrap();
    for ty in [PROP_GRASS, PROP_OAK, PROP_CHERRY] {
        assert!(renderers.get(ty).is_some());
    }
    assert!(renderers.get(PROP_CHERRY + 1).is_none());
}
