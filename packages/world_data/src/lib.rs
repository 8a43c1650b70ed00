//! In-memory representation of a wrapping heightmap world and the props
//! standing on it.
//!
//! Basic example:
//!
//! ```
//! use world_data::*;
//! use torus_math::*;
//!
//! // 64x64 tiles at full resolution, halving down to 4x4
//! let mut world = World::new(64, 64, 4, 4);
//! assert_eq!(world.num_levels(), 5);
//!
//! world.set_tile(10, 12, Tile {
//!     ty: terrain_type(TERRAIN_ROCK, 0),
//!     thickness: 0,
//!     altitude: 400,
//! });
//!
//! // the edit is visible at every coarser level
//! assert_eq!(world.level(4).get(0, 0).altitude, 400);
//!
//! // heights between tile corners are interpolated
//! let y = world.terrain_base_y(10 << TILE_SHIFT, 12 << TILE_SHIFT);
//! assert_eq!(y, 400 << ALTITUDE_SHIFT);
//! ```
//!
//! ## levels
//!
//! The world is a chain of _levels_. Level 0 is the finest, with one tile per
//! terrain tile. Each following level has half as many tiles along both axes,
//! so a tile at level `l` covers `2^l` by `2^l` terrain tiles. A coarse tile
//! summarizes the 2x2 tiles beneath it: its altitude is their maximum, and its
//! type is their minimum, lower type values being "stronger".
//!
//! Levels only change through `World::set_tile`, which writes a level 0 tile
//! and then re-summarizes each of its ancestors, or through
//! `World::recalculate_all` after bulk generation.
//!
//! ## props
//!
//! Props are point entities such as grass tufts and trees. Each category of
//! prop is a `PropList` kept sorted by Z so that a window of Z values can be
//! found by binary search.

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;


mod tile;
mod world;
mod checkpoint;
mod prop;


pub use self::{
    tile::{
        SHADOW_BITS,
        SHADOW_MASK,
        TERRAIN_ROCK,
        TERRAIN_SNOW,
        TERRAIN_GRASS,
        TERRAIN_DIRT,
        TERRAIN_SAND,
        TERRAIN_WATER,
        NUM_TERRAIN_CATEGORIES,
        Tile,
        terrain_type,
    },
    world::{
        World,
        WorldLevel,
        Neighbourhood,
    },
    checkpoint::{
        CHECKPOINT_MAGIC_BYTES,
        CHECKPOINT_VERSION,
    },
    prop::{
        PROP_ABSENT,
        Prop,
        PropList,
        PropWorld,
    },
};
