//! Terrain tiles and terrain type bit-fiddling.

use serde::{Serialize, Deserialize};


/// Number of low bits of a terrain type holding the shadow level.
pub const SHADOW_BITS: u32 = 2;

/// Mask of the shadow level bits of a terrain type.
pub const SHADOW_MASK: u8 = (1 << SHADOW_BITS) - 1;

pub const TERRAIN_ROCK: u8 = 0;
pub const TERRAIN_SNOW: u8 = 1;
pub const TERRAIN_GRASS: u8 = 2;
pub const TERRAIN_DIRT: u8 = 3;
pub const TERRAIN_SAND: u8 = 4;
pub const TERRAIN_WATER: u8 = 5;

pub const NUM_TERRAIN_CATEGORIES: usize = 6;


/// Pack a terrain category and shadow level into a terrain type.
pub fn terrain_type(category: u8, shadow: u8) -> u8 {
    debug_assert!(shadow <= SHADOW_MASK, "shadow level out of range");
    (category << SHADOW_BITS) | (shadow & SHADOW_MASK)
}


/// One cell of one world level.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub struct Tile {
    /// Terrain type. Lower bits are the shadow level, upper bits the category.
    pub ty: u8,
    /// Reserved for non-ground elements, 0 for terrain.
    pub thickness: u8,
    /// Altitude, shifted left by `ALTITUDE_SHIFT` to become a world Y.
    pub altitude: u16,
}

impl Tile {
    /// Terrain category.
    pub fn category(&self) -> u8 {
        self.ty >> SHADOW_BITS
    }

    /// Shadow level, 0 being fully lit.
    pub fn shadow(&self) -> u8 {
        self.ty & SHADOW_MASK
    }

    /// Tile summarizing the given 2x2 block of finer tiles.
    pub fn summarize(children: [Tile; 4]) -> Tile {
        let mut summary = children[0];
        summary.thickness = 0;
        for child in &children[1..] {
            summary.ty = summary.ty.min(child.ty);
            summary.altitude = summary.altitude.max(child.altitude);
        }
        summary
    }
}


#[test]
fn test_terrain_type_packing() {
    for category in 0..NUM_TERRAIN_CATEGORIES as u8 {
        for shadow in 0..=SHADOW_MASK {
            let tile = Tile {
                ty: terrain_type(category, shadow),
                ..Tile::default()
            };
            assert_eq!(tile.category(), category);
            assert_eq!(tile.shadow(), shadow);
        }
    }
}

#[test]
fn test_summarize() {
    let t = |ty, altitude| Tile { ty, thickness: 3, altitude };
    let summary = Tile::summarize([t(9, 10), t(4, 7), t(12, 90), t(5, 0)]);
    assert_eq!(summary, Tile { ty: 4, thickness: 0, altitude: 90 });
}
