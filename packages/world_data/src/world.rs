//! The chain of world levels.

use crate::tile::Tile;
use torus_math::*;
use vek::*;


/// One resolution of the world.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldLevel {
    xmax: u32,
    zmax: u32,
    pub(crate) tiles: Vec<Tile>,
}

impl WorldLevel {
    fn new(xmax: u32, zmax: u32) -> Self {
        WorldLevel {
            xmax,
            zmax,
            tiles: vec![Tile::default(); xmax as usize * zmax as usize],
        }
    }

    /// Number of tiles along X.
    pub fn xmax(&self) -> u32 {
        self.xmax
    }

    /// Number of tiles along Z.
    pub fn zmax(&self) -> u32 {
        self.zmax
    }

    fn idx(&self, x: u32, z: u32) -> usize {
        let x = x & (self.xmax - 1);
        let z = z & (self.zmax - 1);
        z as usize * self.xmax as usize + x as usize
    }

    /// Get the tile at the given tile coordinates, wrapping.
    pub fn get(&self, x: u32, z: u32) -> Tile {
        self.tiles[self.idx(x, z)]
    }

    /// Mutably get the tile at the given tile coordinates, wrapping.
    pub fn get_mut(&mut self, x: u32, z: u32) -> &mut Tile {
        let i = self.idx(x, z);
        &mut self.tiles[i]
    }

    /// All tiles, row by row along X.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    // summary of the 2x2 block beneath coarse tile <x,z>
    fn summarize_children(&self, x: u32, z: u32) -> Tile {
        let (x, z) = (x << 1, z << 1);
        Tile::summarize([
            self.get(x, z),
            self.get(x + 1, z),
            self.get(x, z + 1),
            self.get(x + 1, z + 1),
        ])
    }
}


/// Chain of world levels, from full resolution at level 0 to coarsest last.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    pub(crate) levels: Vec<WorldLevel>,
}

impl World {
    /// Construct a flat world of `xmax` by `zmax` tiles, with coarser levels
    /// halving down to no less than `xmin` by `zmin`.
    ///
    /// Panics unless all are powers of two with the minimums no greater than
    /// the maximums, and the torus fits within `MAX_TORUS_SIZE`.
    pub fn new(xmax: u32, zmax: u32, xmin: u32, zmin: u32) -> Self {
        assert!(
            xmax.is_power_of_two() && zmax.is_power_of_two()
                && xmin.is_power_of_two() && zmin.is_power_of_two(),
            "world dimensions must be powers of two",
        );
        assert!(xmin <= xmax && zmin <= zmax, "world minimum exceeds maximum");
        assert!(
            (xmax as u64) << TILE_SHIFT <= MAX_TORUS_SIZE as u64
                && (zmax as u64) << TILE_SHIFT <= MAX_TORUS_SIZE as u64,
            "world too large",
        );

        let mut levels = Vec::new();
        let (mut x, mut z) = (xmax, zmax);
        loop {
            levels.push(WorldLevel::new(x, z));
            if x / 2 < xmin || z / 2 < zmin {
                break;
            }
            x /= 2;
            z /= 2;
        }
        World { levels }
    }

    /// Number of levels in the chain.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// All levels, finest first.
    pub fn levels(&self) -> &[WorldLevel] {
        &self.levels
    }

    /// Get a level. Panics if out of range.
    pub fn level(&self, level: usize) -> &WorldLevel {
        &self.levels[level]
    }

    /// Full resolution tiles along X.
    pub fn xmax(&self) -> u32 {
        self.levels[0].xmax
    }

    /// Full resolution tiles along Z.
    pub fn zmax(&self) -> u32 {
        self.levels[0].zmax
    }

    /// Torus size along <x,z> in coordinate units.
    pub fn torus(&self) -> Vec2<u32> {
        Vec2::new(self.xmax() << TILE_SHIFT, self.zmax() << TILE_SHIFT)
    }

    /// Get a full resolution tile, wrapping.
    pub fn tile(&self, x: u32, z: u32) -> Tile {
        self.levels[0].get(x, z)
    }

    /// Mutably get a full resolution tile for bulk generation. Coarser levels
    /// will be stale until `recalculate_all` or `patch_next` is called.
    pub fn tile_mut(&mut self, x: u32, z: u32) -> &mut Tile {
        self.levels[0].get_mut(x, z)
    }

    /// Write a full resolution tile and bring coarser levels up to date.
    pub fn set_tile(&mut self, x: u32, z: u32, tile: Tile) {
        *self.levels[0].get_mut(x, z) = tile;
        self.patch_next(x, z);
    }

    /// Given that the full resolution tile at <x,z> changed, recompute the
    /// tile above it at every coarser level.
    pub fn patch_next(&mut self, x: u32, z: u32) {
        let mut x = x & (self.xmax() - 1);
        let mut z = z & (self.zmax() - 1);
        for l in 1..self.levels.len() {
            x >>= 1;
            z >>= 1;
            let (finer, coarser) = self.levels.split_at_mut(l);
            *coarser[0].get_mut(x, z) = finer[l - 1].summarize_children(x, z);
        }
    }

    /// Recompute every coarser level from level 0.
    ///
    /// Same result as calling `patch_next` on every even <x,z> pair, but
    /// visits each coarse tile once.
    pub fn recalculate_all(&mut self) {
        for l in 1..self.levels.len() {
            let (finer, coarser) = self.levels.split_at_mut(l);
            let finer = &finer[l - 1];
            let coarser = &mut coarser[0];
            for z in 0..coarser.zmax {
                for x in 0..coarser.xmax {
                    *coarser.get_mut(x, z) = finer.summarize_children(x, z);
                }
            }
        }
        trace!(levels=%self.levels.len(), "recalculated world levels");
    }

    /// The 2x2 tiles of a level whose corners surround <x,z>, for
    /// interpolating across tile boundaries.
    pub fn level_neighbourhood(&self, level: usize, x: Coord, z: Coord) -> Neighbourhood {
        let lvl = &self.levels[level];
        let shift = TILE_SHIFT + level as u32;
        let (tx, tz) = (x >> shift, z >> shift);
        Neighbourhood {
            tiles: [
                lvl.get(tx, tz),
                lvl.get(tx + 1, tz),
                lvl.get(tx, tz + 1),
                lvl.get(tx + 1, tz + 1),
            ],
            // position within the tile, normalized to TILE_SHIFT bits
            fx: (x & ((1 << shift) - 1)) >> level,
            fz: (z & ((1 << shift) - 1)) >> level,
        }
    }

    /// World Y of the terrain surface at <x,z>, bilinearly interpolated
    /// between the corners of the given level's tiles.
    pub fn level_y(&self, level: usize, x: Coord, z: Coord) -> Coord {
        self.level_neighbourhood(level, x, z).y()
    }

    /// World Y of the terrain surface at <x,z> at full resolution.
    pub fn terrain_base_y(&self, x: Coord, z: Coord) -> Coord {
        self.level_y(0, x, z)
    }
}


/// Four tiles at the corners of a cell of one level, and a position within
/// that cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Neighbourhood {
    /// Tiles at <x,z>, <x+1,z>, <x,z+1> and <x+1,z+1>.
    pub tiles: [Tile; 4],
    /// Position along X, `TILE_SIZE` being the far corner.
    pub fx: u32,
    /// Position along Z, `TILE_SIZE` being the far corner.
    pub fz: u32,
}

impl Neighbourhood {
    /// Bilinear interpolation of one value per tile, ordered as the tiles.
    pub fn blend(&self, values: [u32; 4]) -> u32 {
        let one = TILE_SIZE as u64;
        let (fx, fz) = (self.fx as u64, self.fz as u64);
        let v = values.map(|n| n as u64);
        let near = v[0] * (one - fx) + v[1] * fx;
        let far = v[2] * (one - fx) + v[3] * fx;
        ((near * (one - fz) + far * fz) >> (2 * TILE_SHIFT)) as u32
    }

    /// Interpolated world Y of the terrain surface.
    pub fn y(&self) -> Coord {
        self.blend(self.tiles.map(|t| (t.altitude as u32) << ALTITUDE_SHIFT))
    }
}


#[cfg(test)]
fn patterned_world() -> World {
    use crate::tile::terrain_type;

    let mut world = World::new(32, 16, 2, 1);
    for z in 0..16 {
        for x in 0..32 {
            *world.tile_mut(x, z) = Tile {
                ty: terrain_type(((x * 7 + z * 3) % 6) as u8, (x ^ z) as u8 & 3),
                thickness: 0,
                altitude: ((x * 131 + z * 977) % 2000) as u16,
            };
        }
    }
    world.recalculate_all();
    world
}

#[cfg(test)]
fn assert_levels_consistent(world: &World) {
    for l in 1..world.num_levels() {
        let finer = world.level(l - 1);
        let coarser = world.level(l);
        for z in 0..coarser.zmax() {
            for x in 0..coarser.xmax() {
                let children = [
                    finer.get(2 * x, 2 * z),
                    finer.get(2 * x + 1, 2 * z),
                    finer.get(2 * x, 2 * z + 1),
                    finer.get(2 * x + 1, 2 * z + 1),
                ];
                let tile = coarser.get(x, z);
                assert_eq!(tile.altitude, children.iter().map(|t| t.altitude).max().unwrap());
                assert_eq!(tile.ty, children.iter().map(|t| t.ty).min().unwrap());
            }
        }
    }
}

#[test]
fn test_level_dimensions() {
    let world = World::new(32, 16, 2, 1);
    let dims = world.levels().iter().map(|l| (l.xmax(), l.zmax())).collect::<Vec<_>>();
    assert_eq!(dims, vec![(32, 16), (16, 8), (8, 4), (4, 2), (2, 1)]);

    let world = World::new(8, 8, 8, 8);
    assert_eq!(world.num_levels(), 1);
}

#[test]
fn test_recalculate_all_invariant() {
    assert_levels_consistent(&patterned_world());
}

#[test]
fn test_recalculate_all_matches_patching_even_pairs() {
    let mut by_level = patterned_world();
    let mut by_patch = by_level.clone();
    for l in 1..by_patch.num_levels() {
        by_patch.levels[l].tiles.iter_mut().for_each(|t| *t = Tile::default());
    }
    for z in (0..16).step_by(2) {
        for x in (0..32).step_by(2) {
            by_patch.patch_next(x, z);
        }
    }
    by_level.recalculate_all();
    assert_eq!(by_level, by_patch);
}

#[test]
fn test_set_tile_patches_ancestors() {
    use rand::Rng;
    use rand_pcg::Pcg32;

    let mut world = patterned_world();
    let mut rng = Pcg32::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7);
    for _ in 0..500 {
        let x = rng.gen_range(0..32);
        let z = rng.gen_range(0..16);
        world.set_tile(x, z, Tile {
            ty: rng.gen_range(0..24),
            thickness: 0,
            altitude: rng.gen_range(0..3000),
        });
    }
    assert_levels_consistent(&world);
}

#[test]
fn test_terrain_base_y_interpolates() {
    let mut world = World::new(8, 8, 1, 1);
    world.set_tile(2, 2, Tile { ty: 0, thickness: 0, altitude: 100 });
    world.set_tile(3, 2, Tile { ty: 0, thickness: 0, altitude: 200 });

    let at = |x: f32, z: f32| world.terrain_base_y(
        (x * TILE_SIZE as f32) as Coord,
        (z * TILE_SIZE as f32) as Coord,
    );
    assert_eq!(at(2.0, 2.0), 100 << ALTITUDE_SHIFT);
    assert_eq!(at(3.0, 2.0), 200 << ALTITUDE_SHIFT);
    assert_eq!(at(2.5, 2.0), 150 << ALTITUDE_SHIFT);
    assert_eq!(at(2.0, 2.5), 50 << ALTITUDE_SHIFT);
    assert_eq!(at(5.0, 5.0), 0);

    // no seams when crossing tile boundaries
    let mut prev = at(1.0, 2.0) as i64;
    for i in 1..=400 {
        let y = at(1.0 + i as f32 / 100.0, 2.0) as i64;
        assert!((y - prev).abs() <= (200 << ALTITUDE_SHIFT) / 100 + 2);
        prev = y;
    }
}

#[test]
fn test_terrain_base_y_wraps() {
    let mut world = World::new(8, 8, 1, 1);
    world.set_tile(0, 0, Tile { ty: 0, thickness: 0, altitude: 80 });
    let torus = world.torus();
    // halfway between the last tile and the first one across the seam
    let y = world.terrain_base_y(torus.x - TILE_SIZE / 2, 0);
    assert_eq!(y, 40 << ALTITUDE_SHIFT);
}
