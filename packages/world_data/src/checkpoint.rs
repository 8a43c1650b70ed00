//! Binary checkpoints of the world grid.
//!
//! A checkpoint is a header followed by the tiles of every level, finest
//! first, encoded with bincode. It is meant for restoring a world on the same
//! build of the program, not as an interchange format, but the header still
//! carries magic bytes and a version number so that a stale or foreign file
//! is rejected rather than misinterpreted.

use crate::{
    tile::Tile,
    world::World,
};
use std::{
    fs::File,
    io::{
        Read,
        Write,
        BufReader,
        BufWriter,
    },
    path::Path,
};
use bincode::Options;
use serde::{Serialize, Deserialize};
use torus_math::*;
use anyhow::*;


/// Magic bytes at the start of every checkpoint.
pub const CHECKPOINT_MAGIC_BYTES: [u8; 4] = [0x48, 0x5a, 0x57, 0xb1];

/// Version of the checkpoint layout. Should be changed whenever the layout
/// changes.
pub const CHECKPOINT_VERSION: u32 = 1;

// upper bound on bytes decoded per read call
const DECODE_LIMIT: u64 = 1 << 32;


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    version: u32,
    xmax: u32,
    zmax: u32,
    num_levels: u32,
}

fn options() -> impl Options {
    bincode::options().with_limit(DECODE_LIMIT)
}

impl World {
    /// Write a checkpoint of this world.
    pub fn save<W: Write>(&self, mut write: W) -> Result<()> {
        let header = Header {
            magic: CHECKPOINT_MAGIC_BYTES,
            version: CHECKPOINT_VERSION,
            xmax: self.xmax(),
            zmax: self.zmax(),
            num_levels: self.num_levels() as u32,
        };
        options().serialize_into(&mut write, &header)?;
        for level in &self.levels {
            options().serialize_into(&mut write, &level.tiles)?;
        }
        write.flush()?;
        Ok(())
    }

    /// Read a checkpoint written by `save`.
    pub fn load<R: Read>(mut read: R) -> Result<Self> {
        let header: Header = options()
            .deserialize_from(&mut read)
            .context("checkpoint header failed to decode")?;
        ensure!(header.magic == CHECKPOINT_MAGIC_BYTES, "checkpoint magic bytes wrong");
        ensure!(
            header.version == CHECKPOINT_VERSION,
            "checkpoint version {} unsupported, expected {}",
            header.version,
            CHECKPOINT_VERSION,
        );
        ensure!(
            header.xmax.is_power_of_two() && header.zmax.is_power_of_two(),
            "checkpoint world dimensions not powers of two",
        );
        ensure!(
            (header.xmax as u64) << TILE_SHIFT <= MAX_TORUS_SIZE as u64
                && (header.zmax as u64) << TILE_SHIFT <= MAX_TORUS_SIZE as u64,
            "checkpoint world dimensions too large",
        );
        let max_levels = header.xmax.min(header.zmax).trailing_zeros() + 1;
        ensure!(
            header.num_levels >= 1 && header.num_levels <= max_levels,
            "checkpoint has {} levels, which is impossible for a {}x{} world",
            header.num_levels,
            header.xmax,
            header.zmax,
        );
        let shrink = header.num_levels - 1;
        let mut world = World::new(
            header.xmax,
            header.zmax,
            header.xmax >> shrink,
            header.zmax >> shrink,
        );
        debug_assert_eq!(world.num_levels(), header.num_levels as usize);

        for (l, level) in world.levels.iter_mut().enumerate() {
            let tiles: Vec<Tile> = options()
                .deserialize_from(&mut read)
                .with_context(|| format!("checkpoint level {} failed to decode", l))?;
            ensure!(
                tiles.len() == level.tiles.len(),
                "checkpoint level {} has {} tiles, expected {}",
                l,
                tiles.len(),
                level.tiles.len(),
            );
            level.tiles = tiles;
        }
        Ok(world)
    }

    /// Write a checkpoint to a file, creating or truncating it.
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("unable to create {}", path.display()))?;
        self.save(BufWriter::new(file))?;
        debug!(path=%path.display(), "saved world checkpoint");
        Ok(())
    }

    /// Read a checkpoint from a file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("unable to open {}", path.display()))?;
        let world = Self::load(BufReader::new(file))
            .with_context(|| format!("unable to load {}", path.display()))?;
        debug!(
            path=%path.display(),
            xmax=%world.xmax(),
            zmax=%world.zmax(),
            "loaded world checkpoint",
        );
        Ok(world)
    }
}


#[cfg(test)]
fn sample_world() -> World {
    let mut world = World::new(16, 8, 2, 2);
    for z in 0..8 {
        for x in 0..16 {
            *world.tile_mut(x, z) = Tile {
                ty: (x + z) as u8 % 20,
                thickness: 0,
                altitude: (x * 100 + z * 7) as u16,
            };
        }
    }
    world.recalculate_all();
    world
}

#[test]
fn test_checkpoint_round_trip() {
    let world = sample_world();
    let mut buf = Vec::new();
    world.save(&mut buf).unwrap();
    let loaded = World::load(buf.as_slice()).unwrap();
    assert_eq!(world, loaded);
}

#[test]
fn test_checkpoint_rejects_truncation() {
    let world = sample_world();
    let mut buf = Vec::new();
    world.save(&mut buf).unwrap();
    for len in [0, 3, buf.len() / 2, buf.len() - 1] {
        assert!(World::load(&buf[..len]).is_err(), "accepted {} of {} bytes", len, buf.len());
    }
}

#[test]
fn test_checkpoint_rejects_wrong_magic() {
    let world = sample_world();
    let mut buf = Vec::new();
    world.save(&mut buf).unwrap();
    buf[0] ^= 0xff;
    assert!(World::load(buf.as_slice()).is_err());
}
