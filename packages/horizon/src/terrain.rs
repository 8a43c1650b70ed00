//! Driving terrabuffs outward across the world.

use crate::{
    perspective::Perspective,
    palette::{
        Palette,
        Season,
        apply_haze,
    },
    settings::Settings,
    terrabuff::{
        Terrabuff,
        Sample,
        LOOKAHEAD,
        MIN_SLICES,
    },
};
use world_data::{
    Neighbourhood,
    World,
};
use torus_math::*;
use std::f32::consts::TAU;
use vek::*;


/// Fewest slices `split_slices` gives a subrange.
pub const MIN_SUBRANGE: u32 = MIN_SLICES + 1;

// 2 pi in 10 bit fixed point
const TAU_FIXED: u64 = 6434;
const TAU_FIXED_BITS: u32 = 10;


/// A subrange of slices for one terrabuff to scan.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SliceRange {
    pub low: u32,
    pub high: u32,
    /// Whether another subrange continues on the low side.
    pub pin_low: bool,
    /// Whether another subrange continues on the high side.
    pub pin_high: bool,
}


/// Distances governing a terrain scan, in world units.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScanParams {
    pub start_distance: u32,
    pub view_distance: u32,
    pub haze: bool,
}

impl ScanParams {
    pub fn from_settings(settings: &Settings) -> Self {
        let tile = TILE_SIZE as f32;
        ScanParams {
            start_distance: (settings.start_distance_tiles * tile).max(1.0) as u32,
            view_distance: (settings.view_distance_tiles as u64 * TILE_SIZE as u64)
                .min(MAX_TORUS_SIZE as u64) as u32,
            haze: settings.haze,
        }
    }
}


/// Why a terrain scan stopped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScanStop {
    /// The terrabuff ran out of rings.
    Capacity,
    /// The visible range of slices narrowed to nothing.
    Collapsed,
    /// The view distance was reached.
    ViewDistance,
    /// Half way around the world was reached.
    HalfTorus,
    /// Slices grew further apart than even the coarsest level could fill.
    LevelsExhausted,
}

/// Counters from one `scan_terrain`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScanStats {
    pub rings: usize,
    pub samples: u64,
    /// Level of detail of the last ring.
    pub level: usize,
    /// Distance of the last ring.
    pub distance: u64,
    pub stop: ScanStop,
}


/// Initial slice bounds for a perspective: the horizontal extent of the view
/// frustum plus a margin, centred on the view direction. Offset by one full
/// turn so that the bounds never underflow.
///
/// Pitching widens the extent, up to the whole turn once the frustum takes in
/// the vertical.
pub fn visible_slices(persp: &Perspective, slice_cap: u32) -> (u32, u32) {
    assert!(slice_cap.is_power_of_two() && slice_cap <= FULL_TURN && slice_cap >= 4);
    let shift = ANGLE_BITS - slice_cap.trailing_zeros();
    let centre = (persp.yaw().0 as u32) >> shift;
    let max_half = slice_cap / 2 - 1;

    let screen = persp.screen();
    let tan_h = persp.fov().half().to_radians().tan();
    let tan_v = tan_h * screen.h as f32 / screen.w.max(1) as f32;
    let pitch = (persp.pitch().signed() as f32 / FULL_TURN as f32 * TAU).abs();
    // horizontal depth of the frustum's corner rays
    let depth = pitch.cos() - tan_v * pitch.sin();
    let half =
        if depth <= 0.0 {
            max_half
        } else {
            let angle = (tan_h / depth).atan();
            let slices = (angle / TAU * slice_cap as f32).ceil() as u32;
            (slices + LOOKAHEAD + 2).min(max_half)
        };
    (slice_cap + centre - half, slice_cap + centre + half + 1)
}

/// Split slices `[low, high)` into up to `n` contiguous subranges for
/// parallel scanning, centre subranges getting more slices than edge ones.
///
/// Subrange `i` is weighted `1 + weight * (1 - u^2)` where `u` runs from -1
/// to 1 across the subranges. Every subrange gets at least `MIN_SUBRANGE`
/// slices, fewer subranges being returned if there are not enough slices.
pub fn split_slices(low: u32, high: u32, n: usize, weight: f32) -> Vec<SliceRange> {
    assert!(n > 0, "cannot split slices 0 ways");
    assert!(low <= high, "slice bounds out of order");
    let total = high - low;
    let n = n.min((total / MIN_SUBRANGE) as usize).max(1);

    let weights = (0..n)
        .map(|i| {
            let u = (2 * i + 1) as f64 / n as f64 - 1.0;
            1.0 + weight.max(0.0) as f64 * (1.0 - u * u)
        })
        .collect::<Vec<_>>();
    let weight_sum = weights.iter().sum::<f64>();
    let spare = total.saturating_sub(MIN_SUBRANGE * n as u32) as f64;

    let mut ranges = Vec::with_capacity(n);
    let mut cumulative = 0.0;
    let mut start = low;
    for i in 0..n {
        cumulative += weights[i];
        let end =
            if i + 1 == n { high }
            else {
                low + MIN_SUBRANGE * (i as u32 + 1)
                    + (spare * cumulative / weight_sum).floor() as u32
            };
        ranges.push(SliceRange {
            low: start,
            high: end,
            pin_low: i > 0,
            pin_high: i + 1 < n,
        });
        start = end;
    }
    ranges
}

/// Palette colour of the terrain at a point, blended across the tiles
/// around it the same way as its height.
pub fn terrain_colour(hood: &Neighbourhood, palette: &dyn Palette, season: Season) -> Rgb<u8> {
    let colours = hood.tiles.map(|tile| palette.terrain(tile, season));
    let channel = |c: fn(&Rgb<u8>) -> u8| hood.blend(colours.map(|rgb| c(&rgb) as u32)) as u8;
    Rgb::new(channel(|c| c.r), channel(|c| c.g), channel(|c| c.b))
}

/// Scan terrain into a terrabuff over a range of slices, ring by ring out
/// from the camera.
///
/// Rings start at the start distance and step outwards by a step which grows
/// with every ring. Each ring samples the finest world level whose tiles are
/// at least half as wide as the gap between adjacent slices.
pub fn scan_terrain(
    tb: &mut Terrabuff,
    world: &World,
    persp: &Perspective,
    palette: &dyn Palette,
    season: Season,
    params: &ScanParams,
    range: SliceRange,
) -> ScanStats {
    let slice_cap = tb.slice_cap();
    let slice_mask = slice_cap - 1;
    let shift = ANGLE_BITS - slice_cap.trailing_zeros();
    let torus = world.torus();
    let camera = persp.camera();
    let haze = palette.haze();
    let half_torus = (torus.x.min(torus.y) / 2) as u64;
    let top_level = world.num_levels() - 1;

    tb.set_screen_width(persp.screen().w as i32);
    tb.clear_pinned(range.low, range.high, range.pin_low, range.pin_high);

    // coarsest level needed at a distance, if any is coarse enough. slices
    // should be no more than two tiles of the level apart.
    let level_at = |r: u64, mut level: usize| {
        let arc = (r * TAU_FIXED >> TAU_FIXED_BITS) / slice_cap as u64;
        while level < top_level && arc > (2 * TILE_SIZE as u64) << level {
            level += 1;
        }
        if arc > (2 * TILE_SIZE as u64) << level { None } else { Some(level) }
    };
    // why a ring at a distance should not be scanned, if it shouldn't
    let stop_at = |r: u64, level: usize| {
        if r >= half_torus {
            Err(ScanStop::HalfTorus)
        } else if r >= params.view_distance as u64 {
            Err(ScanStop::ViewDistance)
        } else {
            level_at(r, level).ok_or(ScanStop::LevelsExhausted)
        }
    };

    let mut r = params.start_distance.max(1) as u64;
    let mut dr = (r / 4).max(1);
    let mut level = 0;
    let mut samples = 0;
    let mut next_level = stop_at(r, level);
    let stop = loop {
        level = match next_level {
            Ok(level) => level,
            Err(stop) => break stop,
        };

        let (low, high) = tb.bounds();
        for slice in low..high {
            let a = Angle(((slice & slice_mask) << shift) as u16);
            let x = camera.x as i64 + (r as i64 * a.sin() as i64 >> SCALING_FACTOR_BITS);
            let z = camera.z as i64 - (r as i64 * a.cos() as i64 >> SCALING_FACTOR_BITS);
            let x = wrap_coord(x, torus.x);
            let z = wrap_coord(z, torus.y);
            let hood = world.level_neighbourhood(level, x, z);
            let y = hood.y();

            let rel = persp.translate_relative(Vec3::new(x, y, z));
            let sp = persp.project(rel).unwrap_or_else(|| persp.project_clamped(rel));

            let mut colour = terrain_colour(&hood, palette, season);
            if params.haze {
                colour = apply_haze(colour, haze, r as u32, params.view_distance);
            }
            tb.put(Sample {
                pos: sp.pos,
                depth: sp.depth,
                colour,
                clamped: sp.clamped,
            });
        }
        samples += (high - low) as u64;

        // only open another ring if it is to be scanned
        r += dr;
        dr += dr / 32 + 1;
        next_level = stop_at(r, level);
        if next_level.is_ok() && !tb.next() {
            let stop =
                if tb.num_rings() >= tb.scan_cap() { ScanStop::Capacity }
                else { ScanStop::Collapsed };
            break stop;
        }
    };

    let stats = ScanStats {
        rings: tb.num_rings(),
        samples,
        level,
        distance: r,
        stop,
    };
    trace!(?stats, low=%range.low, high=%range.high, "scanned terrain");
    stats
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::DefaultPalette;
    use world_data::*;

    fn hilly_world() -> World {
        let mut world = World::new(256, 256, 1, 1);
        for z in 0..256 {
            for x in 0..256 {
                *world.tile_mut(x, z) = Tile {
                    ty: terrain_type(TERRAIN_GRASS, 0),
                    thickness: 0,
                    altitude: 200 + ((x * 7 + z * 13) % 50) as u16,
                };
            }
        }
        world.recalculate_all();
        world
    }

    fn perspective(world: &World, camera: Vec3<Coord>, pitch: f32) -> Perspective {
        Perspective::new(
            camera,
            Angle::from_degrees(30.0),
            Angle::from_degrees(pitch),
            Angle::from_degrees(90.0),
            Extent2::new(320, 200),
            world.torus(),
            TILE_SIZE / 8,
        )
    }

    #[test]
    fn test_split_favours_centre() {
        let ranges = split_slices(1000, 2000, 4, 1.0);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0].low, 1000);
        assert_eq!(ranges[3].high, 2000);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].high, pair[1].low);
        }
        let widths = ranges.iter().map(|r| r.high - r.low).collect::<Vec<_>>();
        assert!(widths[1] > widths[0] && widths[2] > widths[3], "{:?}", widths);
        assert!(!ranges[0].pin_low && ranges[0].pin_high);
        assert!(ranges[1].pin_low && ranges[1].pin_high);
        assert!(ranges[3].pin_low && !ranges[3].pin_high);

        // without weight, an even split
        let even = split_slices(0, 400, 4, 0.0);
        assert!(even.iter().all(|r| r.high - r.low == 100));
    }

    #[test]
    fn test_split_respects_minimum() {
        let ranges = split_slices(0, 12, 8, 1.0);
        assert_eq!(ranges.len(), 2);
        assert!(ranges.iter().all(|r| r.high - r.low >= MIN_SUBRANGE));
        let single = split_slices(7, 9, 3, 1.0);
        assert_eq!(single, vec![SliceRange { low: 7, high: 9, pin_low: false, pin_high: false }]);
    }

    #[test]
    fn test_visible_slices_centre_on_yaw() {
        let world = hilly_world();
        let persp = perspective(&world, Vec3::new(1 << 23, 300 << ALTITUDE_SHIFT, 1 << 23), 0.0);
        let (low, high) = visible_slices(&persp, 1024);
        // 30 degrees is slice 85 of 1024
        let centre = (low + high) / 2 - 1024;
        assert!((centre as i32 - 85).abs() <= 1, "{}", centre);
        // 90 degrees and a little
        assert!(high - low > 256);
        assert!(high - low < 300);

        // looking down widens the view, looking straight down takes in all
        let down = perspective(&world, Vec3::new(1 << 23, 300 << ALTITUDE_SHIFT, 1 << 23), -30.0);
        let (down_low, down_high) = visible_slices(&down, 1024);
        assert!(down_high - down_low > high - low);
        let floor = perspective(&world, Vec3::new(1 << 23, 300 << ALTITUDE_SHIFT, 1 << 23), -80.0);
        let (floor_low, floor_high) = visible_slices(&floor, 1024);
        assert_eq!(floor_high - floor_low, 1023);
    }

    #[test]
    fn test_scan_produces_ground_below_horizon() {
        let world = hilly_world();
        let camera = Vec3::new(1 << 23, 260 << ALTITUDE_SHIFT, 1 << 23);
        let persp = perspective(&world, camera, -10.0);
        let palette = DefaultPalette::default();
        let params = ScanParams {
            start_distance: TILE_SIZE / 2,
            view_distance: 100 * TILE_SIZE,
            haze: true,
        };
        let (low, high) = visible_slices(&persp, 1024);
        let mut tb = Terrabuff::new(1024, 256);
        let stats = scan_terrain(
            &mut tb,
            &world,
            &persp,
            &palette,
            Season::MIDSUMMER,
            &params,
            SliceRange { low, high, pin_low: false, pin_high: false },
        );
        assert!(stats.rings > 10, "{:?}", stats);
        assert!(stats.rings <= 256);
        assert_eq!(stats.stop, ScanStop::ViewDistance);
        // the cone narrowed to the screen after the first ring
        let first = &tb.rings()[0];
        let last = tb.rings().last().unwrap();
        assert!(last.high() - last.low() < first.high() - first.low());
        for ring in tb.rings() {
            let xs = ring.samples().iter().map(|s| s.pos.x).collect::<Vec<_>>();
            assert!(xs.windows(2).all(|w| w[0] < w[1]));
        }

        let mut canvas = draw_queue::Canvas::new(320, 200);
        let stats = tb.render(&mut canvas.region());
        assert!(stats.spans > 0);
        // bottom of the screen is ground, the top is untouched
        assert_ne!(canvas.depth(160, 199), draw_queue::DEPTH_FAR);
        assert_eq!(canvas.depth(160, 0), draw_queue::DEPTH_FAR);
    }

    #[test]
    fn test_scan_terminates_for_pathological_cameras() {
        let world = hilly_world();
        let palette = DefaultPalette::default();
        let params = ScanParams {
            start_distance: 1,
            view_distance: u32::MAX,
            haze: false,
        };
        let cameras = [
            (Vec3::new(0, u32::MAX, 0), -89.0),
            (Vec3::new(u32::MAX, 0, u32::MAX), 89.0),
            (Vec3::new(12345, 250 << ALTITUDE_SHIFT, 999), 0.0),
        ];
        for (camera, pitch) in cameras {
            let camera = camera.map2(Vec3::new(1 << 24, 1, 1 << 24), |c, m| if m > 1 { c % m } else { c });
            let persp = perspective(&world, camera, pitch);
            for scan_cap in [1, 2, 64] {
                let mut tb = Terrabuff::new(256, scan_cap);
                let (low, high) = visible_slices(&persp, 256);
                let stats = scan_terrain(
                    &mut tb,
                    &world,
                    &persp,
                    &palette,
                    Season::MIDWINTER,
                    &params,
                    SliceRange { low, high, pin_low: false, pin_high: false },
                );
                assert!(stats.rings <= scan_cap, "{:?}", stats);
                assert!(tb.rings().iter().all(|ring| !ring.samples().is_empty()));
            }
        }
    }

    #[test]
    fn test_parallel_scan_merges_into_whole() {
        let world = hilly_world();
        let camera = Vec3::new(1 << 23, 260 << ALTITUDE_SHIFT, 1 << 23);
        let persp = perspective(&world, camera, -5.0);
        let palette = DefaultPalette::default();
        let params = ScanParams {
            start_distance: TILE_SIZE / 2,
            view_distance: 60 * TILE_SIZE,
            haze: false,
        };
        let (low, high) = visible_slices(&persp, 1024);
        let ranges = split_slices(low, high, 3, 1.0);
        let mut tbs = ranges
            .iter()
            .map(|&range| {
                let mut tb = Terrabuff::new(1024, 128);
                scan_terrain(&mut tb, &world, &persp, &palette, Season::MIDSUMMER, &params, range);
                tb
            })
            .collect::<Vec<_>>();
        let (first, rest) = tbs.split_first_mut().unwrap();
        for tb in rest.iter() {
            first.merge(tb);
        }
        for ring in first.rings() {
            assert_eq!(ring.high() - ring.low(), ring.samples().len() as u32);
            let xs = ring.samples().iter().map(|s| s.pos.x).collect::<Vec<_>>();
            assert!(xs.windows(2).all(|w| w[0] < w[1]));
        }
        // the first ring spans all subranges
        assert_eq!(first.rings()[0].low(), low);
        assert_eq!(first.rings()[0].high(), high);
    }

    #[test]
    fn test_colour_blends_across_terrain_edge() {
        let mut world = World::new(16, 16, 1, 1);
        for z in 0..16 {
            for x in 0..16 {
                world.tile_mut(x, z).ty =
                    if x < 8 { terrain_type(TERRAIN_GRASS, 0) }
                    else { terrain_type(TERRAIN_ROCK, 0) };
            }
        }
        world.recalculate_all();
        let palette = DefaultPalette::default();
        let season = Season::MIDSUMMER;
        let grass = palette.terrain(world.level(0).get(0, 0), season);
        let rock = palette.terrain(world.level(0).get(8, 0), season);
        assert_ne!(grass, rock);

        let at = |tiles: f32| {
            let x = (tiles * TILE_SIZE as f32) as Coord;
            terrain_colour(&world.level_neighbourhood(0, x, 3 * TILE_SIZE), &palette, season)
        };
        assert_eq!(at(3.0), grass);
        assert_eq!(at(7.0), grass);
        assert_eq!(at(8.0), rock);
        // halfway across the edge, not one side or the other
        let mid = at(7.5);
        for (m, g, r) in [
            (mid.r, grass.r, rock.r),
            (mid.g, grass.g, rock.g),
            (mid.b, grass.b, rock.b),
        ] {
            let expected = (g as i32 + r as i32) / 2;
            assert!((m as i32 - expected).abs() <= 1, "{:?} between {:?} and {:?}", mid, grass, rock);
        }
    }
}
