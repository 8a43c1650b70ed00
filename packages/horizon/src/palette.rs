//! Colours of terrain, sky, and flora, and how they change with the seasons.

use world_data::*;
use torus_math::*;
use std::{
    fmt::Debug,
    f32,
};
use vek::*;


/// Point in the cycle of seasons.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Season {
    /// How far through the year, in `[0, 1)`. Midwinter is at 0, midsummer
    /// at 0.5.
    pub phase: f32,
    /// How summery, from 0 in midwinter to 1 in midsummer, along a cosine
    /// wave.
    pub summer: Ratio,
}

impl Season {
    pub const MIDWINTER: Season = Season { phase: 0.0, summer: Ratio::ZERO };
    pub const MIDSUMMER: Season = Season { phase: 0.5, summer: Ratio::ONE };

    /// Season at the given time. Wraps the input around the year length to
    /// prevent precision loss as the clock gets high.
    pub fn at(time: f32, year_length: f32) -> Self {
        let phase = (time % year_length / year_length).rem_euclid(1.0);
        let summer = (1.0 - (phase * 2.0 * f32::consts::PI).cos()) / 2.0;
        Season {
            phase,
            summer: Ratio::from_f32(summer),
        }
    }

    pub fn is_spring(&self) -> bool {
        self.phase >= 0.15 && self.phase < 0.35
    }

    pub fn is_autumn(&self) -> bool {
        self.phase >= 0.6 && self.phase < 0.8
    }
}


/// Kinds of flora a palette has colours for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FloraKind {
    Grass,
    Oak,
    Cherry,
}

/// Colours of one kind of flora at one time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FloraColours {
    pub stem: Rgb<u8>,
    pub leaf_fill: Rgb<u8>,
    pub leaf_outline: Rgb<u8>,
}


/// Source of every colour the renderer uses.
pub trait Palette: Debug + Send + Sync {
    /// Lit, unhazed colour of a terrain tile.
    fn terrain(&self, tile: Tile, season: Season) -> Rgb<u8>;

    /// Sky colour at a height above the horizon, 0 at the top of the screen
    /// and 1 at the horizon.
    fn sky(&self, height: Ratio) -> Rgb<u8>;

    /// Colour distant terrain fades into.
    fn haze(&self) -> Rgb<u8>;

    fn flora(&self, kind: FloraKind, season: Season) -> FloraColours;
}


/// Interpolate between two colours.
pub fn mix(a: Rgb<u8>, b: Rgb<u8>, t: Ratio) -> Rgb<u8> {
    Rgb::new(t.lerp_u8(a.r, b.r), t.lerp_u8(a.g, b.g), t.lerp_u8(a.b, b.b))
}

/// Darken a colour for the given shadow level.
pub fn shade(colour: Rgb<u8>, shadow: u8) -> Rgb<u8> {
    const LIGHT: [u32; 4] = [256, 208, 168, 128];
    let light = LIGHT[(shadow & SHADOW_MASK) as usize];
    colour.map(|c| (c as u32 * light >> 8) as u8)
}

/// Fade a colour towards `haze` with distance. Stays clear up close and
/// reaches the haze colour fully at `distance`.
pub fn apply_haze(colour: Rgb<u8>, haze: Rgb<u8>, depth: u32, distance: u32) -> Rgb<u8> {
    let t = Ratio::of(depth, distance.max(1));
    let t = Ratio(t.scale(t.0 as i64) as u32);
    mix(colour, haze, t)
}


/// The built-in palette.
#[derive(Debug, Clone)]
pub struct DefaultPalette {
    /// Terrain colours by category, in midwinter and midsummer.
    pub terrain_winter: [Rgb<u8>; NUM_TERRAIN_CATEGORIES],
    pub terrain_summer: [Rgb<u8>; NUM_TERRAIN_CATEGORIES],
    pub sky_top: Rgb<u8>,
    pub sky_horizon: Rgb<u8>,
    pub haze: Rgb<u8>,
}

impl Default for DefaultPalette {
    fn default() -> Self {
        DefaultPalette {
            // rock, snow, grass, dirt, sand, water
            terrain_winter: [
                Rgb::new(112, 108, 104),
                Rgb::new(236, 240, 248),
                Rgb::new(150, 160, 140),
                Rgb::new(110, 96, 80),
                Rgb::new(200, 190, 160),
                Rgb::new(60, 86, 120),
            ],
            terrain_summer: [
                Rgb::new(128, 120, 110),
                Rgb::new(244, 246, 250),
                Rgb::new(88, 150, 60),
                Rgb::new(132, 104, 72),
                Rgb::new(222, 206, 150),
                Rgb::new(40, 96, 150),
            ],
            sky_top: Rgb::new(70, 120, 210),
            sky_horizon: Rgb::new(190, 214, 240),
            haze: Rgb::new(180, 200, 222),
        }
    }
}

impl Palette for DefaultPalette {
    fn terrain(&self, tile: Tile, season: Season) -> Rgb<u8> {
        let category = (tile.category() as usize).min(NUM_TERRAIN_CATEGORIES - 1);
        let base = mix(self.terrain_winter[category], self.terrain_summer[category], season.summer);
        shade(base, tile.shadow())
    }

    fn sky(&self, height: Ratio) -> Rgb<u8> {
        mix(self.sky_top, self.sky_horizon, height)
    }

    fn haze(&self) -> Rgb<u8> {
        self.haze
    }

    fn flora(&self, kind: FloraKind, season: Season) -> FloraColours {
        let bark = Rgb::new(84, 60, 40);
        match kind {
            FloraKind::Grass => {
                let blade = mix(Rgb::new(160, 160, 110), Rgb::new(70, 140, 50), season.summer);
                FloraColours {
                    stem: blade,
                    leaf_fill: blade,
                    leaf_outline: shade(blade, 2),
                }
            }
            FloraKind::Oak => {
                let fill =
                    if season.is_autumn() { Rgb::new(200, 110, 40) }
                    else { mix(Rgb::new(120, 110, 80), Rgb::new(60, 120, 40), season.summer) };
                FloraColours {
                    stem: bark,
                    leaf_fill: fill,
                    leaf_outline: shade(fill, 3),
                }
            }
            FloraKind::Cherry => {
                let fill =
                    if season.is_spring() { Rgb::new(248, 190, 210) }
                    else { mix(Rgb::new(130, 100, 90), Rgb::new(80, 130, 50), season.summer) };
                FloraColours {
                    stem: Rgb::new(100, 56, 48),
                    leaf_fill: fill,
                    leaf_outline: shade(fill, 3),
                }
            }
        }
    }
}


#[test]
fn test_season_cycle() {
    let winter = Season::at(0.0, 360.0);
    let summer = Season::at(180.0, 360.0);
    let next_winter = Season::at(360.0 * 1000.0, 360.0);
    assert!(winter.summer.0 < Ratio::ONE.0 / 1000);
    assert!(summer.summer.0 > Ratio::ONE.0 / 1000 * 999);
    assert!(next_winter.phase < 0.001);
    assert!(Season::at(90.0, 360.0).is_spring());
    assert!(Season::at(-90.0, 360.0).is_autumn());
}

#[test]
fn test_shade_and_haze() {
    let c = Rgb::new(200, 100, 0);
    assert_eq!(shade(c, 0), c);
    assert_eq!(shade(c, 3), Rgb::new(100, 50, 0));
    let haze = Rgb::new(255, 255, 255);
    assert_eq!(apply_haze(c, haze, 0, 1000), c);
    assert_eq!(apply_haze(c, haze, 1000, 1000), haze);
    assert_eq!(apply_haze(c, haze, 5000, 1000), haze);
    let mid = apply_haze(c, haze, 500, 1000);
    // a quarter of the way, since haze grows with the square of distance
    assert!((mid.r as i32 - 213).abs() <= 1, "{:?}", mid);
}
