//! Fixed-point math for a world that wraps around on itself.
//!
//! Basic example:
//!
//! ```
//! use torus_math::*;
//!
//! // a 1024x1024 tile world
//! let torus = 1024 << TILE_SHIFT;
//!
//! // stepping backwards across the seam is a short trip
//! let a = 3 << TILE_SHIFT;
//! let b = torus - (2 << TILE_SHIFT);
//! assert_eq!(torus_dist(a, b, torus), -(5 << TILE_SHIFT));
//!
//! // dividing by the same number many times only divides once
//! let third = fraction_of(3);
//! assert_eq!(fraction_umul(300, third), 100);
//!
//! // binary angles wrap for free
//! let a = Angle::from_degrees(270.0) + Angle::from_degrees(180.0);
//! assert_eq!(a, Angle::from_degrees(90.0));
//! ```
//!
//! ## coordinates
//!
//! A world coordinate is a `u32`. One terrain tile spans `TILE_SIZE`
//! coordinate units. The X and Z axes wrap modulo the _torus size_, which is
//! the number of tiles along that axis shifted left by `TILE_SHIFT`, and which
//! must be a power of two no larger than `1 << 31`. That keeps every shortest
//! displacement within an `i32`.
//!
//! Because the axes wrap, two coordinates must never be naively subtracted.
//! `torus_dist` gives the signed shortest displacement, taking the path
//! across the seam when that one is shorter.
//!
//! ## angles
//!
//! An `Angle` is a newtype around a `u16` where 65536 units make a full turn,
//! so wraparound is just unsigned overflow. Sine and cosine come out of a
//! table as `i32`s scaled such that 1.0 is `SCALING_FACTOR_MAX`.
//!
//! ## fractions
//!
//! A `Fraction` caches `1/d` as a normalized 31-bit multiplier plus a shift,
//! so scaling many values by the same divisor costs one division up front and
//! a widening multiply per value after that. A `Ratio` is a plain 31-bit
//! fixed point number in `[0, 1]`, used for blending.

mod angle;
mod fraction;
mod torus;


pub use self::{
    angle::{
        ANGLE_BITS,
        FULL_TURN,
        SCALING_FACTOR_BITS,
        SCALING_FACTOR_MAX,
        Angle,
        sin,
        cos,
    },
    fraction::{
        FRACTION_BITS,
        RATIO_BITS,
        Fraction,
        Ratio,
        fraction_of,
        fraction_umul,
    },
    torus::{
        Coord,
        TILE_SHIFT,
        TILE_SIZE,
        ALTITUDE_SHIFT,
        MAX_TORUS_SIZE,
        torus_dist,
        torus_dist_sq,
        torus_add,
        wrap_coord,
        wrapped_contains,
        isqrt,
    },
};
