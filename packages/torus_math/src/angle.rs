//! Binary angles and the sine table.

use once_cell::sync::Lazy;
use std::{
    ops::{
        Add,
        AddAssign,
        Sub,
        SubAssign,
        Neg,
    },
    f64::consts::PI,
};


/// Number of bits in an angle.
pub const ANGLE_BITS: u32 = 16;

/// Number of angle units in a full turn.
pub const FULL_TURN: u32 = 1 << ANGLE_BITS;

/// Number of fractional bits in a sine or cosine.
pub const SCALING_FACTOR_BITS: u32 = 30;

/// Value of sine and cosine at their peak, representing 1.0.
pub const SCALING_FACTOR_MAX: i32 = 1 << SCALING_FACTOR_BITS;


const QUARTER_BITS: u32 = ANGLE_BITS - 2;
const QUARTER: usize = 1 << QUARTER_BITS;
const QUARTER_MASK: u16 = (QUARTER - 1) as u16;

// sine over the first quarter turn, inclusive of both ends
static QUARTER_SINE: Lazy<Vec<i32>> = Lazy::new(|| {
    (0..=QUARTER)
        .map(|i| {
            let rad = i as f64 * PI / 2.0 / QUARTER as f64;
            (rad.sin() * SCALING_FACTOR_MAX as f64).round() as i32
        })
        .collect()
});


/// Sine of `a`, scaled to `SCALING_FACTOR_MAX`.
pub fn sin(a: Angle) -> i32 {
    let idx = (a.0 & QUARTER_MASK) as usize;
    match a.0 >> QUARTER_BITS {
        0 => QUARTER_SINE[idx],
        1 => QUARTER_SINE[QUARTER - idx],
        2 => -QUARTER_SINE[idx],
        _ => -QUARTER_SINE[QUARTER - idx],
    }
}

/// Cosine of `a`, scaled to `SCALING_FACTOR_MAX`.
pub fn cos(a: Angle) -> i32 {
    sin(a + Angle::QUARTER_TURN)
}


/// Binary angle. 65536 units per full turn, wrapping.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Angle(pub u16);

impl Angle {
    pub const ZERO: Angle = Angle(0);
    pub const QUARTER_TURN: Angle = Angle(0x4000);
    pub const HALF_TURN: Angle = Angle(0x8000);

    /// Nearest binary angle to `deg` degrees. Any real number is accepted.
    pub fn from_degrees(deg: f32) -> Self {
        let units = (deg as f64 / 360.0 * FULL_TURN as f64).round() as i64;
        Angle(units.rem_euclid(FULL_TURN as i64) as u16)
    }

    /// Convert to radians in `[0, 2pi)`.
    pub fn to_radians(self) -> f32 {
        (self.0 as f64 / FULL_TURN as f64 * 2.0 * PI) as f32
    }

    /// Interpret as a signed angle in `[-half turn, half turn)`.
    pub fn signed(self) -> i32 {
        self.0 as i16 as i32
    }

    /// Half of this angle, treating it as unsigned.
    pub fn half(self) -> Self {
        Angle(self.0 >> 1)
    }

    /// Sine, scaled to `SCALING_FACTOR_MAX`.
    pub fn sin(self) -> i32 {
        sin(self)
    }

    /// Cosine, scaled to `SCALING_FACTOR_MAX`.
    pub fn cos(self) -> i32 {
        cos(self)
    }

    /// Sine as a float in `[-1, 1]`.
    pub fn sin_f32(self) -> f32 {
        sin(self) as f32 / SCALING_FACTOR_MAX as f32
    }

    /// Cosine as a float in `[-1, 1]`.
    pub fn cos_f32(self) -> f32 {
        cos(self) as f32 / SCALING_FACTOR_MAX as f32
    }
}

impl Add for Angle {
    type Output = Angle;

    fn add(self, rhs: Angle) -> Angle {
        Angle(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Angle {
    fn add_assign(&mut self, rhs: Angle) {
        *self = *self + rhs;
    }
}

impl Sub for Angle {
    type Output = Angle;

    fn sub(self, rhs: Angle) -> Angle {
        Angle(self.0.wrapping_sub(rhs.0))
    }
}

impl SubAssign for Angle {
    fn sub_assign(&mut self, rhs: Angle) {
        *self = *self - rhs;
    }
}

impl Neg for Angle {
    type Output = Angle;

    fn neg(self) -> Angle {
        Angle(self.0.wrapping_neg())
    }
}


#[test]
fn test_sine_cardinal_points() {
    assert_eq!(sin(Angle::ZERO), 0);
    assert_eq!(sin(Angle::QUARTER_TURN), SCALING_FACTOR_MAX);
    assert_eq!(sin(Angle::HALF_TURN), 0);
    assert_eq!(sin(Angle(0xc000)), -SCALING_FACTOR_MAX);
    assert_eq!(cos(Angle::ZERO), SCALING_FACTOR_MAX);
    assert_eq!(cos(Angle::HALF_TURN), -SCALING_FACTOR_MAX);
}

#[test]
fn test_sine_matches_float() {
    for a in (0..FULL_TURN).step_by(97) {
        let a = Angle(a as u16);
        let expected = (a.to_radians() as f64).sin();
        let actual = sin(a) as f64 / SCALING_FACTOR_MAX as f64;
        assert!((expected - actual).abs() < 1e-5, "{:?}: {} vs {}", a, expected, actual);
    }
}

#[test]
fn test_sine_is_odd() {
    for a in 0..FULL_TURN {
        let a = Angle(a as u16);
        assert_eq!(sin(-a), -sin(a));
    }
}

#[test]
fn test_angle_wraps() {
    assert_eq!(Angle::from_degrees(-90.0), Angle(0xc000));
    assert_eq!(Angle::from_degrees(450.0), Angle::QUARTER_TURN);
    assert_eq!(Angle(0xffff) + Angle(2), Angle(1));
    assert_eq!(Angle(0xc000).signed(), -0x4000);
}
