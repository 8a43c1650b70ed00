//! Cached reciprocals and blend weights.


/// Number of significant bits in a `Fraction` multiplier.
pub const FRACTION_BITS: u32 = 31;

/// Number of fractional bits in a `Ratio`.
pub const RATIO_BITS: u32 = 31;


/// Cached reciprocal `1/d` of a positive integer.
///
/// Stored as a multiplier normalized into `(2^30, 2^31]` and a right shift,
/// rounded up, such that `(x * mul) >> shift` is `x / d` or one more than it
/// for any `x: u32`. For wider inputs the relative error stays below `2^-30`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Fraction {
    mul: u32,
    shift: u32,
}

/// Reciprocal of `d`. Panics if `d` is zero.
pub fn fraction_of(d: u32) -> Fraction {
    Fraction::of(d)
}

/// Approximately `x / d` where `f = fraction_of(d)`.
pub fn fraction_umul(x: u32, f: Fraction) -> u32 {
    f.umul(x)
}

impl Fraction {
    /// Reciprocal of `d`. Panics if `d` is zero.
    pub fn of(d: u32) -> Self {
        assert!(d != 0, "fraction of zero");
        let log2 = 31 - d.leading_zeros();
        let shift = FRACTION_BITS + log2;
        let d = d as u64;
        let mul = ((1u64 << shift) + d - 1) / d;
        debug_assert!(mul <= 1 << FRACTION_BITS);
        Fraction {
            mul: mul as u32,
            shift,
        }
    }

    /// Multiply an unsigned value.
    pub fn umul(self, x: u32) -> u32 {
        ((x as u64 * self.mul as u64) >> self.shift) as u32
    }

    /// Multiply a wide signed value, rounding towards zero symmetrically.
    /// Exact to within one unit for `|x| < 2^96`.
    pub fn mul_i128(self, x: i128) -> i128 {
        let m = ((x.unsigned_abs() * self.mul as u128) >> self.shift) as i128;
        if x < 0 { -m } else { m }
    }
}


/// Fixed point number in `[0, 1]` with `RATIO_BITS` fractional bits.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ratio(pub u32);

impl Ratio {
    pub const ZERO: Ratio = Ratio(0);
    pub const ONE: Ratio = Ratio(1 << RATIO_BITS);

    /// `num / den`, saturating at one. Panics if `den` is zero.
    pub fn of(num: u32, den: u32) -> Self {
        assert!(den != 0, "ratio with zero denominator");
        let num = num.min(den) as u64;
        Ratio(((num << RATIO_BITS) / den as u64) as u32)
    }

    /// Nearest ratio to a float, clamped into `[0, 1]`.
    pub fn from_f32(n: f32) -> Self {
        Ratio((n.max(0.0).min(1.0) as f64 * Self::ONE.0 as f64) as u32)
    }

    /// Multiply a signed value.
    pub fn scale(self, x: i64) -> i64 {
        (x * self.0 as i64) >> RATIO_BITS
    }

    /// Linear interpolation, `a` at zero and `b` at one.
    pub fn lerp(self, a: i32, b: i32) -> i32 {
        (a as i64 + self.scale(b as i64 - a as i64)) as i32
    }

    /// Linear interpolation of a colour channel.
    pub fn lerp_u8(self, a: u8, b: u8) -> u8 {
        self.lerp(a as i32, b as i32) as u8
    }
}


#[test]
fn test_fraction_round_trip() {
    use rand::Rng;
    use rand_pcg::Pcg32;

    let mut rng = Pcg32::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7);
    let check = |x: u32, d: u32| {
        let q = fraction_umul(x, fraction_of(d));
        let exact = x / d;
        assert!(
            q == exact || q == exact + 1,
            "{} / {} gave {}, expected {}", x, d, q, exact,
        );
    };
    for d in 1..2000 {
        for x in [0, 1, d - 1, d, d + 1, 12345, u32::MAX / 2, u32::MAX] {
            check(x, d);
        }
    }
    for _ in 0..100_000 {
        let d = rng.gen_range(1..=u32::MAX);
        let x = rng.gen::<u32>();
        check(x, d);
    }
}

#[test]
fn test_fraction_exact_for_powers_of_two() {
    for shift in 0..32 {
        let f = fraction_of(1 << shift);
        assert_eq!(f.umul(u32::MAX), u32::MAX >> shift);
    }
}

#[test]
fn test_fraction_signed_is_symmetric() {
    let f = fraction_of(7);
    for x in -1000..1000i128 {
        assert_eq!(f.mul_i128(-x), -f.mul_i128(x));
        assert_eq!(f.mul_i128(-x * 1_000_000_007), -f.mul_i128(x * 1_000_000_007));
    }
    // wide inputs keep a relative error of 2^-30
    let q = f.mul_i128(7_000_000_000_000);
    assert!((q - 1_000_000_000_000).abs() <= (1_000_000_000_000 >> 30) + 1);
    // well past the range of i64
    let big = 7i128 << 90;
    let q = f.mul_i128(-big);
    assert!(q < 0);
    assert!(((-q) - (1i128 << 90)).abs() <= (1i128 << 60) + 1);
}

#[test]
fn test_ratio_lerp() {
    let half = Ratio::of(1, 2);
    assert_eq!(half.lerp(10, 20), 15);
    assert_eq!(Ratio::ONE.lerp(10, 20), 20);
    assert_eq!(Ratio::ZERO.lerp(10, 20), 10);
    assert_eq!(Ratio::of(5, 4), Ratio::ONE);
    assert_eq!(half.lerp_u8(0, 255), 127);
}
