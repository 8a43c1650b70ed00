//! Toroidal coordinate arithmetic.

use vek::*;


/// World coordinate along one axis.
pub type Coord = u32;

/// Log2 of the number of coordinate units per terrain tile.
pub const TILE_SHIFT: u32 = 16;

/// Number of coordinate units per terrain tile.
pub const TILE_SIZE: Coord = 1 << TILE_SHIFT;

/// Left shift from a tile altitude to a world Y coordinate.
pub const ALTITUDE_SHIFT: u32 = 8;

/// Largest allowed torus size along one axis, in coordinate units.
pub const MAX_TORUS_SIZE: u32 = 1 << 31;


fn debug_check_modulus(modulus: u32) {
    debug_assert!(
        modulus.is_power_of_two() && modulus <= MAX_TORUS_SIZE,
        "torus size {} not a power of two within range", modulus,
    );
}

/// Signed shortest displacement going from `from` to `to` on an axis which
/// wraps modulo `modulus`, a power of two.
///
/// Antisymmetric: `torus_dist(a, b, m) == -torus_dist(b, a, m)`. When the
/// two paths are exactly equally long, the result is positive iff `from`
/// is numerically smaller than `to` after wrapping.
pub fn torus_dist(from: Coord, to: Coord, modulus: u32) -> i32 {
    debug_check_modulus(modulus);
    let mask = modulus.wrapping_sub(1);
    let d = to.wrapping_sub(from) & mask;
    let half = modulus >> 1;
    if d < half {
        d as i32
    } else if d > half {
        (d as i64 - modulus as i64) as i32
    } else if (from & mask) < (to & mask) {
        half as i32
    } else {
        -(half as i32)
    }
}

/// Squared toroidal distance between two <x,z> positions.
pub fn torus_dist_sq(a: Vec2<Coord>, b: Vec2<Coord>, torus: Vec2<u32>) -> u64 {
    let dx = torus_dist(a.x, b.x, torus.x) as i64;
    let dz = torus_dist(a.y, b.y, torus.y) as i64;
    (dx * dx + dz * dz) as u64
}

/// Move `c` by `delta`, wrapping modulo `modulus`.
pub fn torus_add(c: Coord, delta: i32, modulus: u32) -> Coord {
    debug_check_modulus(modulus);
    c.wrapping_add(delta as u32) & modulus.wrapping_sub(1)
}

/// Wrap any signed position onto the axis.
pub fn wrap_coord(c: i64, modulus: u32) -> Coord {
    debug_check_modulus(modulus);
    c.rem_euclid(modulus as i64) as Coord
}

/// Whether `c` lies in the half-open window `[min, max)`. If `min > max` the
/// window is taken to straddle the seam, and the test inverts.
pub fn wrapped_contains(c: Coord, min: Coord, max: Coord) -> bool {
    if min <= max {
        c >= min && c < max
    } else {
        c >= min || c < max
    }
}

/// Floor of the square root.
pub fn isqrt(n: u64) -> u64 {
    let mut r = (n as f64).sqrt() as u64;
    while r.checked_mul(r).map(|sq| sq > n).unwrap_or(true) {
        r -= 1;
    }
    while (r + 1).checked_mul(r + 1).map(|sq| sq <= n).unwrap_or(false) {
        r += 1;
    }
    r
}


#[test]
fn test_torus_dist_antisymmetric() {
    use rand::Rng;
    use rand_pcg::Pcg32;

    let mut rng = Pcg32::new(0x853c49e6748fea9b, 0xda3e39cb94b95bdb);
    for bits in 0..=31 {
        let m = 1u32 << bits;
        for _ in 0..2000 {
            let a = rng.gen::<u32>();
            let b = rng.gen::<u32>();
            assert_eq!(torus_dist(a, b, m), -torus_dist(b, a, m), "a={} b={} m={}", a, b, m);
        }
        // exactly opposite points
        let a = rng.gen::<u32>() & (m - 1);
        let b = a.wrapping_add(m / 2);
        assert_eq!(torus_dist(a, b, m), -torus_dist(b, a, m));
    }
}

#[test]
fn test_torus_dist_takes_short_path() {
    let m = 1 << 20;
    assert_eq!(torus_dist(10, 20, m), 10);
    assert_eq!(torus_dist(20, 10, m), -10);
    assert_eq!(torus_dist(5, m - 5, m), -10);
    assert_eq!(torus_dist(m - 5, 5, m), 10);
    assert_eq!(torus_dist(0, m / 2, m), (m / 2) as i32);
    assert_eq!(torus_dist(m / 2, 0, m), -((m / 2) as i32));
    // coordinates off the torus are wrapped first
    assert_eq!(torus_dist(m + 10, 20, m), 10);
}

#[test]
fn test_torus_add_and_wrap() {
    let m = 1 << 10;
    assert_eq!(torus_add(5, -10, m), m - 5);
    assert_eq!(torus_add(m - 1, 2, m), 1);
    assert_eq!(wrap_coord(-1, m), m - 1);
    assert_eq!(wrap_coord(m as i64 * 3 + 7, m), 7);
    assert_eq!(torus_add(7, torus_dist(7, 900, m), m), 900);
}

#[test]
fn test_wrapped_contains() {
    assert!(wrapped_contains(5, 0, 10));
    assert!(!wrapped_contains(10, 0, 10));
    assert!(wrapped_contains(2, 100, 10));
    assert!(wrapped_contains(150, 100, 10));
    assert!(!wrapped_contains(50, 100, 10));
}

#[test]
fn test_isqrt() {
    for n in 0..10_000u64 {
        let r = isqrt(n);
        assert!(r * r <= n && (r + 1) * (r + 1) > n);
    }
    assert_eq!(isqrt(u64::MAX), u32::MAX as u64);
}
