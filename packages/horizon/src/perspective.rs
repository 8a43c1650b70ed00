//! World to camera-relative to screen transforms.
//!
//! Relative space has the camera at the origin looking down -Z, with +X to
//! the right and +Y up, in world coordinate units. Screen space has the origin
//! at the top left with +Y down.

use crate::frame::FrameParams;
use torus_math::*;
use vek::*;


/// Screen coordinates are saturated to within this far of zero.
pub const SCREEN_LIMIT: i32 = 1 << 24;


/// A projected point.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScreenPoint {
    pub pos: Vec2<i32>,
    /// Distance in front of the camera, in world units.
    pub depth: u32,
    /// Whether the point was pulled onto the near plane to project at all.
    pub clamped: bool,
}


/// Per-frame projection state. Cheap to share between threads.
#[derive(Debug, Clone)]
pub struct Perspective {
    camera: Vec3<Coord>,
    yaw: Angle,
    pitch: Angle,
    fov: Angle,
    torus: Vec2<u32>,
    screen: Extent2<u32>,
    // fixed point, scaled by SCALING_FACTOR_MAX
    yaw_sin: i64,
    yaw_cos: i64,
    pitch_sin: i64,
    pitch_cos: i64,
    // negative relative Z
    near: i32,
    origin: Vec2<i32>,
    // pixels per unit of X/Z, 16.16 fixed point
    focal: i64,
}

impl Perspective {
    /// Panics if `fov` is under two units or not less than a half turn.
    pub fn new(
        camera: Vec3<Coord>,
        yaw: Angle,
        pitch: Angle,
        fov: Angle,
        screen: Extent2<u32>,
        torus: Vec2<u32>,
        near: u32,
    ) -> Self {
        assert!(fov.0 >= 2 && fov.0 < Angle::HALF_TURN.0, "field of view out of range");
        let half_fov = fov.half();
        let focal = ((screen.w as i64) << 15) * half_fov.cos() as i64 / half_fov.sin() as i64;
        Perspective {
            camera,
            yaw,
            pitch,
            fov,
            torus,
            screen,
            yaw_sin: yaw.sin() as i64,
            yaw_cos: yaw.cos() as i64,
            pitch_sin: pitch.sin() as i64,
            pitch_cos: pitch.cos() as i64,
            near: -(near.clamp(1, i32::MAX as u32) as i32),
            origin: Vec2::new(screen.w as i32 / 2, screen.h as i32 / 2),
            focal,
        }
    }

    /// Perspective of a frame.
    pub fn for_frame(frame: &FrameParams, fov: Angle, torus: Vec2<u32>, near: u32) -> Self {
        Self::new(frame.camera, frame.yaw, frame.pitch, fov, frame.screen, torus, near)
    }

    pub fn camera(&self) -> Vec3<Coord> {
        self.camera
    }

    pub fn yaw(&self) -> Angle {
        self.yaw
    }

    pub fn pitch(&self) -> Angle {
        self.pitch
    }

    pub fn fov(&self) -> Angle {
        self.fov
    }

    pub fn torus(&self) -> Vec2<u32> {
        self.torus
    }

    pub fn screen(&self) -> Extent2<u32> {
        self.screen
    }

    /// The near plane, as a negative relative Z.
    pub fn near(&self) -> i32 {
        self.near
    }

    /// Camera-relative position of a world point. Always succeeds.
    pub fn translate_relative(&self, world: Vec3<Coord>) -> Vec3<i32> {
        let dx = torus_dist(self.camera.x, world.x, self.torus.x) as i64;
        let dz = torus_dist(self.camera.z, world.z, self.torus.y) as i64;
        let dy = world.y as i64 - self.camera.y as i64;

        // about Y by -yaw
        let x1 = (dx * self.yaw_cos >> SCALING_FACTOR_BITS)
            + (dz * self.yaw_sin >> SCALING_FACTOR_BITS);
        let z1 = (dz * self.yaw_cos >> SCALING_FACTOR_BITS)
            - (dx * self.yaw_sin >> SCALING_FACTOR_BITS);
        // about X by -pitch
        let y2 = (dy * self.pitch_cos >> SCALING_FACTOR_BITS)
            + (z1 * self.pitch_sin >> SCALING_FACTOR_BITS);
        let z2 = (z1 * self.pitch_cos >> SCALING_FACTOR_BITS)
            - (dy * self.pitch_sin >> SCALING_FACTOR_BITS);

        Vec3::new(x1, y2, z2).map(|n| n.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
    }

    /// Rotate a world-space direction into relative space. The linear part of
    /// `translate_relative`.
    pub fn rotate_relative(&self, v: Vec3<f32>) -> Vec3<f32> {
        let k = 1.0 / SCALING_FACTOR_MAX as f32;
        let (ys, yc) = (self.yaw_sin as f32 * k, self.yaw_cos as f32 * k);
        let (ps, pc) = (self.pitch_sin as f32 * k, self.pitch_cos as f32 * k);
        let x1 = v.x * yc + v.z * ys;
        let z1 = v.z * yc - v.x * ys;
        Vec3::new(x1, v.y * pc + z1 * ps, z1 * pc - v.y * ps)
    }

    // v * focal / depth in pixels, saturated to the screen limit. a narrow
    // fov makes the focal length large enough to overflow i64.
    fn scale(&self, inv: Fraction, v: i32) -> i64 {
        let limit = 2 * SCREEN_LIMIT as i128;
        (inv.mul_i128(v as i128 * self.focal as i128) >> 16).clamp(-limit, limit) as i64
    }

    // shared tail of project and project_clamped, given z < 0
    fn project_unchecked(&self, rel: Vec3<i32>, z: i32, clamped: bool) -> ScreenPoint {
        let depth = z.unsigned_abs();
        let inv = Fraction::of(depth);
        let sx = self.scale(inv, rel.x);
        let sy = self.scale(inv, rel.y);
        let limit = SCREEN_LIMIT as i64;
        ScreenPoint {
            pos: Vec2::new(
                (self.origin.x as i64 + sx).clamp(-limit, limit) as i32,
                (self.origin.y as i64 - sy).clamp(-limit, limit) as i32,
            ),
            depth,
            clamped,
        }
    }

    /// Project a relative point onto the screen. Fails if the point is not in
    /// front of the near plane.
    pub fn project(&self, rel: Vec3<i32>) -> Option<ScreenPoint> {
        if rel.z >= self.near {
            None
        } else {
            Some(self.project_unchecked(rel, rel.z, false))
        }
    }

    /// Project a relative point onto the screen, pulling it forwards onto the
    /// near plane if it is not in front of it. Such points are marked clamped,
    /// and land far off screen in the direction they lie in.
    pub fn project_clamped(&self, rel: Vec3<i32>) -> ScreenPoint {
        if rel.z >= self.near {
            self.project_unchecked(rel, self.near, true)
        } else {
            self.project_unchecked(rel, rel.z, false)
        }
    }

    /// Project a relative point given in floating point, as used by turtles.
    pub fn project_f32(&self, rel: Vec3<f32>) -> Option<ScreenPoint> {
        let lim = i32::MAX as f32 / 2.0;
        self.project(rel.map(|n| n.round().clamp(-lim, lim) as i32))
    }

    /// World to screen in one step.
    pub fn to_screen(&self, world: Vec3<Coord>) -> Option<ScreenPoint> {
        self.project(self.translate_relative(world))
    }

    /// On-screen length in pixels of a world length facing the camera at the
    /// given depth.
    pub fn screen_len(&self, world_len: u32, depth: u32) -> u32 {
        let px = self.scale(Fraction::of(depth.max(1)), world_len.min(i32::MAX as u32) as i32);
        px.clamp(0, SCREEN_LIMIT as i64) as u32
    }

    /// Screen Y of the horizon, ie. of the direction straight ahead but level.
    pub fn horizon_y(&self) -> i32 {
        // tan(pitch), in focal units
        let offset =
            if self.pitch_cos <= 0 {
                SCREEN_LIMIT as i64
            } else {
                ((self.focal as i128 * self.pitch_sin as i128 / self.pitch_cos as i128) >> 16)
                    .clamp(-(SCREEN_LIMIT as i128), SCREEN_LIMIT as i128) as i64
            };
        (self.origin.y as i64 + offset).clamp(-(SCREEN_LIMIT as i64), SCREEN_LIMIT as i64) as i32
    }
}


#[cfg(test)]
fn test_perspective(yaw: Angle, pitch: Angle) -> Perspective {
    Perspective::new(
        Vec3::new(1 << 20, 50 << ALTITUDE_SHIFT, 1 << 20),
        yaw,
        pitch,
        Angle::from_degrees(90.0),
        Extent2::new(800, 600),
        Vec2::new(1 << 24, 1 << 24),
        TILE_SIZE / 8,
    )
}

#[test]
fn test_point_ahead_projects_to_centre() {
    for deg in [0.0, 30.0, 90.0, 135.0, 200.0, 313.0] {
        let yaw = Angle::from_degrees(deg);
        let persp = test_perspective(yaw, Angle::ZERO);
        let dist = 10 * TILE_SIZE as i64;
        let ahead = Vec3::new(
            wrap_coord((1i64 << 20) + (dist * yaw.sin() as i64 >> 30), 1 << 24),
            50 << ALTITUDE_SHIFT,
            wrap_coord((1i64 << 20) - (dist * yaw.cos() as i64 >> 30), 1 << 24),
        );
        let rel = persp.translate_relative(ahead);
        assert!(rel.x.abs() <= 2, "yaw {}: rel {:?}", deg, rel);
        assert!((rel.z as i64 + dist).abs() <= 2, "yaw {}: rel {:?}", deg, rel);
        let sp = persp.project(rel).unwrap();
        assert!((sp.pos.x - 400).abs() <= 1, "yaw {}: {:?}", deg, sp);
        assert!((sp.pos.y - 300).abs() <= 1, "yaw {}: {:?}", deg, sp);
        assert!(!sp.clamped);
    }
}

#[test]
fn test_fov_edge_projects_to_screen_edge() {
    let persp = test_perspective(Angle::ZERO, Angle::ZERO);
    // 45 degrees to the right of straight ahead, at the edge of a 90 degree fov
    let d = 4 * TILE_SIZE;
    let p = Vec3::new((1 << 20) + d, 50 << ALTITUDE_SHIFT, (1 << 20) - d);
    let sp = persp.to_screen(p).unwrap();
    assert!((sp.pos.x - 800).abs() <= 1, "{:?}", sp);
    // and 45 degrees to the left
    let p = Vec3::new((1 << 20) - d, 50 << ALTITUDE_SHIFT, (1 << 20) - d);
    let sp = persp.to_screen(p).unwrap();
    assert!(sp.pos.x.abs() <= 1, "{:?}", sp);
}

#[test]
fn test_behind_fails_and_clamps() {
    let persp = test_perspective(Angle::ZERO, Angle::ZERO);
    let behind_right = Vec3::new((1 << 20) + TILE_SIZE, 50 << ALTITUDE_SHIFT, (1 << 20) + TILE_SIZE);
    let rel = persp.translate_relative(behind_right);
    assert!(persp.project(rel).is_none());
    let sp = persp.project_clamped(rel);
    assert!(sp.clamped);
    assert!(sp.pos.x > 800);
    assert_eq!(sp.depth, TILE_SIZE / 8);
}

#[test]
fn test_pitch_up_moves_things_down() {
    let level = test_perspective(Angle::ZERO, Angle::ZERO);
    let up = test_perspective(Angle::ZERO, Angle::from_degrees(20.0));
    let p = Vec3::new(1 << 20, 50 << ALTITUDE_SHIFT, (1 << 20) - 10 * TILE_SIZE);
    let a = level.to_screen(p).unwrap();
    let b = up.to_screen(p).unwrap();
    assert!(b.pos.y > a.pos.y);
    assert!((b.pos.y - up.horizon_y()).abs() <= 2);
    assert_eq!(level.horizon_y(), 300);
}

#[test]
fn test_rotate_relative_matches_translate() {
    let persp = test_perspective(Angle::from_degrees(37.0), Angle::from_degrees(-12.0));
    let offset = Vec3::new(3000.0f32, 1500.0, -7000.0);
    let world = Vec3::new(
        (1 << 20) + 3000,
        (50 << ALTITUDE_SHIFT) + 1500,
        (1 << 20) - 7000,
    );
    let a = persp.rotate_relative(offset);
    let b = persp.translate_relative(world).map(|n| n as f32);
    assert!((a - b).map(f32::abs).reduce_partial_max() < 3.0, "{:?} vs {:?}", a, b);
}

#[test]
fn test_screen_len() {
    let persp = test_perspective(Angle::ZERO, Angle::ZERO);
    // at 90 degrees fov and width 800, focal length is 400 px per unit depth
    assert_eq!(persp.screen_len(TILE_SIZE, 4 * TILE_SIZE), 100);
}

#[test]
fn test_narrow_fov_saturates() {
    // the narrowest field of view on the widest screen
    let persp = Perspective::new(
        Vec3::new(0, 0, 0),
        Angle::ZERO,
        Angle::from_degrees(10.0),
        Angle(2),
        Extent2::new(65535, 600),
        Vec2::new(1 << 31, 1 << 31),
        TILE_SIZE / 8,
    );
    let far_right = Vec3::new(i32::MAX / 2, 0, -(TILE_SIZE as i32));
    let sp = persp.project(far_right).unwrap();
    assert_eq!(sp.pos.x, SCREEN_LIMIT);
    let sp = persp.project(Vec3::new(-far_right.x, 0, far_right.z)).unwrap();
    assert_eq!(sp.pos.x, -SCREEN_LIMIT);
    assert_eq!(persp.horizon_y(), SCREEN_LIMIT);
    assert_eq!(persp.screen_len(u32::MAX, 1), SCREEN_LIMIT as u32);
}
