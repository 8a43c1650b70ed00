//! Per-frame input snapshot.

use torus_math::*;
use vek::*;


/// Everything about a frame that comes from the game loop rather than from
/// the world or the settings. Immutable while the frame renders.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameParams {
    /// Eye position. X and Z wrap, Y is altitude.
    pub camera: Vec3<Coord>,
    /// Rotation about the vertical axis. Zero looks down -Z, increasing turns
    /// right.
    pub yaw: Angle,
    /// Rotation about the horizontal axis. Positive looks up.
    pub pitch: Angle,
    /// Game clock, driving the seasons.
    pub time: f32,
    pub screen: Extent2<u32>,
}

impl FrameParams {
    /// Camera standing `eye_height` above the terrain at <x,z>.
    pub fn standing(
        world: &world_data::World,
        x: Coord,
        z: Coord,
        eye_height: Coord,
        yaw: Angle,
        pitch: Angle,
        time: f32,
        screen: Extent2<u32>,
    ) -> Self {
        let y = world.terrain_base_y(x, z).saturating_add(eye_height);
        FrameParams {
            camera: Vec3::new(x, y, z),
            yaw,
            pitch,
            time,
            screen,
        }
    }
}
