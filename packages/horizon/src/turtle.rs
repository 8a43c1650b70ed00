//! Turtle graphics in camera-relative space.
//!
//! A turtle is placed once with a full toroidal transform, after which all
//! its movement is vector arithmetic in relative space followed by a single
//! projection per point.

use crate::perspective::{
    Perspective,
    ScreenPoint,
};
use draw_queue::{
    Burst,
    DrawPoint,
};
use torus_math::*;
use vek::*;


/// Position and orientation of a turtle.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TurtleState {
    /// Relative-space position.
    pub pos: Vec3<f32>,
    /// Unit direction of travel.
    pub heading: Vec3<f32>,
    /// Unit direction to the turtle's left, perpendicular to `heading`.
    pub left: Vec3<f32>,
    /// Stroke width, in world units.
    pub width: f32,
}

impl TurtleState {
    /// Unit direction of the turtle's back.
    pub fn up(&self) -> Vec3<f32> {
        self.heading.cross(self.left)
    }
}


/// A relative-movement drawing cursor with a stack of saved states.
#[derive(Debug, Clone)]
pub struct Turtle<'a> {
    persp: &'a Perspective,
    state: TurtleState,
    stack: Vec<TurtleState>,
    // where the burst's pen is, if it's at the turtle's position with the
    // turtle's width
    pen: Option<Vec3<f32>>,
}

// rotate v about unit axis k
fn rotate(v: Vec3<f32>, k: Vec3<f32>, a: Angle) -> Vec3<f32> {
    let (s, c) = (a.sin_f32(), a.cos_f32());
    v * c + k.cross(v) * s + k * k.dot(v) * (1.0 - c)
}

impl<'a> Turtle<'a> {
    /// Turtle standing at a world position, heading straight up, with its left
    /// side facing `yrot` around the vertical.
    pub fn new(persp: &'a Perspective, base: Vec3<Coord>, yrot: Angle, width: f32) -> Self {
        let pos = persp.translate_relative(base).map(|n| n as f32);
        let heading = persp.rotate_relative(Vec3::unit_y());
        let left = persp.rotate_relative(Vec3::new(yrot.sin_f32(), 0.0, -yrot.cos_f32()));
        Turtle {
            persp,
            state: TurtleState { pos, heading, left, width },
            stack: Vec::new(),
            pen: None,
        }
    }

    pub fn state(&self) -> &TurtleState {
        &self.state
    }

    /// Number of saved states.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Save the current state.
    pub fn push(&mut self) {
        self.stack.push(self.state);
    }

    /// Restore the last saved state. Returns false if there was none.
    pub fn pop(&mut self) -> bool {
        match self.stack.pop() {
            Some(state) => {
                self.state = state;
                self.pen = None;
                true
            }
            None => false,
        }
    }

    /// Turn left by `a` about the turtle's up direction.
    pub fn turn(&mut self, a: Angle) {
        let up = self.state.up();
        self.state.heading = rotate(self.state.heading, up, a).normalized();
        self.state.left = rotate(self.state.left, up, a).normalized();
    }

    /// Pitch the nose up by `a` about the turtle's left direction.
    pub fn pitch(&mut self, a: Angle) {
        self.state.heading = rotate(self.state.heading, self.state.left, -a).normalized();
    }

    /// Multiply the stroke width.
    pub fn scale_width(&mut self, k: f32) {
        self.state.width *= k;
        self.pen = None;
    }

    /// Move forwards without drawing.
    pub fn skip(&mut self, len: f32) {
        self.state.pos += self.state.heading * len;
        self.pen = None;
    }

    fn draw_point(&self, sp: ScreenPoint, world_size: f32) -> DrawPoint {
        DrawPoint {
            pos: sp.pos,
            depth: sp.depth,
            size: self.persp.screen_len(world_size.max(0.0) as u32, sp.depth).max(1),
        }
    }

    /// Move forwards, drawing a line. Returns false if nothing was recorded,
    /// because the line is not entirely in front of the camera or the burst
    /// is full.
    pub fn forward(&mut self, len: f32, burst: &mut Burst) -> bool {
        let from = self.state.pos;
        let to = from + self.state.heading * len;
        self.state.pos = to;
        let a = self.persp.project_f32(from);
        let b = self.persp.project_f32(to);
        match (a, b) {
            (Some(a), Some(b)) if burst.has_room(3, 2) => {
                if self.pen != Some(from) {
                    burst.put_point(self.draw_point(a, self.state.width));
                }
                burst.put_point(self.draw_point(b, self.state.width));
                burst.draw_line();
                self.pen = Some(to);
                true
            }
            _ => {
                self.pen = None;
                false
            }
        }
    }

    /// Draw a point of the given world radius where the turtle stands.
    /// Returns false if nothing was recorded.
    pub fn dot(&mut self, radius: f32, burst: &mut Burst) -> bool {
        // the pen no longer has the turtle's width
        self.pen = None;
        match self.persp.project_f32(self.state.pos) {
            Some(sp) if burst.has_room(2, 1) => {
                burst.put_point(self.draw_point(sp, radius));
                burst.draw_point();
                true
            }
            _ => false,
        }
    }
}


#[cfg(test)]
fn test_perspective() -> Perspective {
    Perspective::new(
        Vec3::new(1 << 20, 1 << 16, 1 << 20),
        Angle::ZERO,
        Angle::ZERO,
        Angle::from_degrees(90.0),
        Extent2::new(400, 300),
        Vec2::new(1 << 24, 1 << 24),
        TILE_SIZE / 8,
    )
}

#[test]
fn test_turtle_moves_in_relative_space() {
    let persp = test_perspective();
    let base = Vec3::new(1 << 20, 1 << 16, (1 << 20) - 4 * TILE_SIZE);
    let mut turtle = Turtle::new(&persp, base, Angle::ZERO, 1000.0);
    let start = turtle.state().pos;
    assert!((start - Vec3::new(0.0, 0.0, -4.0 * TILE_SIZE as f32)).magnitude() < 2.0);

    // up one tile
    turtle.skip(TILE_SIZE as f32);
    assert!((turtle.state().pos.y - TILE_SIZE as f32).abs() < 2.0);

    // tip over sideways, then go one tile more
    turtle.push();
    turtle.pitch(-Angle::QUARTER_TURN);
    turtle.skip(TILE_SIZE as f32);
    let pos = turtle.state().pos;
    assert!((pos.y - TILE_SIZE as f32).abs() < 2.0, "{:?}", pos);
    assert!(pos.x.abs() < 2.0 || (pos.z - start.z).abs() < 2.0);
    assert!((pos - start).magnitude() > 1.4 * TILE_SIZE as f32);

    // and the stack brings it back
    assert!(turtle.pop());
    assert!((turtle.state().pos.y - TILE_SIZE as f32).abs() < 2.0);
    assert!(!turtle.pop());
}

#[test]
fn test_turn_keeps_frame_orthonormal() {
    let persp = test_perspective();
    let base = Vec3::new(1 << 20, 1 << 16, (1 << 20) - 4 * TILE_SIZE);
    let mut turtle = Turtle::new(&persp, base, Angle::from_degrees(33.0), 1000.0);
    for i in 0..50 {
        turtle.turn(Angle::from_degrees(17.0 + i as f32));
        turtle.pitch(Angle::from_degrees(-11.0));
        let s = turtle.state();
        assert!((s.heading.magnitude() - 1.0).abs() < 1e-3);
        assert!((s.left.magnitude() - 1.0).abs() < 1e-3);
        assert!(s.heading.dot(s.left).abs() < 1e-3);
    }
}

#[test]
fn test_turtle_records_connected_strokes() {
    use draw_queue::{DrawQueue, Canvas, Solid};
    use std::sync::Arc;

    let persp = test_perspective();
    let base = Vec3::new(1 << 20, 1 << 16, (1 << 20) - 4 * TILE_SIZE);
    let mut queue = DrawQueue::new();
    let mut burst = queue.start_burst();
    burst.put_method(Arc::new(Solid { colour: Rgb::white() }));
    let mut turtle = Turtle::new(&persp, base, Angle::ZERO, 2000.0);
    assert!(turtle.forward(TILE_SIZE as f32, &mut burst));
    assert!(turtle.forward(TILE_SIZE as f32, &mut burst));
    assert!(turtle.dot(8000.0, &mut burst));
    burst.end();
    // method, points, line, points, line, points, point
    assert_eq!(queue.num_instrs(), 7);

    let mut canvas = Canvas::new(400, 300);
    let stats = queue.execute(&mut canvas.region(), Vec2::zero());
    assert_eq!(stats.drawn, 3);
    // a vertical stroke up from the middle of the screen
    assert_eq!(canvas.pixel(200, 140), Rgb::white());
    assert_eq!(canvas.pixel(200, 160), Rgb::black());
}
